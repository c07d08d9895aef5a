//! End-to-end local-user flows against a bootstrapped AuthService.

use chrono::Duration;
use warden_auth::{AuthService, bootstrap_users};
use warden_core::{AuthConfig, AuthError, Permission, Role};
use warden_token::{ClaimSet, KeyPair};

fn bootstrapped() -> AuthService {
    let service = AuthService::in_memory(KeyPair::generate().unwrap()).unwrap();
    bootstrap_users(&service, &AuthConfig::default()).unwrap();
    service
}

#[test]
fn test_admin_login_scenario() {
    let service = bootstrapped();

    let resp = service.login("admin", "admin123").unwrap();
    assert!(resp.user.roles.contains(&Role::Admin));
    assert_eq!(resp.token_type, "bearer");

    let json = serde_json::to_value(&resp).unwrap();
    assert_eq!(json["user"]["roles"][0], "admin");
    assert!(json["user"].get("password_hash").is_none());

    let err = service.login("admin", "wrong").unwrap_err();
    assert_eq!(err.status_code(), 401);
}

#[test]
fn test_deactivated_operator_token_rejected() {
    let service = bootstrapped();
    let resp = service.login("operator", "operator123").unwrap();
    let token = resp.access_token;

    let user = service.get_current_user(&token).unwrap();
    assert!(service.require_permission(&user, Permission::Investigate).is_ok());

    service.deactivate_user("operator").unwrap();
    let err = service.get_current_user(&token).unwrap_err();
    assert_eq!(err.status_code(), 401);
    assert!(matches!(err, AuthError::Unauthorized(_)));
}

#[test]
fn test_removed_subject_rejected() {
    let service = bootstrapped();
    let token = service
        .create_access_token(
            &ClaimSet {
                subject: "never-created".into(),
                roles: vec![Role::Admin],
                email: None,
            },
            Some(Duration::minutes(5)),
        )
        .unwrap();

    assert!(service.verify_token(&token).is_ok());
    assert!(matches!(
        service.get_current_user(&token),
        Err(AuthError::Unauthorized(_))
    ));
}

#[test]
fn test_viewer_cannot_manage_users() {
    let service = bootstrapped();
    let resp = service.login("viewer", "viewer123").unwrap();
    let viewer = service.get_current_user(&resp.access_token).unwrap();

    let err = service
        .require_permission(&viewer, Permission::ManageUsers)
        .unwrap_err();
    assert_eq!(err.status_code(), 403);
    assert_eq!(err.public_message(), "Insufficient permissions");
}

#[test]
fn test_tokens_from_other_process_key_rejected() {
    let first = bootstrapped();
    let second = bootstrapped();
    let resp = first.login("admin", "admin123").unwrap();

    assert_eq!(
        second.verify_token(&resp.access_token),
        Err(AuthError::MalformedToken)
    );
}
