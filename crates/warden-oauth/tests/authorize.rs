//! End-to-end authorization decisions over both identity sources.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use warden_auth::{AuthService, bootstrap_users};
use warden_core::{AuthConfig, AuthError, Permission, Scope, ScopeSet};
use warden_k8s::{K8sError, K8sTokenParser, ScopeSource, TokenReviewStatus, TokenReviewer};
use warden_oauth::{OAuth2ResourceServer, Requirement, TokenType};
use warden_token::KeyPair;

fn auth_service() -> Arc<AuthService> {
    let service = AuthService::in_memory(KeyPair::generate().unwrap()).unwrap();
    bootstrap_users(&service, &AuthConfig::default()).unwrap();
    Arc::new(service)
}

fn sa_token(namespace: &str, name: &str) -> String {
    let payload = json!({
        "iss": "https://kubernetes.default.svc.cluster.local",
        "sub": format!("system:serviceaccount:{namespace}:{name}"),
        "aud": ["warden"],
        "exp": 4_102_444_800i64,
    });
    format!(
        "{}.{}.c2ln",
        URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256"}"#),
        URL_SAFE_NO_PAD.encode(payload.to_string())
    )
}

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

struct FixedReview(bool);

#[async_trait]
impl TokenReviewer for FixedReview {
    async fn review(&self, _: &str, _: &str, _: &[String]) -> Result<TokenReviewStatus, K8sError> {
        Ok(TokenReviewStatus {
            authenticated: self.0,
            ..Default::default()
        })
    }
}

/// Authenticates only tokens reviewed against the `warden` audience.
struct AudienceReview;

#[async_trait]
impl TokenReviewer for AudienceReview {
    async fn review(
        &self,
        _: &str,
        _: &str,
        audiences: &[String],
    ) -> Result<TokenReviewStatus, K8sError> {
        Ok(TokenReviewStatus {
            authenticated: audiences.iter().map(String::as_str).eq(["warden"]),
            audiences: audiences.to_vec(),
            ..Default::default()
        })
    }
}

struct HangingReview;

#[async_trait]
impl TokenReviewer for HangingReview {
    async fn review(&self, _: &str, _: &str, _: &[String]) -> Result<TokenReviewStatus, K8sError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(TokenReviewStatus::default())
    }
}

fn reviewed(reviewer: impl TokenReviewer + 'static) -> OAuth2ResourceServer {
    OAuth2ResourceServer::new(
        auth_service(),
        K8sTokenParser::default().with_reviewer(Arc::new(reviewer)),
    )
    .with_token_review(true)
}

#[tokio::test]
async fn local_admin_can_manage_users() {
    let auth = auth_service();
    let token = auth.login("admin", "admin123").unwrap().access_token;
    let server = OAuth2ResourceServer::new(auth, K8sTokenParser::default());

    let principal = server
        .authorize(Some(&bearer(&token)), Permission::ManageUsers)
        .await
        .unwrap();
    assert_eq!(principal.subject, "admin");
    assert_eq!(principal.kind, TokenType::Local);
    assert!(principal.scopes.contains(&Scope::AdminUsers));
}

#[tokio::test]
async fn local_viewer_is_forbidden() {
    let auth = auth_service();
    let token = auth.login("viewer", "viewer123").unwrap().access_token;
    let server = OAuth2ResourceServer::new(auth, K8sTokenParser::default());
    let header = bearer(&token);

    let err = server
        .authorize(Some(&header), Permission::ManageUsers)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        AuthError::InsufficientPermission {
            required: Permission::ManageUsers
        }
    );
    assert_eq!(err.status_code(), 403);

    assert!(
        server
            .authorize(Some(&header), Permission::ReadToolsets)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn deactivated_user_is_unauthorized() {
    let auth = auth_service();
    let token = auth.login("operator", "operator123").unwrap().access_token;
    auth.deactivate_user("operator").unwrap();
    let server = OAuth2ResourceServer::new(auth, K8sTokenParser::default());

    let err = server
        .authorize(Some(&bearer(&token)), Requirement::Authenticated)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 401);
}

#[tokio::test]
async fn service_account_scopes() {
    let server = reviewed(FixedReview(true));

    let admin = server
        .validate_bearer_token(&bearer(&sa_token("kube-system", "admin-sa")))
        .await
        .unwrap();
    assert_eq!(admin.token_type, TokenType::Kubernetes);
    assert!(admin.scopes.contains(&Scope::AdminSystem));
    assert!(admin.scopes.contains(&Scope::AdminUsers));
    assert_eq!(
        admin.subject(),
        "system:serviceaccount:kube-system:admin-sa"
    );

    let header = bearer(&sa_token("default", "test-sa"));
    let plain = server.validate_bearer_token(&header).await.unwrap();
    assert_eq!(
        plain.k8s_info.unwrap().scopes,
        [Scope::ClusterInfo, Scope::PodsRead].into_iter().collect::<ScopeSet>()
    );

    assert!(server.authorize(Some(&header), Scope::PodsRead).await.is_ok());
    assert_eq!(
        server
            .authorize(Some(&header), Permission::Investigate)
            .await
            .unwrap_err(),
        AuthError::InsufficientPermission {
            required: Permission::Investigate
        }
    );
    assert_eq!(
        server
            .authorize(Some(&header), Scope::LogsRead)
            .await
            .unwrap_err(),
        AuthError::InsufficientScope {
            required: Scope::LogsRead
        }
    );
}

#[tokio::test]
async fn expected_audience_is_enforced() {
    let header = bearer(&sa_token("default", "test-sa"));

    let matching = OAuth2ResourceServer::new(auth_service(), K8sTokenParser::default())
        .with_expected_audience(Some("warden".into()));
    assert!(matching.validate_bearer_token(&header).await.is_some());

    let other = OAuth2ResourceServer::new(auth_service(), K8sTokenParser::default())
        .with_expected_audience(Some("another-service".into()));
    assert!(other.validate_bearer_token(&header).await.is_none());
}

#[tokio::test]
async fn required_token_review_fails_closed() {
    let header = bearer(&sa_token("kube-system", "admin-sa"));

    let rejecting = OAuth2ResourceServer::new(
        auth_service(),
        K8sTokenParser::default().with_reviewer(Arc::new(FixedReview(false))),
    )
    .with_token_review(true);
    assert!(rejecting.validate_bearer_token(&header).await.is_none());

    let unconfigured =
        OAuth2ResourceServer::new(auth_service(), K8sTokenParser::default()).with_token_review(true);
    assert!(unconfigured.validate_bearer_token(&header).await.is_none());

    let accepting = OAuth2ResourceServer::new(
        auth_service(),
        K8sTokenParser::default().with_reviewer(Arc::new(FixedReview(true))),
    )
    .with_token_review(true);
    assert!(accepting.validate_bearer_token(&header).await.is_some());
}

#[tokio::test]
async fn unreviewed_service_account_is_held_to_minimal_scopes() {
    let server = OAuth2ResourceServer::new(auth_service(), K8sTokenParser::default());
    let payload = json!({
        "sub": "system:serviceaccount:evil:admin",
        "exp": 4_102_444_800i64,
    });
    let forged = format!(
        "{}.{}.AAAA",
        URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#),
        URL_SAFE_NO_PAD.encode(payload.to_string())
    );
    let header = bearer(&forged);

    let result = server.validate_bearer_token(&header).await.unwrap();
    assert_eq!(result.scopes, ScopeSet::from(Scope::MINIMAL));
    assert_eq!(
        result.k8s_info.unwrap().scope_source,
        ScopeSource::MinimalDefault
    );

    assert_eq!(
        server
            .authorize(Some(&header), Permission::ManageUsers)
            .await
            .unwrap_err(),
        AuthError::InsufficientPermission {
            required: Permission::ManageUsers
        }
    );
}

#[tokio::test]
async fn review_outage_is_upstream_unavailable() {
    let server = OAuth2ResourceServer::new(
        auth_service(),
        K8sTokenParser::default()
            .with_reviewer(Arc::new(HangingReview))
            .with_timeout(Duration::from_millis(50)),
    )
    .with_token_review(true);
    let header = bearer(&sa_token("kube-system", "admin-sa"));

    let err = server
        .authorize(Some(&header), Requirement::Authenticated)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::UpstreamUnavailable(_)), "{err:?}");
    assert_eq!(err.status_code(), 401);

    let rejected = reviewed(FixedReview(false))
        .authorize(Some(&header), Requirement::Authenticated)
        .await
        .unwrap_err();
    assert!(matches!(rejected, AuthError::Unauthorized(_)), "{rejected:?}");
}

#[tokio::test]
async fn review_uses_expected_audience() {
    let header = bearer(&sa_token("kube-system", "admin-sa"));

    let server = reviewed(AudienceReview).with_expected_audience(Some("warden".into()));
    let result = server.validate_bearer_token(&header).await.unwrap();
    assert!(result.scopes.contains(&Scope::AdminSystem));

    assert!(
        reviewed(AudienceReview)
            .validate_bearer_token(&header)
            .await
            .is_none()
    );
}

#[tokio::test]
async fn rejected_headers_and_tokens() {
    let server = OAuth2ResourceServer::new(auth_service(), K8sTokenParser::default());

    let err = server.authorize(None, Requirement::Authenticated).await.unwrap_err();
    assert!(matches!(err, AuthError::Unauthorized(_)));

    for header in ["", "Bearer", "Bearer \t", "Basic dXNlcjpwYXNz", "Bearer a b"] {
        assert!(server.validate_bearer_token(header).await.is_none(), "{header}");
    }

    let foreign = format!(
        "{}.{}.c2ln",
        URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256"}"#),
        URL_SAFE_NO_PAD.encode(json!({"iss": "https://idp", "sub": "alice"}).to_string())
    );
    assert_eq!(
        server
            .authorize(Some(&bearer(&foreign)), Requirement::Authenticated)
            .await
            .unwrap_err(),
        AuthError::UnknownIssuerToken
    );
    assert_eq!(
        server
            .authorize(Some("Bearer garbage"), Requirement::Authenticated)
            .await
            .unwrap_err(),
        AuthError::MalformedToken
    );
}

#[tokio::test]
async fn local_only_rejects_service_accounts() {
    let server = OAuth2ResourceServer::local_only(auth_service());
    let err = server
        .authorize(
            Some(&bearer(&sa_token("kube-system", "admin-sa"))),
            Requirement::Authenticated,
        )
        .await
        .unwrap_err();
    assert_eq!(err, AuthError::UnknownIssuerToken);
}

#[test]
fn authorize_request_matches_expansion() {
    let server = OAuth2ResourceServer::local_only(auth_service());
    let hierarchy = warden_k8s::ScopeHierarchy;
    let grants: [&[Scope]; 4] = [
        &[],
        &[Scope::Investigate],
        &[Scope::AdminConfig],
        &[Scope::PodsRead, Scope::Chat],
    ];

    for granted in grants {
        let granted: ScopeSet = granted.iter().copied().collect();
        let expanded = hierarchy.expand(&granted);
        for required in Scope::ALL {
            assert_eq!(
                server.authorize_request(&granted, required),
                expanded.contains(&required),
                "{granted:?} / {required}"
            );
        }
    }
}

#[test]
fn map_rbac_to_scopes_ignores_unknown() {
    let server = OAuth2ResourceServer::local_only(auth_service());
    let scopes = server.map_rbac_to_scopes(&["get:pods", "explode:everything", "list:events"]);
    assert_eq!(
        scopes,
        [Scope::PodsRead, Scope::EventsRead].into_iter().collect::<ScopeSet>()
    );
}
