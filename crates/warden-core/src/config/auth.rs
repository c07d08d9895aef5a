//! Local authentication settings.

use super::{ConfigError, default_true, parse_duration};
use crate::role::Role;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settings for the local-user path: token lifetime, signing key, seed users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Lifetime of issued access tokens (e.g., "30m", "12h").
    #[serde(default = "default_ttl")]
    pub access_token_ttl: String,

    /// Revoke the presented token when it is exchanged on refresh.
    #[serde(default = "default_true")]
    pub revoke_on_refresh: bool,

    /// Environment variable containing the hex-encoded Ed25519 signing key.
    #[serde(default)]
    pub private_key_env: Option<String>,

    /// Path to the hex-encoded Ed25519 signing key.
    #[serde(default)]
    pub private_key_file: Option<PathBuf>,

    /// Seed the built-in admin/operator/viewer accounts at startup.
    #[serde(default = "default_true")]
    pub seed_default_users: bool,

    /// Additional users created at startup.
    #[serde(default)]
    pub users: Vec<SeedUser>,
}

/// A user created at startup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeedUser {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub password: String,
    pub roles: Vec<Role>,
}

fn default_ttl() -> String {
    "30m".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_token_ttl: default_ttl(),
            revoke_on_refresh: true,
            private_key_env: None,
            private_key_file: None,
            seed_default_users: true,
            users: Vec::new(),
        }
    }
}

impl AuthConfig {
    /// Access token lifetime as a chrono duration.
    pub fn ttl(&self) -> Result<chrono::Duration, ConfigError> {
        let std = parse_duration("access_token_ttl", &self.access_token_ttl)?;
        chrono::Duration::from_std(std).map_err(|e| ConfigError::InvalidDuration {
            field: "access_token_ttl",
            value: self.access_token_ttl.clone(),
            reason: e.to_string(),
        })
    }

    /// Resolve the signing key from environment or file.
    pub fn resolve_private_key(&self) -> Result<Option<String>, std::io::Error> {
        if let Some(env_var) = &self.private_key_env {
            if let Ok(key) = std::env::var(env_var) {
                return Ok(Some(key.trim().to_string()));
            }
        }

        if let Some(path) = &self.private_key_file {
            if path.exists() {
                let key = std::fs::read_to_string(path)?;
                return Ok(Some(key.trim().to_string()));
            }
        }

        Ok(None)
    }

    /// Users to create at startup: configured users first, then any built-in
    /// account whose username is not already taken.
    pub fn seed_users(&self) -> Vec<SeedUser> {
        let mut users = self.users.clone();
        if self.seed_default_users {
            for default in default_users() {
                if !users.iter().any(|u| u.username == default.username) {
                    users.push(default);
                }
            }
        }
        users
    }
}

/// Built-in development accounts.
pub fn default_users() -> Vec<SeedUser> {
    [
        ("admin", "admin123", Role::Admin),
        ("operator", "operator123", Role::Operator),
        ("viewer", "viewer123", Role::Viewer),
    ]
    .into_iter()
    .map(|(username, password, role)| SeedUser {
        username: username.to_string(),
        email: Some(format!("{username}@warden.local")),
        password: password.to_string(),
        roles: vec![role],
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_users_defaults() {
        let cfg = AuthConfig::default();
        let names: Vec<_> = cfg.seed_users().into_iter().map(|u| u.username).collect();
        assert_eq!(names, vec!["admin", "operator", "viewer"]);
    }

    #[test]
    fn test_configured_user_overrides_default() {
        let cfg = AuthConfig {
            users: vec![SeedUser {
                username: "admin".into(),
                email: None,
                password: "different".into(),
                roles: vec![Role::Admin],
            }],
            ..Default::default()
        };
        let seeds = cfg.seed_users();
        assert_eq!(seeds.len(), 3);
        assert_eq!(seeds[0].password, "different");
    }

    #[test]
    fn test_seeding_disabled() {
        let cfg = AuthConfig {
            seed_default_users: false,
            ..Default::default()
        };
        assert!(cfg.seed_users().is_empty());
    }

    #[test]
    fn test_default_ttl() {
        assert_eq!(
            AuthConfig::default().ttl().unwrap(),
            chrono::Duration::minutes(30)
        );
    }
}
