use crate::service::AuthService;
use warden_core::{AuthError, AuthConfig, NewUser};

/// Environment variable overriding the seeded `admin` password.
pub const ADMIN_PASSWORD_ENV: &str = "WARDEN_ADMIN_PASSWORD";

/// On startup, create the configured seed users.
///
/// Password source for `admin` (highest precedence first):
/// - env `WARDEN_ADMIN_PASSWORD`
/// - `warden.toml` `[[auth.users]]` entry or the built-in default
///
/// Users that already exist are left untouched. Returns how many were created.
pub fn bootstrap_users(service: &AuthService, cfg: &AuthConfig) -> anyhow::Result<usize> {
    let admin_override = std::env::var(ADMIN_PASSWORD_ENV).ok();
    let mut created = 0;

    for seed in cfg.seed_users() {
        let password = match (&admin_override, seed.username.as_str()) {
            (Some(password), "admin") => password.clone(),
            _ => seed.password.clone(),
        };

        if password.trim().is_empty() {
            anyhow::bail!(
                "seed user '{}' has an empty password (set it in warden.toml or {ADMIN_PASSWORD_ENV})",
                seed.username
            );
        }

        match service.create_user(NewUser {
            username: seed.username.clone(),
            email: seed.email.clone(),
            password,
            roles: seed.roles.clone(),
        }) {
            Ok(user) => {
                created += 1;
                tracing::info!(username = %user.username, roles = ?user.roles, "seeded user");
            }
            Err(AuthError::Conflict(username)) => {
                tracing::debug!(%username, "seed user already exists");
            }
            Err(e) => return Err(anyhow::anyhow!("failed to seed user '{}': {e}", seed.username)),
        }
    }

    if created > 0 && cfg.seed_default_users && admin_override.is_none() {
        tracing::warn!("seeded built-in accounts with default passwords; override them outside development");
    }

    Ok(created)
}
