//! AuthService: the local-user authentication and token lifecycle.

use crate::password::{Argon2Hasher, PasswordHasher};
use crate::store::{InMemoryIdentityStore, LocalIdentityStore};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use warden_core::{AuthError, NewUser, Permission, Role, User, UserView};
use warden_token::{
    BiscuitTokenCodec, ClaimSet, Claims, InMemoryRevocationStore, KeyPair, RevocationStore,
    TokenCodec, TokenError,
};

/// Token lifetime when none is configured.
pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 30;

/// Body returned by login and refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Seconds until the access token expires.
    pub expires_in: i64,
    pub user: UserView,
}

/// Orchestrates the identity store, password hasher, token codec and
/// revocation store.
pub struct AuthService {
    users: Arc<dyn LocalIdentityStore>,
    hasher: Arc<dyn PasswordHasher>,
    codec: Arc<dyn TokenCodec>,
    revocations: Arc<dyn RevocationStore>,
    default_ttl: Duration,
    revoke_on_refresh: bool,
    /// Hash verified against when the username is unknown, so that path costs
    /// the same as a wrong password.
    decoy_hash: String,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn LocalIdentityStore>,
        hasher: Arc<dyn PasswordHasher>,
        codec: Arc<dyn TokenCodec>,
        revocations: Arc<dyn RevocationStore>,
    ) -> Result<Self, AuthError> {
        let decoy_hash = hasher.hash(&uuid::Uuid::new_v4().to_string())?;
        Ok(Self {
            users,
            hasher,
            codec,
            revocations,
            default_ttl: Duration::minutes(DEFAULT_TOKEN_TTL_MINUTES),
            revoke_on_refresh: true,
            decoy_hash,
        })
    }

    /// Fresh in-memory stores, Argon2 hashing and a Biscuit codec over `keypair`.
    pub fn in_memory(keypair: KeyPair) -> Result<Self, AuthError> {
        Self::new(
            Arc::new(InMemoryIdentityStore::new()),
            Arc::new(Argon2Hasher::new()),
            Arc::new(BiscuitTokenCodec::new(keypair)),
            Arc::new(InMemoryRevocationStore::new()),
        )
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_revoke_on_refresh(mut self, revoke: bool) -> Self {
        self.revoke_on_refresh = revoke;
        self
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Check credentials. Unknown user, wrong password and inactive user all
    /// yield `None`.
    pub fn authenticate_user(&self, username: &str, password: &str) -> Option<User> {
        let Some(user) = self.users.get(username) else {
            let _ = self.hasher.verify(password, &self.decoy_hash);
            tracing::info!(username, "authentication failed: unknown user");
            return None;
        };

        if !self.hasher.verify(password, &user.password_hash) {
            tracing::info!(username, "authentication failed: wrong password");
            return None;
        }

        if !user.active {
            tracing::info!(username, "authentication failed: user inactive");
            return None;
        }

        Some(user)
    }

    /// Authenticate and issue an access token.
    pub fn login(&self, username: &str, password: &str) -> Result<TokenResponse, AuthError> {
        let user = self
            .authenticate_user(username, password)
            .ok_or_else(|| AuthError::Unauthorized("invalid credentials".to_string()))?;
        let response = self.token_response(&user)?;
        tracing::info!(username, "user logged in");
        Ok(response)
    }

    // =========================================================================
    // Token lifecycle
    // =========================================================================

    /// Sign `claims` into a token valid for `ttl` (default when `None`).
    /// A non-positive ttl produces an already-expired token.
    pub fn create_access_token(
        &self,
        claims: &ClaimSet,
        ttl: Option<Duration>,
    ) -> Result<String, AuthError> {
        self.issue(claims.clone(), ttl).map(|(token, _)| token)
    }

    fn issue(&self, set: ClaimSet, ttl: Option<Duration>) -> Result<(String, Claims), AuthError> {
        let claims = Claims::issue(set, Utc::now(), ttl.unwrap_or(self.default_ttl));
        let token = self.codec.encode(&claims).map_err(|e| {
            tracing::error!(error = %e, "failed to sign access token");
            AuthError::from(e)
        })?;
        Ok((token, claims))
    }

    /// Verify signature, expiry and revocation.
    pub fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = self.codec.decode(token, Utc::now()).map_err(|e| {
            tracing::info!(error = %e, "access token rejected");
            AuthError::from(e)
        })?;

        if self.revocations.is_revoked(&claims.jti) {
            tracing::info!(sub = %claims.sub, jti = %claims.jti, "access token rejected: revoked");
            return Err(AuthError::RevokedToken);
        }

        Ok(claims)
    }

    /// Mark a token revoked until its natural expiry. Revoking twice, or
    /// revoking a token that has already expired, succeeds.
    pub fn revoke_token(&self, token: &str) -> Result<(), AuthError> {
        match self.codec.decode(token, Utc::now()) {
            Ok(claims) => {
                self.revocations.revoke(&claims.jti, claims.exp);
                tracing::info!(sub = %claims.sub, jti = %claims.jti, "access token revoked");
                Ok(())
            }
            Err(TokenError::Expired { .. }) => Ok(()),
            Err(e) => {
                tracing::info!(error = %e, "refusing to revoke unverifiable token");
                Err(e.into())
            }
        }
    }

    /// Resolve the token to its directory entry. Fails when the user was
    /// removed or deactivated, even if the token itself is still valid.
    pub fn get_current_user(&self, token: &str) -> Result<User, AuthError> {
        let claims = self.verify_token(token)?;
        let user = self.users.get(&claims.sub).ok_or_else(|| {
            tracing::info!(sub = %claims.sub, "token subject no longer exists");
            AuthError::Unauthorized("user not found".to_string())
        })?;

        if !user.active {
            tracing::info!(sub = %claims.sub, "token subject is inactive");
            return Err(AuthError::Unauthorized("user inactive".to_string()));
        }

        Ok(user)
    }

    /// Exchange a still-valid access token for a new one carrying the user's
    /// current roles.
    pub fn refresh(&self, token: &str) -> Result<TokenResponse, AuthError> {
        let user = self.get_current_user(token)?;
        let response = self.token_response(&user)?;
        if self.revoke_on_refresh {
            self.revoke_token(token)?;
        }
        tracing::info!(username = %user.username, "access token refreshed");
        Ok(response)
    }

    /// Revoke the caller's own token.
    pub fn logout(&self, token: &str) -> Result<(), AuthError> {
        let claims = self.verify_token(token)?;
        self.revocations.revoke(&claims.jti, claims.exp);
        tracing::info!(sub = %claims.sub, "user logged out");
        Ok(())
    }

    /// Drop revocation entries whose tokens have expired naturally.
    pub fn purge_expired_revocations(&self) -> usize {
        self.revocations.purge_expired(Utc::now())
    }

    fn token_response(&self, user: &User) -> Result<TokenResponse, AuthError> {
        let (access_token, claims) = self.issue(ClaimSet::for_user(user), None)?;
        Ok(TokenResponse {
            access_token,
            token_type: "bearer".to_string(),
            expires_in: claims.expires_in(Utc::now()),
            user: user.view(),
        })
    }

    // =========================================================================
    // Enforcement points
    // =========================================================================

    pub fn require_permission(&self, user: &User, permission: Permission) -> Result<(), AuthError> {
        if user.has_permission(permission) {
            return Ok(());
        }
        tracing::info!(username = %user.username, %permission, "permission denied");
        Err(AuthError::InsufficientPermission {
            required: permission,
        })
    }

    pub fn require_role(&self, user: &User, role: Role) -> Result<(), AuthError> {
        if user.has_role(role) {
            return Ok(());
        }
        tracing::info!(username = %user.username, %role, "role denied");
        Err(AuthError::InsufficientRole { required: role })
    }

    // =========================================================================
    // Administration
    // =========================================================================

    pub fn create_user(&self, new_user: NewUser) -> Result<User, AuthError> {
        let username = new_user.username.trim();
        if username.is_empty() {
            return Err(AuthError::InvalidInput("username must not be empty".into()));
        }
        if new_user.password.is_empty() {
            return Err(AuthError::InvalidInput("password must not be empty".into()));
        }
        let roles = non_empty_roles(new_user.roles)?;

        let user = User {
            username: username.to_string(),
            email: new_user.email,
            roles,
            active: true,
            password_hash: self.hasher.hash(&new_user.password)?,
            created_at: Utc::now(),
        };
        self.users.insert(user.clone())?;

        tracing::info!(username = %user.username, roles = ?user.roles, "user created");
        Ok(user)
    }

    pub fn update_user_roles(&self, username: &str, roles: Vec<Role>) -> Result<User, AuthError> {
        let roles = non_empty_roles(roles)?;
        let user = self
            .users
            .update(username, &mut |user| user.roles = roles.clone())?;
        tracing::info!(username, roles = ?user.roles, "user roles updated");
        Ok(user)
    }

    pub fn deactivate_user(&self, username: &str) -> Result<User, AuthError> {
        let user = self.users.update(username, &mut |user| user.active = false)?;
        tracing::info!(username, "user deactivated");
        Ok(user)
    }

    pub fn get_user(&self, username: &str) -> Option<User> {
        self.users.get(username)
    }

    pub fn list_users(&self) -> Vec<User> {
        self.users.list()
    }
}

fn non_empty_roles(roles: Vec<Role>) -> Result<BTreeSet<Role>, AuthError> {
    let roles: BTreeSet<Role> = roles.into_iter().collect();
    if roles.is_empty() {
        return Err(AuthError::InvalidInput("at least one role is required".into()));
    }
    Ok(roles)
}
