//! Claims carried by local access tokens.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;
use warden_core::{Role, User};

/// What the caller asks to embed in a new token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimSet {
    pub subject: String,
    pub roles: Vec<Role>,
    #[serde(default)]
    pub email: Option<String>,
}

impl ClaimSet {
    pub fn for_user(user: &User) -> Self {
        Self {
            subject: user.username.clone(),
            roles: user.roles.iter().copied().collect(),
            email: user.email.clone(),
        }
    }
}

/// Claims of an issued token. Immutable once minted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub roles: Vec<Role>,
    #[serde(default)]
    pub email: Option<String>,
    pub iat: DateTime<Utc>,
    pub exp: DateTime<Utc>,
    /// Revocation identifier.
    pub jti: String,
}

impl Claims {
    /// Stamp a claim set with issue time, expiry and a fresh token id.
    ///
    /// A non-positive `ttl` yields a token that is already expired.
    /// Roles are stored sorted and deduplicated, the order a decoded token
    /// yields them in.
    pub fn issue(set: ClaimSet, now: DateTime<Utc>, ttl: Duration) -> Self {
        // Token timestamps have second precision.
        let now = DateTime::from_timestamp(now.timestamp(), 0).unwrap_or(now);
        let mut roles = set.roles;
        roles.sort();
        roles.dedup();
        Self {
            sub: set.subject,
            roles,
            email: set.email,
            iat: now,
            exp: now + ttl,
            jti: Uuid::new_v4().to_string(),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.exp
    }

    /// Whole seconds until expiry, zero once expired.
    pub fn expires_in(&self, now: DateTime<Utc>) -> i64 {
        (self.exp - now).num_seconds().max(0)
    }

    /// Subject, email and role set all match `set`. Role order and repeats
    /// are not significant.
    pub fn contains(&self, set: &ClaimSet) -> bool {
        let ours: BTreeSet<Role> = self.roles.iter().copied().collect();
        let theirs: BTreeSet<Role> = set.roles.iter().copied().collect();
        self.sub == set.subject && ours == theirs && self.email == set.email
    }
}
