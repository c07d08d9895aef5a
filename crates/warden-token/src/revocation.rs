//! Revoked token identifiers.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Records token identifiers invalidated before their natural expiry.
///
/// Entries must stay until the token's own expiry has passed; only then may
/// [`RevocationStore::purge_expired`] drop them.
pub trait RevocationStore: Send + Sync {
    /// Mark `token_id` revoked until `expires_at`. Repeat calls are no-ops.
    fn revoke(&self, token_id: &str, expires_at: DateTime<Utc>);

    fn is_revoked(&self, token_id: &str) -> bool;

    /// Drop entries whose token has expired by `now`. Returns how many were removed.
    fn purge_expired(&self, now: DateTime<Utc>) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local revocation list.
#[derive(Debug, Default)]
pub struct InMemoryRevocationStore {
    entries: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl InMemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RevocationStore for InMemoryRevocationStore {
    fn revoke(&self, token_id: &str, expires_at: DateTime<Utc>) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.entry(token_id.to_string()).or_insert(expires_at);
        if expires_at > *entry {
            *entry = expires_at;
        }
    }

    fn is_revoked(&self, token_id: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(token_id)
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, expires_at| *expires_at > now);
        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!(removed, remaining = entries.len(), "purged expired revocations");
        }
        removed
    }

    fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
