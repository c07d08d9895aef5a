//! Local user directory.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};
use warden_core::{AuthError, User};

/// Username → user record. Users are never hard-deleted.
///
/// `update` applies the mutation as one atomic read-modify-write, so two
/// concurrent mutations of the same user cannot lose each other's changes.
pub trait LocalIdentityStore: Send + Sync {
    fn get(&self, username: &str) -> Option<User>;

    /// Insert a new user; `Conflict` if the username is taken.
    fn insert(&self, user: User) -> Result<(), AuthError>;

    /// Mutate an existing user; `NotFound` if the username is unknown.
    fn update(&self, username: &str, apply: &mut dyn FnMut(&mut User)) -> Result<User, AuthError>;

    /// All users ordered by username.
    fn list(&self) -> Vec<User>;
}

#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    users: RwLock<BTreeMap<String, User>>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalIdentityStore for InMemoryIdentityStore {
    fn get(&self, username: &str) -> Option<User> {
        self.users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(username)
            .cloned()
    }

    fn insert(&self, user: User) -> Result<(), AuthError> {
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        if users.contains_key(&user.username) {
            return Err(AuthError::Conflict(user.username));
        }
        users.insert(user.username.clone(), user);
        Ok(())
    }

    fn update(&self, username: &str, apply: &mut dyn FnMut(&mut User)) -> Result<User, AuthError> {
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        let user = users
            .get_mut(username)
            .ok_or_else(|| AuthError::NotFound(username.to_string()))?;
        apply(user);
        Ok(user.clone())
    }

    fn list(&self) -> Vec<User> {
        self.users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}
