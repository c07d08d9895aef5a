//! Local directory users.

use crate::role::{Permission, Role};
use crate::scope::ScopeSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A local user record. Permissions are never stored; they derive from `roles`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub username: String,
    pub email: Option<String>,
    pub roles: BTreeSet<Role>,
    pub active: bool,
    /// PHC-formatted password hash.
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.roles.iter().any(|role| role.grants(permission))
    }

    /// Union of the permissions of every role.
    pub fn permissions(&self) -> BTreeSet<Permission> {
        self.roles
            .iter()
            .flat_map(|role| role.permissions().iter().copied())
            .collect()
    }

    /// Scopes equivalent to this user's permissions.
    pub fn scopes(&self) -> ScopeSet {
        self.permissions().into_iter().map(Permission::scope).collect()
    }

    pub fn view(&self) -> UserView {
        UserView::from(self)
    }
}

/// Public representation of a user. Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserView {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            email: user.email.clone(),
            roles: user.roles.iter().copied().collect(),
            permissions: user.permissions().into_iter().collect(),
            active: user.active,
            created_at: user.created_at,
        }
    }
}

/// Input for creating a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub password: String,
    pub roles: Vec<Role>,
}
