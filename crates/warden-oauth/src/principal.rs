//! Authorization results handed to the rest of the system.

use serde::Serialize;
use warden_core::{Permission, Scope, ScopeSet, User};
use warden_k8s::K8sServiceAccountInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Local,
    Kubernetes,
}

/// A resolved bearer token. `scopes` are already hierarchy-expanded.
#[derive(Debug, Clone)]
pub struct BearerAuthResult {
    pub token_type: TokenType,
    pub k8s_info: Option<K8sServiceAccountInfo>,
    pub user: Option<User>,
    pub scopes: ScopeSet,
}

impl BearerAuthResult {
    pub fn subject(&self) -> String {
        match (&self.user, &self.k8s_info) {
            (Some(user), _) => user.username.clone(),
            (None, Some(info)) => info.subject(),
            (None, None) => String::new(),
        }
    }
}

/// What an endpoint demands of its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Any valid principal.
    Authenticated,
    Scope(Scope),
    /// Local users are checked against their roles; ServiceAccounts against
    /// [`Permission::scope`].
    Permission(Permission),
}

impl From<Scope> for Requirement {
    fn from(scope: Scope) -> Self {
        Requirement::Scope(scope)
    }
}

impl From<Permission> for Requirement {
    fn from(permission: Permission) -> Self {
        Requirement::Permission(permission)
    }
}

/// The authenticated caller plus its expanded scopes.
#[derive(Debug, Clone)]
pub struct Principal {
    pub subject: String,
    pub kind: TokenType,
    pub scopes: ScopeSet,
    pub user: Option<User>,
    pub service_account: Option<K8sServiceAccountInfo>,
}

impl From<BearerAuthResult> for Principal {
    fn from(result: BearerAuthResult) -> Self {
        Self {
            subject: result.subject(),
            kind: result.token_type,
            scopes: result.scopes,
            user: result.user,
            service_account: result.k8s_info,
        }
    }
}
