//! RBAC → scope translation tables.
//!
//! Three inputs are translated, in order of authority:
//!
//! 1. role names bound to the ServiceAccount (live lookup)
//! 2. `verb:resource` rules of those roles (live lookup)
//! 3. the ServiceAccount's own name, when no live lookup is available
//!
//! The name heuristic is an auditable fallback, not a security boundary; it
//! can be switched off, in which case unresolved accounts get [`Scope::MINIMAL`].

use crate::rbac::RbacPermission;
use warden_core::{Scope, ScopeSet};

const ADMIN_TIER: &[Scope] = &[Scope::AdminSystem, Scope::AdminUsers, Scope::AdminConfig];

const INVESTIGATION_TIER: &[Scope] = &[
    Scope::Investigate,
    Scope::Chat,
    Scope::ToolsetsRead,
    Scope::ClusterInfo,
    Scope::PodsRead,
    Scope::LogsRead,
    Scope::EventsRead,
    Scope::DeploymentsRead,
    Scope::ServicesRead,
    Scope::NodesRead,
];

const WORKLOAD_RESOURCES: &[&str] = &["deployments", "replicasets", "statefulsets", "daemonsets"];

const IDENTITY_RESOURCES: &[&str] = &[
    "serviceaccounts",
    "roles",
    "rolebindings",
    "clusterroles",
    "clusterrolebindings",
];

/// Static translation tables. Never mutated after construction.
#[derive(Debug, Clone)]
pub struct RbacScopeMap {
    name_heuristics: bool,
}

impl Default for RbacScopeMap {
    fn default() -> Self {
        Self {
            name_heuristics: true,
        }
    }
}

impl RbacScopeMap {
    pub fn new(name_heuristics: bool) -> Self {
        Self { name_heuristics }
    }

    pub fn name_heuristics_enabled(&self) -> bool {
        self.name_heuristics
    }

    /// Scopes granted by a canonical RBAC role name. Unknown roles grant nothing.
    pub fn scopes_for_role(&self, role: &str) -> &'static [Scope] {
        match role {
            "cluster-admin" => &[Scope::AdminSystem, Scope::AdminUsers, Scope::AdminConfig],
            "admin" => &[
                Scope::AdminUsers,
                Scope::AdminConfig,
                Scope::Investigate,
                Scope::Chat,
            ],
            "edit" => &[
                Scope::Investigate,
                Scope::Chat,
                Scope::ClusterInfo,
                Scope::PodsRead,
                Scope::LogsRead,
                Scope::EventsRead,
                Scope::DeploymentsRead,
                Scope::ServicesRead,
                Scope::NodesRead,
            ],
            "view" => &Scope::READ_TIER,
            _ => &[],
        }
    }

    pub fn scopes_for_roles<S: AsRef<str>>(&self, roles: &[S]) -> ScopeSet {
        roles
            .iter()
            .flat_map(|role| self.scopes_for_role(role.as_ref()).iter().copied())
            .collect()
    }

    /// Scope tier implied by a ServiceAccount's name.
    ///
    /// With heuristics disabled every name maps to the minimal tier.
    pub fn scopes_for_service_account_name(&self, name: &str) -> ScopeSet {
        if !self.name_heuristics {
            return Scope::MINIMAL.into_iter().collect();
        }

        let name = name.to_ascii_lowercase();
        let tier: &[Scope] = if name.contains("admin") {
            ADMIN_TIER
        } else if name.contains("holmesgpt") || name.contains("investigator") {
            INVESTIGATION_TIER
        } else {
            &Scope::MINIMAL
        };
        tier.iter().copied().collect()
    }

    /// Scopes granted by one parsed permission.
    pub fn scopes_for_permission(&self, permission: &RbacPermission) -> ScopeSet {
        let mut scopes = ScopeSet::new();
        let verb = permission.verb;

        if permission.resource == "*" && verb == crate::rbac::Verb::Any {
            scopes.insert(Scope::AdminSystem);
        }

        if verb.is_read() {
            if permission.covers("pods") {
                scopes.insert(Scope::PodsRead);
            }
            if permission.covers("pods/log") {
                scopes.insert(Scope::LogsRead);
            }
            if permission.covers("events") {
                scopes.insert(Scope::EventsRead);
            }
            if WORKLOAD_RESOURCES.iter().any(|r| permission.covers(r)) {
                scopes.insert(Scope::DeploymentsRead);
            }
            if permission.covers("services") || permission.covers("endpoints") {
                scopes.insert(Scope::ServicesRead);
            }
            if permission.covers("nodes") {
                scopes.insert(Scope::NodesRead);
                scopes.insert(Scope::ClusterInfo);
            }
            if permission.covers("namespaces") {
                scopes.insert(Scope::ClusterInfo);
            }
        }

        if verb.is_write() {
            if permission.covers("configmaps") {
                scopes.insert(Scope::AdminConfig);
            }
            if IDENTITY_RESOURCES.iter().any(|r| permission.covers(r)) {
                scopes.insert(Scope::AdminUsers);
            }
        }

        scopes
    }

    /// Parse `verb:resource` strings and translate them. Unparseable or
    /// unrecognized entries contribute nothing.
    pub fn map_rbac_to_scopes<S: AsRef<str>>(&self, permissions: &[S]) -> ScopeSet {
        RbacPermission::parse_all(permissions)
            .iter()
            .flat_map(|p| self.scopes_for_permission(p))
            .collect()
    }
}
