//! Local roles and the fixed role → permission table.

use crate::scope::Scope;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role assigned to a local user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Operator,
    Viewer,
}

/// Capability checked by local-auth endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Investigate,
    Chat,
    ViewWorkloadHealth,
    ReadToolsets,
    ManageToolsets,
    ReadConfig,
    ManageConfig,
    ListModels,
    ManageUsers,
}

const ADMIN_PERMISSIONS: &[Permission] = &Permission::ALL;

const VIEWER_PERMISSIONS: &[Permission] = &[
    Permission::ViewWorkloadHealth,
    Permission::ReadToolsets,
    Permission::ReadConfig,
    Permission::ListModels,
];

const OPERATOR_PERMISSIONS: &[Permission] = &[
    Permission::ViewWorkloadHealth,
    Permission::ReadToolsets,
    Permission::ReadConfig,
    Permission::ListModels,
    Permission::Investigate,
    Permission::Chat,
];

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Operator, Role::Viewer];

    /// Permissions granted by this role. The table is static.
    pub fn permissions(self) -> &'static [Permission] {
        match self {
            Role::Admin => ADMIN_PERMISSIONS,
            Role::Operator => OPERATOR_PERMISSIONS,
            Role::Viewer => VIEWER_PERMISSIONS,
        }
    }

    pub fn grants(self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Operator => "operator",
            Role::Viewer => "viewer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "operator" => Ok(Role::Operator),
            "viewer" => Ok(Role::Viewer),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

impl Permission {
    pub const ALL: [Permission; 9] = [
        Permission::Investigate,
        Permission::Chat,
        Permission::ViewWorkloadHealth,
        Permission::ReadToolsets,
        Permission::ManageToolsets,
        Permission::ReadConfig,
        Permission::ManageConfig,
        Permission::ListModels,
        Permission::ManageUsers,
    ];

    /// Scope that grants this permission to a ServiceAccount principal.
    ///
    /// Local users are given the scopes of their permissions, so one scope
    /// comparison decides for both identity sources.
    pub fn scope(self) -> Scope {
        match self {
            Permission::Investigate => Scope::Investigate,
            Permission::Chat => Scope::Chat,
            Permission::ViewWorkloadHealth => Scope::PodsRead,
            Permission::ReadToolsets => Scope::ToolsetsRead,
            Permission::ManageToolsets => Scope::AdminConfig,
            Permission::ReadConfig => Scope::ClusterInfo,
            Permission::ManageConfig => Scope::AdminConfig,
            Permission::ListModels => Scope::ClusterInfo,
            Permission::ManageUsers => Scope::AdminUsers,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Permission::Investigate => "investigate",
            Permission::Chat => "chat",
            Permission::ViewWorkloadHealth => "view_workload_health",
            Permission::ReadToolsets => "read_toolsets",
            Permission::ManageToolsets => "manage_toolsets",
            Permission::ReadConfig => "read_config",
            Permission::ManageConfig => "manage_config",
            Permission::ListModels => "list_models",
            Permission::ManageUsers => "manage_users",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown permission '{s}'"))
    }
}
