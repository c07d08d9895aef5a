//! OAuth2 scope vocabulary.
//!
//! Every capability is named `kubernetes:<capability>`. Both identity sources
//! are reduced to a [`ScopeSet`] before any authorization decision is made.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A single capability scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Scope {
    #[serde(rename = "kubernetes:cluster_info")]
    ClusterInfo,
    #[serde(rename = "kubernetes:pods_read")]
    PodsRead,
    #[serde(rename = "kubernetes:logs_read")]
    LogsRead,
    #[serde(rename = "kubernetes:events_read")]
    EventsRead,
    #[serde(rename = "kubernetes:deployments_read")]
    DeploymentsRead,
    #[serde(rename = "kubernetes:services_read")]
    ServicesRead,
    #[serde(rename = "kubernetes:nodes_read")]
    NodesRead,
    #[serde(rename = "kubernetes:toolsets_read")]
    ToolsetsRead,
    #[serde(rename = "kubernetes:investigate")]
    Investigate,
    #[serde(rename = "kubernetes:chat")]
    Chat,
    #[serde(rename = "kubernetes:admin:config")]
    AdminConfig,
    #[serde(rename = "kubernetes:admin:users")]
    AdminUsers,
    #[serde(rename = "kubernetes:admin:system")]
    AdminSystem,
}

/// Ordered set of scopes. Ordering keeps logs and responses deterministic.
pub type ScopeSet = BTreeSet<Scope>;

const SCOPE_PREFIX: &str = "kubernetes:";

impl Scope {
    pub const ALL: [Scope; 13] = [
        Scope::ClusterInfo,
        Scope::PodsRead,
        Scope::LogsRead,
        Scope::EventsRead,
        Scope::DeploymentsRead,
        Scope::ServicesRead,
        Scope::NodesRead,
        Scope::ToolsetsRead,
        Scope::Investigate,
        Scope::Chat,
        Scope::AdminConfig,
        Scope::AdminUsers,
        Scope::AdminSystem,
    ];

    /// Read-only cluster scopes.
    pub const READ_TIER: [Scope; 7] = [
        Scope::ClusterInfo,
        Scope::PodsRead,
        Scope::LogsRead,
        Scope::EventsRead,
        Scope::DeploymentsRead,
        Scope::ServicesRead,
        Scope::NodesRead,
    ];

    /// Scopes assigned when nothing better is known about a ServiceAccount.
    pub const MINIMAL: [Scope; 2] = [Scope::ClusterInfo, Scope::PodsRead];

    /// Capability name without the `kubernetes:` prefix.
    pub fn capability(self) -> &'static str {
        match self {
            Scope::ClusterInfo => "cluster_info",
            Scope::PodsRead => "pods_read",
            Scope::LogsRead => "logs_read",
            Scope::EventsRead => "events_read",
            Scope::DeploymentsRead => "deployments_read",
            Scope::ServicesRead => "services_read",
            Scope::NodesRead => "nodes_read",
            Scope::ToolsetsRead => "toolsets_read",
            Scope::Investigate => "investigate",
            Scope::Chat => "chat",
            Scope::AdminConfig => "admin:config",
            Scope::AdminUsers => "admin:users",
            Scope::AdminSystem => "admin:system",
        }
    }

    pub fn is_admin(self) -> bool {
        matches!(
            self,
            Scope::AdminConfig | Scope::AdminUsers | Scope::AdminSystem
        )
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCOPE_PREFIX}{}", self.capability())
    }
}

impl FromStr for Scope {
    type Err = String;

    /// Accepts both `kubernetes:pods_read` and the bare `pods_read` form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let capability = s.strip_prefix(SCOPE_PREFIX).unwrap_or(s);
        Scope::ALL
            .into_iter()
            .find(|scope| scope.capability() == capability)
            .ok_or_else(|| format!("unknown scope '{s}'"))
    }
}
