//! Scope implication rules.

use warden_core::{Scope, ScopeSet};

/// Broad scopes imply narrower ones.
///
/// `expand` is a closure over [`ScopeHierarchy::implied_by`], so the result is
/// always a superset of the input and expanding twice changes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScopeHierarchy;

const ADMIN_IMPLIED: &[Scope] = &[
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

impl ScopeHierarchy {
    /// Scopes directly implied by `scope` (one step, not transitive).
    pub fn implied_by(scope: Scope) -> &'static [Scope] {
        match scope {
            Scope::AdminSystem => &[Scope::AdminUsers, Scope::AdminConfig],
            Scope::AdminUsers | Scope::AdminConfig => ADMIN_IMPLIED,
            Scope::Investigate => &Scope::READ_TIER,
            _ => &[],
        }
    }

    pub fn expand(&self, scopes: &ScopeSet) -> ScopeSet {
        let mut expanded = scopes.clone();
        let mut pending: Vec<Scope> = scopes.iter().copied().collect();

        while let Some(scope) = pending.pop() {
            for implied in Self::implied_by(scope) {
                if expanded.insert(*implied) {
                    pending.push(*implied);
                }
            }
        }

        expanded
    }

    /// Whether `granted` (after expansion) contains `required`.
    pub fn implies(&self, granted: &ScopeSet, required: Scope) -> bool {
        granted.contains(&required) || self.expand(granted).contains(&required)
    }
}
