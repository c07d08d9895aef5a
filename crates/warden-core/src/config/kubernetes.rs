//! Kubernetes ServiceAccount validation settings.

use super::{ConfigError, default_true, parse_duration};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settings for the ServiceAccount path and the optional live cluster calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KubernetesConfig {
    /// Accept ServiceAccount tokens at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Base URL of the cluster API server.
    #[serde(default = "default_api_server_url")]
    pub api_server_url: String,

    /// Token Warden presents to the API server for TokenReview and RBAC listing.
    #[serde(default = "default_token_file")]
    pub token_file: PathBuf,

    /// PEM bundle used to verify the API server certificate.
    #[serde(default)]
    pub ca_file: Option<PathBuf>,

    /// Upper bound on each cluster call (e.g., "5s").
    #[serde(default = "default_timeout")]
    pub timeout: String,

    /// Audience every ServiceAccount token must carry, if set. Also sent with
    /// each TokenReview.
    #[serde(default)]
    pub expected_audience: Option<String>,

    /// Fall back to name-based scope assignment when live RBAC is unavailable.
    /// When disabled, unresolved ServiceAccounts receive the minimal read scopes.
    #[serde(default = "default_true")]
    pub name_heuristics: bool,

    /// Resolve scopes from the ServiceAccount's live role bindings.
    #[serde(default)]
    pub live_rbac: bool,

    /// Require a successful TokenReview for every ServiceAccount token.
    /// Without it, ServiceAccount tokens only receive the minimal read scopes.
    #[serde(default)]
    pub require_token_review: bool,
}

fn default_api_server_url() -> String {
    "https://kubernetes.default.svc".to_string()
}

fn default_token_file() -> PathBuf {
    PathBuf::from("/var/run/secrets/kubernetes.io/serviceaccount/token")
}

fn default_timeout() -> String {
    "5s".to_string()
}

impl Default for KubernetesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_server_url: default_api_server_url(),
            token_file: default_token_file(),
            ca_file: None,
            timeout: default_timeout(),
            expected_audience: None,
            name_heuristics: true,
            live_rbac: false,
            require_token_review: false,
        }
    }
}

impl KubernetesConfig {
    pub fn request_timeout(&self) -> Result<std::time::Duration, ConfigError> {
        parse_duration("kubernetes.timeout", &self.timeout)
    }

    /// Whether any live cluster call is configured.
    pub fn needs_api_client(&self) -> bool {
        self.enabled && (self.live_rbac || self.require_token_review)
    }
}
