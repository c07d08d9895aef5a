//! Configuration types for Warden.
//!
//! Configuration is a single TOML file (`warden.toml` by default):
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:8080"
//!
//! [auth]
//! access_token_ttl = "30m"
//!
//! [[auth.users]]
//! username = "alice"
//! password = "s3cret"
//! roles = ["operator"]
//!
//! [kubernetes]
//! live_rbac = true
//! ```
//!
//! Every section and field has a default, so an empty file is valid.

pub mod auth;
pub mod kubernetes;

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub use auth::{AuthConfig, SeedUser};
pub use kubernetes::KubernetesConfig;

/// Errors raised while loading or interpreting configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid duration '{value}' for {field}: {reason}")]
    InvalidDuration {
        field: &'static str,
        value: String,
        reason: String,
    },
}

/// Complete Warden configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WardenConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub kubernetes: KubernetesConfig,
}

impl WardenConfig {
    /// Parse configuration from a TOML string.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Load configuration from a file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address, e.g. "0.0.0.0:8080"
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Default tracing filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            log_level: default_log_level(),
        }
    }
}

/// Parse a humantime duration string ("30m", "5s", "1h 30m").
pub(crate) fn parse_duration(
    field: &'static str,
    value: &str,
) -> Result<std::time::Duration, ConfigError> {
    humantime::parse_duration(value).map_err(|e| ConfigError::InvalidDuration {
        field,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn default_true() -> bool {
    true
}
