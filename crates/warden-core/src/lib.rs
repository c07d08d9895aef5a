//! # warden-core
//!
//! Shared vocabulary for every Warden crate:
//!
//! - [`Role`] / [`Permission`]: the fixed local capability model
//! - [`Scope`]: the `kubernetes:<capability>` OAuth2 scope vocabulary that both
//!   identity sources are translated into
//! - [`User`]: a local directory entry
//! - [`AuthError`]: the single error taxonomy surfaced to callers
//! - [`config`]: TOML configuration types

pub mod config;
pub mod error;
pub mod role;
pub mod scope;
pub mod user;

pub use config::{AuthConfig, KubernetesConfig, SeedUser, ServerConfig, WardenConfig};
pub use error::AuthError;
pub use role::{Permission, Role};
pub use scope::{Scope, ScopeSet};
pub use user::{NewUser, User, UserView};
