//! # warden-auth
//!
//! The local-user path of Warden:
//!
//! - [`LocalIdentityStore`]: username → [`User`](warden_core::User)
//! - [`PasswordHasher`]: salted one-way hashes (Argon2id by default)
//! - [`AuthService`]: login, token issuance/verification/revocation, user
//!   administration and the permission/role enforcement points
//!
//! Deactivating a user invalidates every token issued to them, even tokens
//! that are still cryptographically valid, because [`AuthService::get_current_user`]
//! re-reads the directory on every call.

pub mod bootstrap;
pub mod password;
pub mod service;
pub mod store;

pub use bootstrap::bootstrap_users;
pub use password::{Argon2Hasher, PasswordHasher};
pub use service::{AuthService, TokenResponse};
pub use store::{InMemoryIdentityStore, LocalIdentityStore};
