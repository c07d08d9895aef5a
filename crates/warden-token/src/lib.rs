//! # warden-token
//!
//! Local access tokens for Warden.
//!
//! - [`KeyPair`]: Ed25519 signing key management
//! - [`TokenCodec`]: signs a [`Claims`] set into a bearer string and back
//! - [`BiscuitTokenCodec`]: the Biscuit-backed codec used in production
//! - [`RevocationStore`]: token identifiers invalidated before natural expiry
//!
//! Tokens are Biscuit authority blocks carrying `subject`, `role`, `email`,
//! `issued_at`, `expires_at` and `token_id` facts. The codec never trusts a
//! token whose signature does not verify against the process key, and rejects
//! any token without an `expires_at` fact.

pub mod claims;
pub mod codec;
pub mod error;
pub mod keys;
pub mod revocation;

pub use claims::{ClaimSet, Claims};
pub use codec::{BiscuitTokenCodec, TokenCodec, looks_like_local_token};
pub use error::TokenError;
pub use keys::KeyPair;
pub use revocation::{InMemoryRevocationStore, RevocationStore};
