//! # warden-oauth
//!
//! The single authorization entry point. A bearer token is classified once
//! ([`ParsedToken`]), resolved through the local [`AuthService`] or the
//! [`K8sTokenParser`], and the resulting scope set is compared against the
//! endpoint's [`Requirement`].
//!
//! [`AuthService`]: warden_auth::AuthService
//! [`K8sTokenParser`]: warden_k8s::K8sTokenParser

pub mod principal;
pub mod resource_server;
pub mod token;

pub use principal::{BearerAuthResult, Principal, Requirement, TokenType};
pub use resource_server::{OAuth2ResourceServer, bearer_token};
pub use token::{ParsedToken, Unrecognized};
