//! # warden-k8s
//!
//! Kubernetes ServiceAccount tokens, translated into Warden scopes.
//!
//! - [`jwt`]: offline decoding of ServiceAccount JWT claims
//! - [`rbac`]: the typed `verb:resource` grammar
//! - [`RbacScopeMap`]: role names, ServiceAccount naming conventions and
//!   `verb:resource` pairs → scopes
//! - [`ScopeHierarchy`]: broad scopes imply narrower ones
//! - [`K8sTokenParser`]: validation entry points
//! - [`client`]: TokenReview and RBAC-binding calls against the API server
//!
//! Offline parsing does not verify the token signature. Deployments that need
//! that guarantee enable the live TokenReview, which is layered on top of the
//! offline expiry and subject checks rather than replacing them.

pub mod client;
pub mod error;
pub mod hierarchy;
pub mod jwt;
pub mod parser;
pub mod rbac;
pub mod scope_map;

pub use client::{
    BoundRole, KubeApiClient, PolicyRule, RbacIntrospector, ReviewedUser, RoleKind,
    TokenReviewStatus, TokenReviewer,
};
pub use error::K8sError;
pub use hierarchy::ScopeHierarchy;
pub use jwt::{JwtClaims, ServiceAccountRef};
pub use parser::{K8sServiceAccountInfo, K8sTokenParser, ScopeSource};
pub use rbac::{RbacPermission, Verb};
pub use scope_map::RbacScopeMap;
