//! Error taxonomy shared by the local and Kubernetes authorization paths.
//!
//! Token and identity failures all collapse to the same generic 401 message on
//! the wire so a client cannot tell which check rejected it. The specific cause
//! is kept in the variant for server-side logging.

use crate::role::{Permission, Role};
use crate::scope::Scope;
use thiserror::Error;

/// Errors produced while authenticating or authorizing a request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Token is structurally invalid or its signature does not verify.
    #[error("malformed token")]
    MalformedToken,

    /// Token expiry is in the past.
    #[error("token expired")]
    ExpiredToken,

    /// Token was explicitly revoked before its natural expiry.
    #[error("token revoked")]
    RevokedToken,

    /// Well-formed token from neither the local issuer nor a Kubernetes ServiceAccount.
    #[error("token issuer not recognized")]
    UnknownIssuerToken,

    /// Identity could not be established (missing header, unknown or inactive user).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Valid principal without the required scope.
    #[error("missing required scope {required}")]
    InsufficientScope { required: Scope },

    /// Valid user without the required permission.
    #[error("missing required permission {required}")]
    InsufficientPermission { required: Permission },

    /// Valid user without the required role.
    #[error("missing required role {required}")]
    InsufficientRole { required: Role },

    /// Live cluster validation timed out or errored.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Username already exists.
    #[error("user '{0}' already exists")]
    Conflict(String),

    /// Username does not exist.
    #[error("user '{0}' not found")]
    NotFound(String),

    /// Administrative input rejected (e.g. empty role set).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Unexpected internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// HTTP status code this error surfaces as.
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::MalformedToken
            | AuthError::ExpiredToken
            | AuthError::RevokedToken
            | AuthError::UnknownIssuerToken
            | AuthError::Unauthorized(_)
            | AuthError::UpstreamUnavailable(_) => 401,
            AuthError::InsufficientScope { .. }
            | AuthError::InsufficientPermission { .. }
            | AuthError::InsufficientRole { .. } => 403,
            AuthError::Conflict(_) => 409,
            AuthError::NotFound(_) => 404,
            AuthError::InvalidInput(_) => 400,
            AuthError::Internal(_) => 500,
        }
    }

    /// Message safe to return to a client.
    ///
    /// Security-sensitive failures are generic; administrative failures keep
    /// their specific reason.
    pub fn public_message(&self) -> String {
        match self.status_code() {
            401 => "Could not validate credentials".to_string(),
            403 => "Insufficient permissions".to_string(),
            500 => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }

    /// Whether this error is a token/identity failure (as opposed to a capability failure).
    pub fn is_authentication_failure(&self) -> bool {
        self.status_code() == 401
    }
}
