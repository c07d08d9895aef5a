//! Error types for the Kubernetes crate.

use thiserror::Error;
use warden_core::AuthError;

/// Errors from token decoding and cluster calls.
#[derive(Debug, Error)]
pub enum K8sError {
    /// Token is not a three-part JWT or its payload is not valid JSON.
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// The cluster call did not complete within the configured timeout.
    #[error("cluster request timed out")]
    Timeout,

    /// Transport-level failure talking to the API server.
    #[error("cluster request failed: {0}")]
    Http(String),

    /// API server answered with a non-success status.
    #[error("cluster returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// API server answered with an unexpected body.
    #[error("failed to decode cluster response: {0}")]
    Decode(String),

    /// API server reviewed the token and did not accept it.
    #[error("token rejected by cluster: {0}")]
    Rejected(String),

    /// The collaborator needed for this call is not configured.
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    /// Client setup failed (token file, CA bundle).
    #[error("invalid cluster client configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for K8sError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            K8sError::Timeout
        } else if err.is_decode() {
            K8sError::Decode(err.to_string())
        } else {
            K8sError::Http(err.to_string())
        }
    }
}

impl From<K8sError> for AuthError {
    fn from(err: K8sError) -> Self {
        match err {
            K8sError::MalformedToken(_) => AuthError::MalformedToken,
            K8sError::Config(reason) => AuthError::Internal(reason),
            K8sError::Rejected(reason) => AuthError::Unauthorized(reason),
            other => AuthError::UpstreamUnavailable(other.to_string()),
        }
    }
}
