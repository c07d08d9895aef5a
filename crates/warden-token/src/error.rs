//! Error types for the token crate.

use thiserror::Error;
use warden_core::AuthError;

/// Errors that can occur while signing or verifying local tokens.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Failed to generate keypair.
    #[error("failed to generate keypair: {0}")]
    KeyGenerationFailed(String),

    /// Failed to parse private key.
    #[error("failed to parse private key: {0}")]
    InvalidPrivateKey(String),

    /// Failed to create token.
    #[error("failed to create token: {0}")]
    CreationFailed(String),

    /// Token could not be parsed or its signature did not verify.
    #[error("failed to parse token: {0}")]
    Malformed(String),

    /// Token has expired.
    #[error("token has expired at {expired_at}")]
    Expired { expired_at: String },

    /// Token is missing required claim.
    #[error("token missing required claim: {claim}")]
    MissingClaim { claim: String },

    /// IO error (reading/writing keys).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired { .. } => AuthError::ExpiredToken,
            TokenError::Malformed(_) | TokenError::MissingClaim { .. } => {
                AuthError::MalformedToken
            }
            TokenError::KeyGenerationFailed(_)
            | TokenError::InvalidPrivateKey(_)
            | TokenError::CreationFailed(_)
            | TokenError::Io(_) => AuthError::Internal(err.to_string()),
        }
    }
}
