//! Bearer token classification.

use warden_k8s::JwtClaims;
use warden_token::looks_like_local_token;

/// Which validation path a bearer token belongs to. Decided once from the
/// token's structure and unverified claims; never by trying each validator.
#[derive(Debug, Clone)]
pub enum ParsedToken {
    /// Dot-free Biscuit issued by this service.
    Local,
    /// Three-part JWT whose issuer or subject names a ServiceAccount.
    ServiceAccount(Box<JwtClaims>),
    Unrecognized(Unrecognized),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unrecognized {
    /// Neither a Biscuit nor a decodable JWT.
    Malformed,
    /// A decodable JWT from some other issuer.
    ForeignIssuer,
}

impl ParsedToken {
    pub fn classify(token: &str) -> Self {
        if token.split('.').count() == 3 {
            return match JwtClaims::decode_unverified(token) {
                Ok(claims) if claims.looks_like_service_account() => {
                    ParsedToken::ServiceAccount(Box::new(claims))
                }
                Ok(_) => ParsedToken::Unrecognized(Unrecognized::ForeignIssuer),
                Err(_) => ParsedToken::Unrecognized(Unrecognized::Malformed),
            };
        }

        if looks_like_local_token(token) {
            ParsedToken::Local
        } else {
            ParsedToken::Unrecognized(Unrecognized::Malformed)
        }
    }
}
