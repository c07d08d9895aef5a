//! Token signing and verification.

use crate::claims::Claims;
use crate::error::TokenError;
use crate::keys::KeyPair;
use biscuit_auth::builder::AuthorizerBuilder;
use biscuit_auth::macros::fact;
use biscuit_auth::{Authorizer, Biscuit, UnverifiedBiscuit};
use chrono::{DateTime, Utc};
use warden_core::Role;

/// Issuer fact stamped into every local token.
pub const LOCAL_ISSUER: &str = "warden";

/// Signs claim sets into bearer strings and verifies them back.
///
/// `decode` must verify the signature and reject tokens that lack an expiry
/// or whose expiry has passed.
pub trait TokenCodec: Send + Sync {
    fn encode(&self, claims: &Claims) -> Result<String, TokenError>;

    fn decode(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError>;
}

/// Structural check for the local token format. Does not verify anything.
pub fn looks_like_local_token(token: &str) -> bool {
    !token.contains('.') && UnverifiedBiscuit::from_base64(token).is_ok()
}

/// Biscuit-backed codec holding the process signing key.
pub struct BiscuitTokenCodec {
    keypair: KeyPair,
}

impl BiscuitTokenCodec {
    pub fn new(keypair: KeyPair) -> Self {
        Self { keypair }
    }

    fn authorizer(&self, token: &str, now: DateTime<Utc>) -> Result<Authorizer, TokenError> {
        let biscuit = Biscuit::from_base64(token, self.keypair.public_key())
            .map_err(|e| TokenError::Malformed(e.to_string()))?;

        let now = now.timestamp();
        let mut authorizer = AuthorizerBuilder::new()
            .code(format!(
                r#"
                time({now});
                allow if true;
                "#
            ))
            .map_err(|e| TokenError::Malformed(e.to_string()))?
            .build(&biscuit)
            .map_err(|e| TokenError::Malformed(e.to_string()))?;

        authorizer
            .authorize()
            .map_err(|e| TokenError::Malformed(e.to_string()))?;

        Ok(authorizer)
    }
}

impl TokenCodec for BiscuitTokenCodec {
    fn encode(&self, claims: &Claims) -> Result<String, TokenError> {
        let created = |e: biscuit_auth::error::Token| TokenError::CreationFailed(e.to_string());

        let mut builder = Biscuit::builder()
            .fact(fact!("issuer({issuer})", issuer = LOCAL_ISSUER.to_string()))
            .map_err(created)?
            .fact(fact!("subject({subject})", subject = claims.sub.clone()))
            .map_err(created)?
            .fact(fact!("token_id({jti})", jti = claims.jti.clone()))
            .map_err(created)?
            .fact(fact!("issued_at({iat})", iat = claims.iat.timestamp()))
            .map_err(created)?
            .fact(fact!("expires_at({exp})", exp = claims.exp.timestamp()))
            .map_err(created)?;

        for role in &claims.roles {
            builder = builder
                .fact(fact!("role({role})", role = role.to_string()))
                .map_err(created)?;
        }

        if let Some(email) = &claims.email {
            builder = builder
                .fact(fact!("email({email})", email = email.clone()))
                .map_err(created)?;
        }

        let biscuit = builder.build(self.keypair.inner()).map_err(created)?;
        biscuit
            .to_base64()
            .map_err(|e| TokenError::CreationFailed(e.to_string()))
    }

    fn decode(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let mut authorizer = self.authorizer(token, now)?;

        let issuer = query_first_string(&mut authorizer, "issuer")?;
        if issuer.as_deref() != Some(LOCAL_ISSUER) {
            return Err(TokenError::Malformed("unexpected issuer".to_string()));
        }

        let exp = query_first_i64(&mut authorizer, "expires_at")?.ok_or_else(|| {
            TokenError::MissingClaim {
                claim: "expires_at".to_string(),
            }
        })?;
        let exp = timestamp(exp, "expires_at")?;
        if now >= exp {
            return Err(TokenError::Expired {
                expired_at: exp.to_rfc3339(),
            });
        }

        let sub = required_string(&mut authorizer, "subject")?;
        let jti = required_string(&mut authorizer, "token_id")?;
        let iat = query_first_i64(&mut authorizer, "issued_at")?.ok_or_else(|| {
            TokenError::MissingClaim {
                claim: "issued_at".to_string(),
            }
        })?;
        let email = query_first_string(&mut authorizer, "email")?;

        let mut roles = query_strings(&mut authorizer, "role")?
            .into_iter()
            .map(|r| r.parse::<Role>().map_err(TokenError::Malformed))
            .collect::<Result<Vec<_>, _>>()?;
        roles.sort();

        Ok(Claims {
            sub,
            roles,
            email,
            iat: timestamp(iat, "issued_at")?,
            exp,
            jti,
        })
    }
}

fn timestamp(secs: i64, claim: &str) -> Result<DateTime<Utc>, TokenError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| TokenError::Malformed(format!("{claim} out of range")))
}

fn query_strings(authorizer: &mut Authorizer, name: &str) -> Result<Vec<String>, TokenError> {
    let rule = format!("data($x) <- {name}($x)");
    let res: Vec<(String,)> = authorizer
        .query(rule.as_str())
        .map_err(|e| TokenError::Malformed(e.to_string()))?;
    Ok(res.into_iter().map(|t| t.0).collect())
}

fn query_first_string(
    authorizer: &mut Authorizer,
    name: &str,
) -> Result<Option<String>, TokenError> {
    Ok(query_strings(authorizer, name)?.into_iter().next())
}

fn required_string(authorizer: &mut Authorizer, name: &str) -> Result<String, TokenError> {
    query_first_string(authorizer, name)?.ok_or_else(|| TokenError::MissingClaim {
        claim: name.to_string(),
    })
}

fn query_first_i64(authorizer: &mut Authorizer, name: &str) -> Result<Option<i64>, TokenError> {
    let rule = format!("data($x) <- {name}($x)");
    let res: Vec<(i64,)> = authorizer
        .query(rule.as_str())
        .map_err(|e| TokenError::Malformed(e.to_string()))?;
    Ok(res.into_iter().next().map(|t| t.0))
}
