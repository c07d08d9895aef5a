//! Offline decoding of ServiceAccount JWT claims.

use crate::error::K8sError;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

/// Issuer of legacy (secret-based) ServiceAccount tokens.
pub const LEGACY_ISSUER: &str = "kubernetes/serviceaccount";

/// Subject prefix of every ServiceAccount identity.
pub const SUBJECT_PREFIX: &str = "system:serviceaccount:";

/// Claims of a ServiceAccount JWT, covering both projected and legacy tokens.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JwtClaims {
    #[serde(default)]
    pub iss: Option<String>,

    #[serde(default)]
    pub sub: Option<String>,

    #[serde(default, deserialize_with = "one_or_many")]
    pub aud: Vec<String>,

    #[serde(default)]
    pub exp: Option<i64>,

    #[serde(default)]
    pub iat: Option<i64>,

    #[serde(default)]
    pub nbf: Option<i64>,

    /// Projected-token identity block.
    #[serde(default, rename = "kubernetes.io")]
    pub kubernetes: Option<KubernetesClaim>,

    #[serde(default, rename = "kubernetes.io/serviceaccount/namespace")]
    pub legacy_namespace: Option<String>,

    #[serde(default, rename = "kubernetes.io/serviceaccount/service-account.name")]
    pub legacy_name: Option<String>,

    #[serde(default, rename = "kubernetes.io/serviceaccount/service-account.uid")]
    pub legacy_uid: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KubernetesClaim {
    #[serde(default)]
    pub namespace: Option<String>,

    #[serde(default)]
    pub serviceaccount: Option<ObjectRef>,

    #[serde(default)]
    pub pod: Option<ObjectRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObjectRef {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub uid: Option<String>,
}

/// Namespace and name of a ServiceAccount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAccountRef {
    pub namespace: String,
    pub name: String,
}

impl ServiceAccountRef {
    /// Parse `system:serviceaccount:<namespace>:<name>`. Both parts must be
    /// non-empty and contain no further `:`.
    pub fn from_subject(subject: &str) -> Option<Self> {
        let rest = subject.strip_prefix(SUBJECT_PREFIX)?;
        let (namespace, name) = rest.split_once(':')?;
        if namespace.is_empty() || name.is_empty() || name.contains(':') {
            return None;
        }
        Some(Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
    }

    pub fn subject(&self) -> String {
        format!("{SUBJECT_PREFIX}{}:{}", self.namespace, self.name)
    }
}

impl JwtClaims {
    /// Decode the payload segment of a `header.payload.signature` token.
    /// The signature is not checked.
    pub fn decode_unverified(token: &str) -> Result<Self, K8sError> {
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 || parts[0].is_empty() || parts[1].is_empty() {
            return Err(K8sError::MalformedToken(
                "expected three dot-separated segments".to_string(),
            ));
        }

        let payload = URL_SAFE_NO_PAD
            .decode(parts[1].trim_end_matches('='))
            .map_err(|e| K8sError::MalformedToken(format!("payload is not base64url: {e}")))?;

        serde_json::from_slice(&payload)
            .map_err(|e| K8sError::MalformedToken(format!("payload is not a claim set: {e}")))
    }

    /// Whether the issuer or subject marks this as a ServiceAccount token.
    pub fn looks_like_service_account(&self) -> bool {
        self.iss.as_deref() == Some(LEGACY_ISSUER)
            || self
                .sub
                .as_deref()
                .is_some_and(|sub| sub.starts_with(SUBJECT_PREFIX))
    }

    pub fn service_account(&self) -> Option<ServiceAccountRef> {
        self.sub.as_deref().and_then(ServiceAccountRef::from_subject)
    }

    /// Namespace and name asserted outside the subject, if any.
    pub fn asserted_identity(&self) -> (Option<&str>, Option<&str>) {
        let projected = self.kubernetes.as_ref();
        let namespace = projected
            .and_then(|k| k.namespace.as_deref())
            .or(self.legacy_namespace.as_deref());
        let name = projected
            .and_then(|k| k.serviceaccount.as_ref())
            .and_then(|sa| sa.name.as_deref())
            .or(self.legacy_name.as_deref());
        (namespace, name)
    }

    pub fn uid(&self) -> Option<String> {
        self.kubernetes
            .as_ref()
            .and_then(|k| k.serviceaccount.as_ref())
            .and_then(|sa| sa.uid.clone())
            .or_else(|| self.legacy_uid.clone())
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
    }

    pub fn not_before(&self) -> Option<DateTime<Utc>> {
        self.nbf.and_then(|nbf| DateTime::from_timestamp(nbf, 0))
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(aud)) => vec![aud],
        Some(OneOrMany::Many(auds)) => auds,
        None => Vec::new(),
    })
}
