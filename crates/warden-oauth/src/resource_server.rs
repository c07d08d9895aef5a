//! OAuth2 resource server over both identity sources.

use crate::principal::{BearerAuthResult, Principal, Requirement, TokenType};
use crate::token::{ParsedToken, Unrecognized};
use chrono::Utc;
use std::sync::Arc;
use warden_auth::AuthService;
use warden_core::{AuthError, KubernetesConfig, Scope, ScopeSet};
use warden_k8s::{JwtClaims, K8sError, K8sTokenParser, ScopeHierarchy, ScopeSource};

/// Extract the token from an `Authorization` header value.
///
/// The scheme is matched case-insensitively and may be followed by any run of
/// whitespace; the token must be non-empty and contain no whitespace.
pub fn bearer_token(auth_header: &str) -> Option<&str> {
    let (scheme, token) = auth_header.trim().split_once(char::is_whitespace)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim_start();
    if token.is_empty() || token.contains(char::is_whitespace) {
        return None;
    }
    Some(token)
}

/// Classifies bearer tokens, resolves them to scopes and decides requests.
///
/// ServiceAccount signatures are never checked locally. Unless a TokenReview is
/// required, a ServiceAccount token is held to the minimal read scopes whatever
/// its claimed name or bindings.
#[derive(Clone)]
pub struct OAuth2ResourceServer {
    auth: Arc<AuthService>,
    k8s: Option<K8sTokenParser>,
    hierarchy: ScopeHierarchy,
    expected_audience: Option<String>,
    require_token_review: bool,
}

impl OAuth2ResourceServer {
    pub fn new(auth: Arc<AuthService>, k8s: K8sTokenParser) -> Self {
        Self {
            auth,
            k8s: Some(k8s),
            hierarchy: ScopeHierarchy,
            expected_audience: None,
            require_token_review: false,
        }
    }

    /// Resource server that rejects every ServiceAccount token.
    pub fn local_only(auth: Arc<AuthService>) -> Self {
        Self {
            k8s: None,
            ..Self::new(auth, K8sTokenParser::default())
        }
    }

    pub fn from_config(auth: Arc<AuthService>, cfg: &KubernetesConfig) -> Result<Self, K8sError> {
        if !cfg.enabled {
            tracing::info!("ServiceAccount tokens disabled");
            return Ok(Self::local_only(auth));
        }
        if !cfg.require_token_review {
            tracing::warn!(
                "ServiceAccount tokens limited to minimal scopes until kubernetes.require_token_review is enabled"
            );
        }
        Ok(Self::new(auth, K8sTokenParser::from_config(cfg)?)
            .with_expected_audience(cfg.expected_audience.clone())
            .with_token_review(cfg.require_token_review))
    }

    /// Audience every ServiceAccount token must carry. Also sent with each
    /// TokenReview so the cluster checks the token against it.
    pub fn with_expected_audience(mut self, audience: Option<String>) -> Self {
        self.k8s = self
            .k8s
            .map(|parser| parser.with_review_audiences(audience.iter().cloned().collect()));
        self.expected_audience = audience;
        self
    }

    /// Require a successful live TokenReview for every ServiceAccount token.
    /// Only reviewed tokens receive scopes beyond the minimal read tier.
    pub fn with_token_review(mut self, required: bool) -> Self {
        self.require_token_review = required;
        self
    }

    pub fn auth_service(&self) -> &AuthService {
        &self.auth
    }

    pub fn k8s_parser(&self) -> Option<&K8sTokenParser> {
        self.k8s.as_ref()
    }

    /// Resolve an `Authorization` header to a principal and its scopes.
    /// Every failure is logged and collapses to `None`.
    pub async fn validate_bearer_token(&self, auth_header: &str) -> Option<BearerAuthResult> {
        match self.resolve(Some(auth_header)).await {
            Ok(result) => Some(result),
            Err(e) => {
                tracing::info!(error = %e, "bearer token rejected");
                None
            }
        }
    }

    /// Translate `verb:resource` strings to scopes. Unknown pairs are ignored.
    pub fn map_rbac_to_scopes<S: AsRef<str>>(&self, permissions: &[S]) -> ScopeSet {
        match &self.k8s {
            Some(parser) => parser.scope_map().map_rbac_to_scopes(permissions),
            None => warden_k8s::RbacScopeMap::default().map_rbac_to_scopes(permissions),
        }
    }

    /// `required ∈ expand(granted)`.
    pub fn authorize_request(&self, granted: &ScopeSet, required: Scope) -> bool {
        self.hierarchy.implies(granted, required)
    }

    pub async fn validate_with_k8s_api_server(&self, token: &str, api_server_url: &str) -> bool {
        match &self.k8s {
            Some(parser) => parser.validate_k8s_api_server_token(token, api_server_url).await,
            None => false,
        }
    }

    /// Authenticate the header and check `requirement`.
    pub async fn authorize(
        &self,
        auth_header: Option<&str>,
        requirement: impl Into<Requirement>,
    ) -> Result<Principal, AuthError> {
        let requirement = requirement.into();
        let result = self.resolve(auth_header).await.inspect_err(|e| {
            tracing::info!(error = %e, "authentication failed");
        })?;

        let allowed = match requirement {
            Requirement::Authenticated => true,
            Requirement::Scope(scope) => self.authorize_request(&result.scopes, scope),
            Requirement::Permission(permission) => match &result.user {
                Some(user) => user.has_permission(permission),
                None => self.authorize_request(&result.scopes, permission.scope()),
            },
        };

        if !allowed {
            let subject = result.subject();
            tracing::info!(%subject, ?requirement, "request denied");
            return Err(match requirement {
                Requirement::Permission(required) => AuthError::InsufficientPermission { required },
                Requirement::Scope(required) => AuthError::InsufficientScope { required },
                Requirement::Authenticated => {
                    AuthError::Unauthorized("not authenticated".to_string())
                }
            });
        }

        Ok(result.into())
    }

    /// Classify once, then validate on the matching path.
    pub async fn resolve(&self, auth_header: Option<&str>) -> Result<BearerAuthResult, AuthError> {
        let token = auth_header
            .and_then(bearer_token)
            .ok_or_else(|| AuthError::Unauthorized("missing or malformed bearer header".to_string()))?;

        match ParsedToken::classify(token) {
            ParsedToken::Local => self.resolve_local(token),
            ParsedToken::ServiceAccount(claims) => self.resolve_service_account(token, &claims).await,
            ParsedToken::Unrecognized(Unrecognized::Malformed) => Err(AuthError::MalformedToken),
            ParsedToken::Unrecognized(Unrecognized::ForeignIssuer) => {
                Err(AuthError::UnknownIssuerToken)
            }
        }
    }

    fn resolve_local(&self, token: &str) -> Result<BearerAuthResult, AuthError> {
        let user = self.auth.get_current_user(token)?;
        let scopes = self.hierarchy.expand(&user.scopes());
        Ok(BearerAuthResult {
            token_type: TokenType::Local,
            k8s_info: None,
            user: Some(user),
            scopes,
        })
    }

    async fn resolve_service_account(
        &self,
        token: &str,
        claims: &JwtClaims,
    ) -> Result<BearerAuthResult, AuthError> {
        let Some(parser) = &self.k8s else {
            return Err(AuthError::UnknownIssuerToken);
        };

        let mut info = parser
            .validate_claims(claims, Utc::now())
            .await
            .ok_or_else(|| AuthError::Unauthorized("service account token rejected".to_string()))?;

        let expected = self.expected_audience.as_deref();
        if let Some(expected) = expected.filter(|aud| !info.audiences.iter().any(|a| a == aud)) {
            tracing::warn!(
                account = %info.subject(),
                %expected,
                audiences = ?info.audiences,
                "ServiceAccount token audience mismatch"
            );
            return Err(AuthError::Unauthorized("audience mismatch".to_string()));
        }

        if self.require_token_review {
            parser
                .review_token(token, parser.api_server_url())
                .await
                .map_err(|e| {
                    tracing::warn!(account = %info.subject(), error = %e, "TokenReview failed");
                    AuthError::from(e)
                })?;
        } else if info.scopes != ScopeSet::from(Scope::MINIMAL) {
            tracing::info!(
                account = %info.subject(),
                claimed = ?info.scope_source,
                "unreviewed ServiceAccount token limited to minimal scopes"
            );
            info.scopes = ScopeSet::from(Scope::MINIMAL);
            info.scope_source = ScopeSource::MinimalDefault;
            info.rbac_permissions = None;
        }

        let scopes = self.hierarchy.expand(&info.scopes);
        Ok(BearerAuthResult {
            token_type: TokenType::Kubernetes,
            k8s_info: Some(info),
            user: None,
            scopes,
        })
    }
}
