//! ServiceAccount token validation.

use crate::client::{KubeApiClient, RbacIntrospector, TokenReviewer};
use crate::error::K8sError;
use crate::jwt::{JwtClaims, ServiceAccountRef};
use crate::scope_map::RbacScopeMap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use warden_core::{KubernetesConfig, Scope, ScopeSet};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Which mechanism assigned a ServiceAccount's scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeSource {
    LiveRbac,
    NameHeuristic,
    MinimalDefault,
}

/// A validated ServiceAccount identity. Built fresh on every validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct K8sServiceAccountInfo {
    pub name: String,
    pub namespace: String,
    pub uid: Option<String>,
    pub audiences: Vec<String>,
    /// Never empty.
    pub scopes: ScopeSet,
    pub expires_at: DateTime<Utc>,
    /// Flattened `verb:resource` rules from the live lookup, when one ran.
    pub rbac_permissions: Option<Vec<String>>,
    pub scope_source: ScopeSource,
}

impl K8sServiceAccountInfo {
    pub fn account(&self) -> ServiceAccountRef {
        ServiceAccountRef {
            namespace: self.namespace.clone(),
            name: self.name.clone(),
        }
    }

    pub fn subject(&self) -> String {
        self.account().subject()
    }
}

/// Validates ServiceAccount tokens and assigns scopes.
///
/// Offline checks always run. The TokenReview and RBAC collaborators are
/// optional; every call to them is bounded by the configured timeout and any
/// failure fails closed.
#[derive(Clone)]
pub struct K8sTokenParser {
    scope_map: RbacScopeMap,
    reviewer: Option<Arc<dyn TokenReviewer>>,
    rbac: Option<Arc<dyn RbacIntrospector>>,
    api_server_url: String,
    /// Sent as `spec.audiences` on every TokenReview.
    review_audiences: Vec<String>,
    timeout: Duration,
}

impl Default for K8sTokenParser {
    fn default() -> Self {
        Self::new(RbacScopeMap::default())
    }
}

impl K8sTokenParser {
    /// Offline-only parser.
    pub fn new(scope_map: RbacScopeMap) -> Self {
        Self {
            scope_map,
            reviewer: None,
            rbac: None,
            api_server_url: KubernetesConfig::default().api_server_url,
            review_audiences: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Build from `[kubernetes]` settings. The API client is only created when
    /// live RBAC or mandatory TokenReview is enabled.
    pub fn from_config(cfg: &KubernetesConfig) -> Result<Self, K8sError> {
        let timeout = cfg
            .request_timeout()
            .map_err(|e| K8sError::Config(e.to_string()))?;
        let mut parser = Self::new(RbacScopeMap::new(cfg.name_heuristics))
            .with_api_server_url(&cfg.api_server_url)
            .with_review_audiences(cfg.expected_audience.iter().cloned().collect())
            .with_timeout(timeout);

        if cfg.needs_api_client() {
            let client = Arc::new(KubeApiClient::from_config(cfg)?);
            parser = parser.with_reviewer(client.clone());
            if cfg.live_rbac {
                parser = parser.with_rbac_introspector(client);
            }
        }

        Ok(parser)
    }

    pub fn with_reviewer(mut self, reviewer: Arc<dyn TokenReviewer>) -> Self {
        self.reviewer = Some(reviewer);
        self
    }

    pub fn with_rbac_introspector(mut self, rbac: Arc<dyn RbacIntrospector>) -> Self {
        self.rbac = Some(rbac);
        self
    }

    pub fn with_api_server_url(mut self, url: impl Into<String>) -> Self {
        self.api_server_url = url.into();
        self
    }

    /// Audiences the API server should check tokens against. Empty means the
    /// API server's own default audience.
    pub fn with_review_audiences(mut self, audiences: Vec<String>) -> Self {
        self.review_audiences = audiences;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn api_server_url(&self) -> &str {
        &self.api_server_url
    }

    pub fn scope_map(&self) -> &RbacScopeMap {
        &self.scope_map
    }

    pub fn has_reviewer(&self) -> bool {
        self.reviewer.is_some()
    }

    /// Validate a ServiceAccount token offline and assign its scopes.
    ///
    /// Returns `None` for anything that is not a well-formed, unexpired
    /// ServiceAccount token.
    pub async fn validate_k8s_token(&self, token: &str) -> Option<K8sServiceAccountInfo> {
        let claims = match JwtClaims::decode_unverified(token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(error = %e, "rejecting ServiceAccount token");
                return None;
            }
        };
        self.validate_claims(&claims, Utc::now()).await
    }

    /// [`Self::validate_k8s_token`] plus `expected_audience ∈ aud`.
    pub async fn validate_k8s_token_audience(
        &self,
        token: &str,
        expected_audience: &str,
    ) -> Option<K8sServiceAccountInfo> {
        let info = self.validate_k8s_token(token).await?;
        if !info.audiences.iter().any(|aud| aud == expected_audience) {
            tracing::warn!(
                account = %info.subject(),
                expected = expected_audience,
                audiences = ?info.audiences,
                "ServiceAccount token audience mismatch"
            );
            return None;
        }
        Some(info)
    }

    /// Validate already-decoded claims at `now`.
    pub async fn validate_claims(
        &self,
        claims: &JwtClaims,
        now: DateTime<Utc>,
    ) -> Option<K8sServiceAccountInfo> {
        let account = check_claims(claims, now)?;
        let expires_at = claims.expires_at()?;
        let (scopes, scope_source, rbac_permissions) = self.resolve_scopes(&account).await;

        tracing::debug!(
            account = %account.subject(),
            ?scope_source,
            scopes = scopes.len(),
            "validated ServiceAccount token"
        );

        Some(K8sServiceAccountInfo {
            name: account.name,
            namespace: account.namespace,
            uid: claims.uid(),
            audiences: claims.aud.clone(),
            scopes,
            expires_at,
            rbac_permissions,
            scope_source,
        })
    }

    /// Live TokenReview. Any error, timeout, unauthenticated result or
    /// identity disagreement yields `false`.
    pub async fn validate_k8s_api_server_token(&self, token: &str, api_server_url: &str) -> bool {
        match self.review_token(token, api_server_url).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, api_server = api_server_url, "TokenReview failed");
                false
            }
        }
    }

    /// Live TokenReview with the failure cause. Transport failures and
    /// timeouts are distinguished from a rejection by the API server.
    pub async fn review_token(&self, token: &str, api_server_url: &str) -> Result<(), K8sError> {
        let reviewer = self
            .reviewer
            .as_ref()
            .ok_or(K8sError::NotConfigured("TokenReview"))?;

        let status = self
            .bounded(reviewer.review(api_server_url, token, &self.review_audiences))
            .await?;

        if !status.authenticated {
            let reason = status
                .error
                .unwrap_or_else(|| "not authenticated".to_string());
            return Err(K8sError::Rejected(reason));
        }

        let claimed = JwtClaims::decode_unverified(token)
            .ok()
            .and_then(|claims| claims.sub);
        match (claimed, status.user.as_ref().map(|u| u.username.as_str())) {
            (Some(claimed), Some(reviewed)) if claimed != reviewed => Err(K8sError::Rejected(
                format!("reviewed identity {reviewed} does not match subject {claimed}"),
            )),
            _ => Ok(()),
        }
    }

    /// Best-effort `verb:resource` list for audit and display. Never an
    /// authorization input.
    pub async fn extract_k8s_permissions(&self, token: &str) -> Vec<String> {
        let Some(info) = self.validate_k8s_token(token).await else {
            return Vec::new();
        };
        if let Some(permissions) = info.rbac_permissions {
            return permissions;
        }

        let mut permissions: Vec<String> = info
            .scopes
            .iter()
            .flat_map(|scope| representative_permissions(*scope))
            .map(|p| p.to_string())
            .collect();
        permissions.sort();
        permissions.dedup();
        permissions
    }

    /// Names of roles bound to `namespace/name`, in binding order.
    pub async fn get_serviceaccount_roles(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Vec<String>, K8sError> {
        let rbac = self
            .rbac
            .as_ref()
            .ok_or(K8sError::NotConfigured("RBAC introspection"))?;
        let account = ServiceAccountRef {
            namespace: namespace.to_string(),
            name: name.to_string(),
        };

        let mut names: Vec<String> = Vec::new();
        for role in self.bounded(rbac.bound_roles(&account)).await? {
            if !names.contains(&role.name) {
                names.push(role.name);
            }
        }
        Ok(names)
    }

    async fn resolve_scopes(
        &self,
        account: &ServiceAccountRef,
    ) -> (ScopeSet, ScopeSource, Option<Vec<String>>) {
        if let Some(rbac) = &self.rbac {
            return match self.bounded(rbac.bound_roles(account)).await {
                Ok(roles) => {
                    let names: Vec<&str> = roles.iter().map(|r| r.name.as_str()).collect();
                    let permissions: Vec<String> =
                        roles.iter().flat_map(|r| r.permissions()).collect();

                    let mut scopes = self.scope_map.scopes_for_roles(&names);
                    scopes.extend(self.scope_map.map_rbac_to_scopes(&permissions));
                    if scopes.is_empty() {
                        (minimal(), ScopeSource::MinimalDefault, Some(permissions))
                    } else {
                        (scopes, ScopeSource::LiveRbac, Some(permissions))
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        account = %account.subject(),
                        error = %e,
                        "live RBAC lookup failed, assigning minimal scopes"
                    );
                    (minimal(), ScopeSource::MinimalDefault, None)
                }
            };
        }

        if self.scope_map.name_heuristics_enabled() {
            let scopes = self.scope_map.scopes_for_service_account_name(&account.name);
            (scopes, ScopeSource::NameHeuristic, None)
        } else {
            (minimal(), ScopeSource::MinimalDefault, None)
        }
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, K8sError>
    where
        F: Future<Output = Result<T, K8sError>>,
    {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| K8sError::Timeout)?
    }
}

/// Offline claim checks; returns the asserted account when all pass.
fn check_claims(claims: &JwtClaims, now: DateTime<Utc>) -> Option<ServiceAccountRef> {
    if !claims.looks_like_service_account() {
        tracing::debug!(iss = ?claims.iss, "token is not a ServiceAccount token");
        return None;
    }

    let Some(account) = claims.service_account() else {
        tracing::warn!(sub = ?claims.sub, "ServiceAccount token subject is malformed");
        return None;
    };

    let (namespace, name) = claims.asserted_identity();
    if namespace.is_some_and(|ns| ns != account.namespace)
        || name.is_some_and(|n| n != account.name)
    {
        tracing::warn!(
            sub = %account.subject(),
            ?namespace,
            ?name,
            "ServiceAccount claims disagree with subject"
        );
        return None;
    }

    match claims.expires_at() {
        Some(exp) if exp > now => {}
        Some(exp) => {
            tracing::info!(sub = %account.subject(), %exp, "ServiceAccount token expired");
            return None;
        }
        None => {
            tracing::warn!(sub = %account.subject(), "ServiceAccount token has no expiry");
            return None;
        }
    }

    if let Some(nbf) = claims.not_before().filter(|nbf| *nbf > now) {
        tracing::info!(sub = %account.subject(), %nbf, "ServiceAccount token not yet valid");
        return None;
    }

    Some(account)
}

fn minimal() -> ScopeSet {
    Scope::MINIMAL.into_iter().collect()
}

fn representative_permissions(scope: Scope) -> &'static [&'static str] {
    match scope {
        Scope::ClusterInfo => &["get:namespaces", "list:namespaces"],
        Scope::PodsRead => &["get:pods", "list:pods"],
        Scope::LogsRead => &["get:pods/log"],
        Scope::EventsRead => &["list:events"],
        Scope::DeploymentsRead => &["get:deployments", "list:deployments"],
        Scope::ServicesRead => &["get:services", "list:services"],
        Scope::NodesRead => &["get:nodes", "list:nodes"],
        Scope::AdminConfig => &["update:configmaps"],
        Scope::AdminUsers => &["create:rolebindings"],
        Scope::AdminSystem => &["*:*"],
        Scope::ToolsetsRead | Scope::Investigate | Scope::Chat => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{BoundRole, PolicyRule, RoleKind, TokenReviewStatus};
    use async_trait::async_trait;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use serde_json::json;

    const FAR_FUTURE: i64 = 4_102_444_800;

    fn sa_token(namespace: &str, name: &str) -> String {
        token(json!({
            "iss": "https://kubernetes.default.svc.cluster.local",
            "sub": format!("system:serviceaccount:{namespace}:{name}"),
            "aud": ["warden"],
            "exp": FAR_FUTURE,
            "kubernetes.io": {
                "namespace": namespace,
                "serviceaccount": {"name": name, "uid": "uid-1"}
            }
        }))
    }

    fn token(payload: serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256"}"#);
        let payload = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{header}.{payload}.c2ln")
    }

    struct StaticRoles(Vec<BoundRole>);

    #[async_trait]
    impl RbacIntrospector for StaticRoles {
        async fn bound_roles(&self, _: &ServiceAccountRef) -> Result<Vec<BoundRole>, K8sError> {
            Ok(self.0.clone())
        }
    }

    struct FailingRbac;

    #[async_trait]
    impl RbacIntrospector for FailingRbac {
        async fn bound_roles(&self, _: &ServiceAccountRef) -> Result<Vec<BoundRole>, K8sError> {
            Err(K8sError::Status {
                status: 403,
                body: "forbidden".into(),
            })
        }
    }

    struct SlowReviewer;

    #[async_trait]
    impl TokenReviewer for SlowReviewer {
        async fn review(&self, _: &str, _: &str, _: &[String]) -> Result<TokenReviewStatus, K8sError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(TokenReviewStatus {
                authenticated: true,
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn test_heuristic_scopes() {
        let parser = K8sTokenParser::default();

        let admin = parser
            .validate_k8s_token(&sa_token("kube-system", "admin-sa"))
            .await
            .unwrap();
        assert!(admin.scopes.contains(&Scope::AdminSystem));
        assert!(admin.scopes.contains(&Scope::AdminUsers));
        assert_eq!(admin.scope_source, ScopeSource::NameHeuristic);
        assert_eq!(admin.uid.as_deref(), Some("uid-1"));

        let plain = parser
            .validate_k8s_token(&sa_token("default", "test-sa"))
            .await
            .unwrap();
        assert_eq!(plain.scopes, minimal());
    }

    #[tokio::test]
    async fn test_rejects_non_service_account_tokens() {
        let parser = K8sTokenParser::default();
        let user_token = token(json!({"iss": "https://idp", "sub": "alice", "exp": FAR_FUTURE}));
        assert!(parser.validate_k8s_token(&user_token).await.is_none());

        let bad_subject = token(json!({
            "iss": "kubernetes/serviceaccount",
            "sub": "system:serviceaccount:onlyns",
            "exp": FAR_FUTURE
        }));
        assert!(parser.validate_k8s_token(&bad_subject).await.is_none());
        assert!(parser.validate_k8s_token("not-a-jwt").await.is_none());
    }

    #[tokio::test]
    async fn test_rejects_expired_and_unbounded() {
        let parser = K8sTokenParser::default();
        let expired = token(json!({"sub": "system:serviceaccount:default:sa", "exp": 1}));
        assert!(parser.validate_k8s_token(&expired).await.is_none());

        let no_exp = token(json!({"sub": "system:serviceaccount:default:sa"}));
        assert!(parser.validate_k8s_token(&no_exp).await.is_none());

        let not_yet = token(json!({
            "sub": "system:serviceaccount:default:sa",
            "exp": FAR_FUTURE,
            "nbf": FAR_FUTURE - 10
        }));
        assert!(parser.validate_k8s_token(&not_yet).await.is_none());
    }

    #[tokio::test]
    async fn test_rejects_identity_disagreement() {
        let forged = token(json!({
            "sub": "system:serviceaccount:kube-system:admin-sa",
            "exp": FAR_FUTURE,
            "kubernetes.io": {"namespace": "default", "serviceaccount": {"name": "admin-sa"}}
        }));
        assert!(K8sTokenParser::default().validate_k8s_token(&forged).await.is_none());
    }

    #[tokio::test]
    async fn test_audience_check() {
        let parser = K8sTokenParser::default();
        let token = sa_token("default", "test-sa");
        assert!(parser.validate_k8s_token_audience(&token, "warden").await.is_some());
        assert!(parser.validate_k8s_token_audience(&token, "other").await.is_none());
    }

    #[tokio::test]
    async fn test_live_rbac_takes_precedence() {
        let roles = vec![BoundRole {
            name: "view".into(),
            kind: RoleKind::ClusterRole,
            rules: vec![PolicyRule {
                verbs: vec!["get".into()],
                resources: vec!["pods".into()],
            }],
        }];
        let parser =
            K8sTokenParser::default().with_rbac_introspector(Arc::new(StaticRoles(roles)));

        let info = parser
            .validate_k8s_token(&sa_token("kube-system", "admin-sa"))
            .await
            .unwrap();
        assert_eq!(info.scope_source, ScopeSource::LiveRbac);
        assert!(!info.scopes.contains(&Scope::AdminSystem));
        assert!(info.scopes.contains(&Scope::NodesRead));
        assert_eq!(info.rbac_permissions, Some(vec!["get:pods".to_string()]));

        assert_eq!(
            parser.get_serviceaccount_roles("kube-system", "admin-sa").await.unwrap(),
            vec!["view"]
        );
    }

    #[tokio::test]
    async fn test_failed_rbac_lookup_fails_closed() {
        let parser = K8sTokenParser::default().with_rbac_introspector(Arc::new(FailingRbac));
        let info = parser
            .validate_k8s_token(&sa_token("kube-system", "admin-sa"))
            .await
            .unwrap();
        assert_eq!(info.scopes, minimal());
        assert_eq!(info.scope_source, ScopeSource::MinimalDefault);
    }

    #[tokio::test]
    async fn test_heuristics_disabled() {
        let parser = K8sTokenParser::new(RbacScopeMap::new(false));
        let info = parser
            .validate_k8s_token(&sa_token("kube-system", "admin-sa"))
            .await
            .unwrap();
        assert_eq!(info.scopes, minimal());
        assert_eq!(info.scope_source, ScopeSource::MinimalDefault);
    }

    #[tokio::test]
    async fn test_roles_without_introspector() {
        let err = K8sTokenParser::default()
            .get_serviceaccount_roles("default", "sa")
            .await
            .unwrap_err();
        assert!(matches!(err, K8sError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn test_review_timeout_is_false() {
        let parser = K8sTokenParser::default()
            .with_reviewer(Arc::new(SlowReviewer))
            .with_timeout(Duration::from_millis(50));
        let token = sa_token("default", "test-sa");
        assert!(!parser.validate_k8s_api_server_token(&token, "https://cluster").await);
    }

    #[tokio::test]
    async fn test_review_timeout_reports_cause() {
        let parser = K8sTokenParser::default()
            .with_reviewer(Arc::new(SlowReviewer))
            .with_timeout(Duration::from_millis(50));
        let token = sa_token("default", "test-sa");
        assert!(matches!(
            parser.review_token(&token, "https://cluster").await,
            Err(K8sError::Timeout)
        ));
    }

    struct RecordingReviewer {
        seen: std::sync::Mutex<Vec<String>>,
        authenticated: bool,
    }

    #[async_trait]
    impl TokenReviewer for RecordingReviewer {
        async fn review(
            &self,
            _: &str,
            _: &str,
            audiences: &[String],
        ) -> Result<TokenReviewStatus, K8sError> {
            self.seen.lock().unwrap().extend(audiences.iter().cloned());
            Ok(TokenReviewStatus {
                authenticated: self.authenticated,
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn test_review_sends_configured_audience() {
        let reviewer = Arc::new(RecordingReviewer {
            seen: Default::default(),
            authenticated: true,
        });
        let parser = K8sTokenParser::default()
            .with_review_audiences(vec!["warden".into()])
            .with_reviewer(reviewer.clone());

        let token = sa_token("default", "test-sa");
        assert!(parser.review_token(&token, "https://cluster").await.is_ok());
        assert_eq!(*reviewer.seen.lock().unwrap(), vec!["warden".to_string()]);
    }

    #[tokio::test]
    async fn test_review_rejection_is_distinct_from_outage() {
        let parser = K8sTokenParser::default().with_reviewer(Arc::new(RecordingReviewer {
            seen: Default::default(),
            authenticated: false,
        }));
        let token = sa_token("default", "test-sa");
        assert!(matches!(
            parser.review_token(&token, "https://cluster").await,
            Err(K8sError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn test_review_without_client_is_false() {
        let token = sa_token("default", "test-sa");
        assert!(
            !K8sTokenParser::default()
                .validate_k8s_api_server_token(&token, "https://cluster")
                .await
        );
    }

    #[tokio::test]
    async fn test_extract_permissions_from_tier() {
        let perms = K8sTokenParser::default()
            .extract_k8s_permissions(&sa_token("default", "test-sa"))
            .await;
        assert_eq!(
            perms,
            vec!["get:namespaces", "get:pods", "list:namespaces", "list:pods"]
        );
        assert!(
            K8sTokenParser::default()
                .extract_k8s_permissions("garbage")
                .await
                .is_empty()
        );
    }
}
