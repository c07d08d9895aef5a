//! Cluster API calls: TokenReview and RBAC binding lookup.
//!
//! Both concerns sit behind traits so the parser can be exercised without a
//! cluster. [`KubeApiClient`] is the HTTPS implementation of both.

use crate::error::K8sError;
use crate::jwt::ServiceAccountRef;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use warden_core::KubernetesConfig;

const TOKEN_REVIEW_PATH: &str = "/apis/authentication.k8s.io/v1/tokenreviews";
const RBAC_PREFIX: &str = "/apis/rbac.authorization.k8s.io/v1";

/// Outcome of a TokenReview.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TokenReviewStatus {
    #[serde(default)]
    pub authenticated: bool,

    #[serde(default)]
    pub user: Option<ReviewedUser>,

    #[serde(default)]
    pub audiences: Vec<String>,

    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ReviewedUser {
    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub uid: Option<String>,

    #[serde(default)]
    pub groups: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoleKind {
    Role,
    ClusterRole,
}

/// One rule of a Role or ClusterRole. API groups are not tracked; resource
/// names are unique enough for scope mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PolicyRule {
    #[serde(default)]
    pub verbs: Vec<String>,

    #[serde(default)]
    pub resources: Vec<String>,
}

impl PolicyRule {
    /// Flatten into `verb:resource` strings.
    pub fn permissions(&self) -> impl Iterator<Item = String> + '_ {
        self.verbs.iter().flat_map(move |verb| {
            self.resources
                .iter()
                .map(move |resource| format!("{verb}:{resource}"))
        })
    }
}

/// A role bound to a ServiceAccount, with its rules resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundRole {
    pub name: String,
    pub kind: RoleKind,
    pub rules: Vec<PolicyRule>,
}

impl BoundRole {
    pub fn permissions(&self) -> Vec<String> {
        self.rules.iter().flat_map(PolicyRule::permissions).collect()
    }
}

/// Live token validation against the cluster.
#[async_trait]
pub trait TokenReviewer: Send + Sync {
    /// Submit `token` for review. `audiences` may be empty (API server default).
    async fn review(
        &self,
        api_server_url: &str,
        token: &str,
        audiences: &[String],
    ) -> Result<TokenReviewStatus, K8sError>;
}

/// Live RBAC lookup for a ServiceAccount.
#[async_trait]
pub trait RbacIntrospector: Send + Sync {
    /// Roles bound to `account` through RoleBindings in its namespace and
    /// through ClusterRoleBindings.
    async fn bound_roles(&self, account: &ServiceAccountRef) -> Result<Vec<BoundRole>, K8sError>;
}

/// HTTPS client for the cluster API server.
#[derive(Clone)]
pub struct KubeApiClient {
    base_url: String,
    bearer_token: Option<String>,
    http: Client,
}

impl std::fmt::Debug for KubeApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeApiClient")
            .field("base_url", &self.base_url)
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl KubeApiClient {
    pub fn new(
        base_url: impl Into<String>,
        bearer_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, K8sError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| K8sError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_http_client(base_url, bearer_token, http))
    }

    pub fn with_http_client(
        base_url: impl Into<String>,
        bearer_token: Option<String>,
        http: Client,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bearer_token,
            http,
        }
    }

    /// Build a client from `[kubernetes]` settings: the in-pod token file
    /// authenticates Warden itself, the optional CA bundle pins the API server.
    pub fn from_config(cfg: &KubernetesConfig) -> Result<Self, K8sError> {
        let timeout = cfg
            .request_timeout()
            .map_err(|e| K8sError::Config(e.to_string()))?;

        let bearer_token = match std::fs::read_to_string(&cfg.token_file) {
            Ok(token) => Some(token.trim().to_string()),
            Err(e) => {
                return Err(K8sError::Config(format!(
                    "cannot read {}: {e}",
                    cfg.token_file.display()
                )));
            }
        };

        let mut builder = Client::builder().timeout(timeout);
        if let Some(ca_file) = &cfg.ca_file {
            let pem = std::fs::read(ca_file)
                .map_err(|e| K8sError::Config(format!("cannot read {}: {e}", ca_file.display())))?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| K8sError::Config(format!("invalid CA bundle: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }
        let http = builder
            .build()
            .map_err(|e| K8sError::Config(format!("failed to build HTTP client: {e}")))?;

        tracing::info!(api_server = %cfg.api_server_url, ?timeout, "Kubernetes API client configured");
        Ok(Self::with_http_client(&cfg.api_server_url, bearer_token, http))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, K8sError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(K8sError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, K8sError> {
        let url = format!("{}{path}", self.base_url);
        let response = self.authorized(self.http.get(&url)).send().await?;
        Self::read_json(response).await
    }

    async fn rules_for(&self, namespace: &str, role: &RoleRef) -> Result<Vec<PolicyRule>, K8sError> {
        let path = match role.kind {
            RoleKind::Role => format!("{RBAC_PREFIX}/namespaces/{namespace}/roles/{}", role.name),
            RoleKind::ClusterRole => format!("{RBAC_PREFIX}/clusterroles/{}", role.name),
        };
        match self.get_json::<RoleObject>(&path).await {
            Ok(object) => Ok(object.rules),
            // Dangling roleRef: the binding exists, the role does not.
            Err(K8sError::Status { status: 404, .. }) => {
                tracing::debug!(role = %role.name, "bound role not found");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl TokenReviewer for KubeApiClient {
    async fn review(
        &self,
        api_server_url: &str,
        token: &str,
        audiences: &[String],
    ) -> Result<TokenReviewStatus, K8sError> {
        let url = format!("{}{TOKEN_REVIEW_PATH}", api_server_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "apiVersion": "authentication.k8s.io/v1",
            "kind": "TokenReview",
            "spec": {
                "token": token,
                "audiences": audiences,
            }
        });

        let response = self
            .authorized(self.http.post(&url))
            .json(&body)
            .send()
            .await?;
        let review: TokenReviewObject = Self::read_json(response).await?;
        Ok(review.status)
    }
}

#[async_trait]
impl RbacIntrospector for KubeApiClient {
    async fn bound_roles(&self, account: &ServiceAccountRef) -> Result<Vec<BoundRole>, K8sError> {
        let namespaced: BindingList = self
            .get_json(&format!(
                "{RBAC_PREFIX}/namespaces/{}/rolebindings",
                account.namespace
            ))
            .await?;
        let cluster: BindingList = self
            .get_json(&format!("{RBAC_PREFIX}/clusterrolebindings"))
            .await?;

        let mut refs: Vec<RoleRef> = Vec::new();
        for binding in namespaced
            .items
            .iter()
            .chain(cluster.items.iter())
            .filter(|b| b.binds(account))
        {
            if !refs.contains(&binding.role_ref) {
                refs.push(binding.role_ref.clone());
            }
        }

        let mut roles = Vec::with_capacity(refs.len());
        for role_ref in refs {
            let rules = self.rules_for(&account.namespace, &role_ref).await?;
            roles.push(BoundRole {
                name: role_ref.name,
                kind: role_ref.kind,
                rules,
            });
        }

        tracing::debug!(
            account = %account.subject(),
            roles = roles.len(),
            "resolved RBAC bindings"
        );
        Ok(roles)
    }
}

#[derive(Deserialize)]
struct TokenReviewObject {
    #[serde(default)]
    status: TokenReviewStatus,
}

#[derive(Deserialize)]
struct BindingList {
    #[serde(default)]
    items: Vec<Binding>,
}

#[derive(Deserialize)]
struct Binding {
    #[serde(default)]
    metadata: Metadata,

    #[serde(rename = "roleRef")]
    role_ref: RoleRef,

    #[serde(default)]
    subjects: Vec<Subject>,
}

#[derive(Default, Deserialize)]
struct Metadata {
    #[serde(default)]
    namespace: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Deserialize)]
struct RoleRef {
    kind: RoleKind,
    name: String,
}

#[derive(Deserialize)]
struct Subject {
    kind: String,
    name: String,

    #[serde(default)]
    namespace: Option<String>,
}

#[derive(Deserialize)]
struct RoleObject {
    #[serde(default)]
    rules: Vec<PolicyRule>,
}

impl Binding {
    /// Whether this binding names `account` as a subject. A ServiceAccount
    /// subject without a namespace inherits the binding's namespace.
    fn binds(&self, account: &ServiceAccountRef) -> bool {
        self.subjects.iter().any(|subject| {
            subject.kind == "ServiceAccount"
                && subject.name == account.name
                && subject
                    .namespace
                    .as_deref()
                    .or(self.metadata.namespace.as_deref())
                    == Some(account.namespace.as_str())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn account() -> ServiceAccountRef {
        ServiceAccountRef {
            namespace: "monitoring".into(),
            name: "holmesgpt".into(),
        }
    }

    #[test]
    fn test_policy_rule_flattening() {
        let rule = PolicyRule {
            verbs: vec!["get".into(), "list".into()],
            resources: vec!["pods".into(), "pods/log".into()],
        };
        let perms: Vec<String> = rule.permissions().collect();
        assert_eq!(perms, vec!["get:pods", "get:pods/log", "list:pods", "list:pods/log"]);
    }

    #[test]
    fn test_binding_subject_namespace_defaults() {
        let binding: Binding = serde_json::from_value(json!({
            "metadata": {"name": "reader", "namespace": "monitoring"},
            "roleRef": {"kind": "ClusterRole", "name": "view"},
            "subjects": [{"kind": "ServiceAccount", "name": "holmesgpt"}]
        }))
        .unwrap();
        assert!(binding.binds(&account()));
    }

    #[test]
    fn test_binding_rejects_other_namespace_and_kind() {
        let binding: Binding = serde_json::from_value(json!({
            "metadata": {"name": "reader"},
            "roleRef": {"kind": "ClusterRole", "name": "view"},
            "subjects": [
                {"kind": "ServiceAccount", "name": "holmesgpt", "namespace": "default"},
                {"kind": "User", "name": "holmesgpt", "namespace": "monitoring"}
            ]
        }))
        .unwrap();
        assert!(!binding.binds(&account()));
    }

    #[test]
    fn test_debug_redacts_token() {
        let client =
            KubeApiClient::new("https://cluster/", Some("secret".into()), Duration::from_secs(1))
                .unwrap();
        let rendered = format!("{client:?}");
        assert!(!rendered.contains("secret"));
        assert_eq!(client.base_url(), "https://cluster");
    }
}
