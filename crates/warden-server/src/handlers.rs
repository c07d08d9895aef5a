//! Route handlers.

use crate::error::ApiError;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use warden_auth::TokenResponse;
use warden_core::{AuthError, NewUser, Permission, Role, Scope, UserView};
use warden_k8s::K8sServiceAccountInfo;
use warden_oauth::{Principal, Requirement, TokenType, bearer_token};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRolesRequest {
    pub roles: Vec<Role>,
}

/// Response of `GET /auth/me`.
#[derive(Debug, Serialize)]
pub struct PrincipalSummary {
    pub subject: String,
    pub token_type: TokenType,
    pub scopes: Vec<Scope>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account: Option<K8sServiceAccountInfo>,
}

impl From<Principal> for PrincipalSummary {
    fn from(principal: Principal) -> Self {
        Self {
            subject: principal.subject,
            token_type: principal.kind,
            scopes: principal.scopes.into_iter().collect(),
            user: principal.user.as_ref().map(UserView::from),
            service_account: principal.service_account,
        }
    }
}

fn authorization(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
}

async fn require(
    state: &AppState,
    headers: &HeaderMap,
    requirement: impl Into<Requirement>,
) -> Result<Principal, ApiError> {
    Ok(state
        .resource_server
        .authorize(authorization(headers), requirement)
        .await?)
}

pub async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "ok": true, "service": "warden" }))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    Ok(Json(state.auth.login(&body.username, &body.password)?))
}

pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    Ok(Json(state.auth.refresh(&body.refresh_token)?))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let token = authorization(&headers)
        .and_then(bearer_token)
        .ok_or_else(|| AuthError::Unauthorized("missing or malformed bearer header".to_string()))?;
    state.auth.logout(token)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<PrincipalSummary>, ApiError> {
    let principal = require(&state, &headers, Requirement::Authenticated).await?;
    Ok(Json(principal.into()))
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<UserView>>, ApiError> {
    require(&state, &headers, Permission::ManageUsers).await?;
    Ok(Json(state.auth.list_users().iter().map(UserView::from).collect()))
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<NewUser>,
) -> Result<(StatusCode, Json<UserView>), ApiError> {
    let admin = require(&state, &headers, Permission::ManageUsers).await?;
    let user = state.auth.create_user(body)?;
    tracing::info!(by = %admin.subject, username = %user.username, "user created");
    Ok((StatusCode::CREATED, Json(user.view())))
}

pub async fn update_user_roles(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
    headers: HeaderMap,
    Json(body): Json<UpdateRolesRequest>,
) -> Result<Json<UserView>, ApiError> {
    let admin = require(&state, &headers, Permission::ManageUsers).await?;
    let user = state.auth.update_user_roles(&username, body.roles)?;
    tracing::info!(by = %admin.subject, %username, roles = ?user.roles, "user roles updated");
    Ok(Json(user.view()))
}

pub async fn deactivate_user(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
    headers: HeaderMap,
) -> Result<Json<UserView>, ApiError> {
    let admin = require(&state, &headers, Permission::ManageUsers).await?;
    let user = state.auth.deactivate_user(&username)?;
    tracing::info!(by = %admin.subject, %username, "user deactivated");
    Ok(Json(user.view()))
}
