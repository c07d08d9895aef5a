//! Route table.

use crate::handlers;
use crate::state::AppState;
use axum::Router;
use axum::routing::{get, post, put};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/auth/login", post(handlers::login))
        .route("/auth/refresh", post(handlers::refresh))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/me", get(handlers::me))
        .route(
            "/admin/users",
            get(handlers::list_users).post(handlers::create_user),
        )
        .route("/admin/users/{username}/roles", put(handlers::update_user_roles))
        .route(
            "/admin/users/{username}/deactivate",
            post(handlers::deactivate_user),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
