//! # warden-server
//!
//! Axum surface over [`warden_auth::AuthService`] and
//! [`warden_oauth::OAuth2ResourceServer`]. Every protected handler goes
//! through [`OAuth2ResourceServer::authorize`](warden_oauth::OAuth2ResourceServer::authorize)
//! with the requirement of its route.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
