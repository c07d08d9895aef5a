//! Shared application state.

use anyhow::Context;
use std::sync::Arc;
use warden_auth::{AuthService, bootstrap_users};
use warden_core::WardenConfig;
use warden_oauth::OAuth2ResourceServer;
use warden_token::KeyPair;

pub struct AppState {
    pub auth: Arc<AuthService>,
    pub resource_server: OAuth2ResourceServer,
}

impl AppState {
    pub fn new(auth: Arc<AuthService>, resource_server: OAuth2ResourceServer) -> Self {
        Self {
            auth,
            resource_server,
        }
    }

    /// Wire every collaborator from configuration and seed the directory.
    pub fn from_config(cfg: &WardenConfig) -> anyhow::Result<Self> {
        let private_key = cfg
            .auth
            .resolve_private_key()
            .context("failed to read signing key")?;
        let keypair = KeyPair::from_hex_or_generate(private_key.as_deref())?;

        let ttl = cfg.auth.ttl()?;
        let auth = Arc::new(
            AuthService::in_memory(keypair)?
                .with_default_ttl(ttl)
                .with_revoke_on_refresh(cfg.auth.revoke_on_refresh),
        );

        let created = bootstrap_users(&auth, &cfg.auth)?;
        tracing::info!(created, "user directory ready");

        let resource_server = OAuth2ResourceServer::from_config(auth.clone(), &cfg.kubernetes)
            .context("failed to configure Kubernetes validation")?;

        Ok(Self::new(auth, resource_server))
    }
}
