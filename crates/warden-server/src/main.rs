use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use warden_core::WardenConfig;
use warden_server::{AppState, create_router};

/// How often expired revocation entries are dropped.
const REVOCATION_PURGE_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Parser, Debug)]
#[command(name = "warden", version, about = "Warden bearer-token authorization server")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, env = "WARDEN_CONFIG", default_value = "warden.toml")]
    config: PathBuf,

    /// Override `[server] bind`.
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = WardenConfig::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&cfg.server.log_level)),
        )
        .init();

    let state = Arc::new(AppState::from_config(&cfg)?);
    spawn_revocation_purge(state.clone());

    let app = create_router(state);
    let addr = cli.bind.unwrap_or_else(|| cfg.server.bind.clone());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, config = %cli.config.display(), "warden listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("warden stopped");
    Ok(())
}

fn spawn_revocation_purge(state: Arc<AppState>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(REVOCATION_PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            let purged = state.auth.purge_expired_revocations();
            if purged > 0 {
                tracing::debug!(purged, "purged expired revocations");
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
