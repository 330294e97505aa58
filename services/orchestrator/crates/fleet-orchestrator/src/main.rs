//! fleet-orchestrator entry point.
//!
//! Initialises tracing, loads configuration from `FLEET_*` environment
//! variables, opens the Docker and store clients once, and serves the HTTP
//! API until Ctrl-C or SIGTERM.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use fleet_orchestrator::app::{self, AppContext};
use fleet_orchestrator::config::OrchestratorConfig;
use fleet_orchestrator::http;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialise tracing with RUST_LOG env filter.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("fleet-orchestrator starting");

    // 2. Load configuration from FLEET_* env vars.
    let config = OrchestratorConfig::from_env()?;
    let api_secret = config.api_secret()?;
    let addr = config.socket_addr()?;

    tracing::info!(
        listen_addr = %config.listen_addr,
        store_backend = ?config.store_backend,
        gateway_url = %config.gateway_url,
        agents_dir = %config.agents_dir.display(),
        backend_network = %config.backend_network,
        "configuration loaded",
    );

    // 3. Open and verify clients; they live for the whole process.
    let connected = app::connect(&config).await?;
    let ctx = Arc::new(AppContext::new(connected.backends, config.app_settings()));

    // 4. Serve.
    let router = http::router(ctx, &api_secret);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind TCP listener")?;
    tracing::info!("orchestrator ready on http://{addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    // 5. In-flight requests are done; release the store connection.
    if let Some(valkey) = connected.valkey {
        valkey.close().await;
    }

    tracing::info!("fleet-orchestrator shut down");
    Ok(())
}

/// Resolve on SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    tracing::info!("received shutdown signal");
}
