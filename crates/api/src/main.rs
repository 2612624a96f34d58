//! SellerSync - marketplace credential and sync server
//!
//! Main entry point for the HTTP server.

use std::sync::Arc;

use anyhow::Context;
use sellersync_api::utils::logging::init_tracing;
use sellersync_api::{router, AppContext};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before the subscriber reads RUST_LOG
    let dotenv = dotenvy::dotenv();
    let format = init_tracing().context("failed to install tracing subscriber")?;
    match dotenv {
        Ok(path) => info!(path = %path.display(), "Loaded .env"),
        Err(e) => warn!(error = %e, "No .env file loaded"),
    }
    info!(?format, version = env!("CARGO_PKG_VERSION"), "SellerSync starting");

    let config = sellersync_infra::config::load().context("failed to load configuration")?;
    let ctx = Arc::new(AppContext::new(config).await.context("failed to initialise application")?);
    ctx.start_background().await.context("failed to start background tasks")?;

    let listener = TcpListener::bind(&ctx.config.server.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", ctx.config.server.bind_addr))?;
    info!(addr = %listener.local_addr()?, "HTTP server listening");

    let served = axum::serve(listener, router(Arc::clone(&ctx)))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    ctx.shutdown().await;
    served.context("HTTP server error")?;
    info!("SellerSync stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("Shutdown signal received");
}
