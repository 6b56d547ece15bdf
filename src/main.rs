//! FileVault Server
//!
//! Upload, list and download files over HTTP. Uploads and downloads share a
//! small concurrency pool, listings a larger one; excess requests are
//! rejected with 429 instead of queued.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use filevault_server::config::Config;
use filevault_server::{create_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "filevault_server=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let config = Config::from_env().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
        Config::default()
    });

    tracing::info!("Starting FileVault Server v{}", env!("CARGO_PKG_VERSION"));

    let host: std::net::IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("invalid SERVER_HOST {:?}", config.server.host))?;
    let addr = SocketAddr::new(host, config.server.port);

    let app_state = AppState::new(config)
        .await
        .context("failed to open storage root")?;

    let limits = app_state.admission().snapshot();
    tracing::info!("Upload directory: {}", app_state.config().storage.root.display());
    tracing::info!(
        streaming = limits.streaming_capacity,
        unary = limits.unary_capacity,
        "Admission limits"
    );

    let app = create_router(app_state);

    // Start server with graceful shutdown
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to listen on {}", addr))?;
    tracing::info!("FileVault Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, waiting for active requests to complete...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, waiting for active requests to complete...");
        },
    }
}
