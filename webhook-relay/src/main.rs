//! SOAI Web Server - Cyanite webhook receiver and REST API.
//!
//! This binary:
//! - Receives Cyanite webhooks and verifies their signature
//! - Enqueues finished analyses for a background fetch
//! - Serves the upload and analysis endpoints for the SOAI client
//!
//! The API and the webhook share one port.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use soai::web::{router, AppState, WEBHOOK_ROUTE};
use soai::{consumer, queue, AnalysisClient, Config, FetchStats, TrackFetcher};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present; variables already in the environment win
    let dotenv_path = dotenv::dotenv().ok();

    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("web_server_starting");

    if let Some(path) = dotenv_path {
        info!(path = %path.display(), "dotenv_loaded");
    }

    // Load configuration, refusing to start on missing or malformed values
    let config = Config::from_env().context("Invalid configuration")?;
    info!(
        port = config.port,
        api_url = %config.api_url,
        upload_dir = %config.upload_dir.display(),
        fetch_queue_capacity = config.fetch_queue_capacity,
        worker_concurrency = config.worker_concurrency,
        request_timeout_ms = ?config.request_timeout_ms,
        "config_loaded"
    );

    let fetcher: Arc<dyn TrackFetcher> = Arc::new(
        AnalysisClient::from_config(&config).context("Failed to create HTTP client")?,
    );

    // Fetch queue and its consumer
    let stats = Arc::new(FetchStats::default());
    let (publisher, receiver) = queue::channel(config.fetch_queue_capacity, Arc::clone(&stats));
    let consumer = tokio::spawn(consumer::run(
        receiver,
        Arc::clone(&fetcher),
        stats,
        config.worker_concurrency,
    ));

    let state = AppState::new(config.clone(), publisher, fetcher);
    state
        .store
        .ensure_dir()
        .await
        .with_context(|| format!("Failed to create upload directory {}", config.upload_dir.display()))?;

    let app = router(state);

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(
        address = %addr,
        webhook = %format!("http://localhost:{}{}", config.port, WEBHOOK_ROUTE),
        "web_server_listening"
    );

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // The router held the last publisher; the consumer drains and stops.
    consumer.await.context("Fetch consumer panicked")?;

    info!("web_server_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "ctrl_c_handler_failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "sigterm_handler_failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("web_server_shutting_down");
}
