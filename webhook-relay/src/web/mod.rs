//! Web server module.
//!
//! This module provides the HTTP surface shared by the webhook and the REST
//! client:
//! - `POST /incoming-webhook` receives Cyanite notifications
//! - `/api/*` serves the upload and analysis endpoints
//! - `GET /health` reports liveness and fetch counters

pub mod cors;
pub mod error;
pub mod event;
pub mod handlers;
pub mod signature;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use cors::cors_layer;
pub use error::ApiError;
pub use event::{EventAction, WebhookEvent};
pub use handlers::{
    api_version, get_song, health, incoming_webhook, song_data, upload, AppState,
    HealthResponse, VersionResponse,
};
pub use signature::is_valid;

/// Route Cyanite posts webhooks to.
pub const WEBHOOK_ROUTE: &str = "/incoming-webhook";

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let upload_limit = state.config.upload_max_bytes;

    Router::new()
        .route("/health", get(health))
        .route(WEBHOOK_ROUTE, post(incoming_webhook))
        .route("/api", get(api_version))
        .route("/api/", get(api_version))
        .route(
            "/api/upload",
            post(upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/songdata", post(song_data))
        .route("/api/getsong", post(get_song))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
