//! HTTP endpoint handlers.
//!
//! The webhook handler only verifies, classifies and enqueues. Fetching the
//! analysis happens in the background consumer, so the response never waits
//! on the analysis API.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, Multipart, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::analysis::TrackFetcher;
use crate::queue::{FetchJob, FetchStatsSnapshot, Publisher};
use crate::storage::{StoredFile, UploadError, UploadStore};
use crate::web::error::ApiError;
use crate::web::event::{is_test_event, EventAction, WebhookEvent};
use crate::web::signature::{self, SIGNATURE_HEADER};
use crate::Config;

/// Multipart field carrying the uploaded file.
pub const UPLOAD_FIELD: &str = "file";

/// API version reported by `GET /api/`.
pub const API_VERSION: &str = "1.0";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub publisher: Publisher,
    pub fetcher: Arc<dyn TrackFetcher>,
    pub store: UploadStore,
}

impl AppState {
    pub fn new(config: Config, publisher: Publisher, fetcher: Arc<dyn TrackFetcher>) -> Self {
        let store = UploadStore::new(config.upload_dir.clone());
        Self {
            config: Arc::new(config),
            publisher,
            fetcher,
            store,
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub fetches: FetchStatsSnapshot,
}

/// Health check endpoint, including fetch pipeline counters.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        fetches: state.publisher.stats().snapshot(),
    })
}

// =============================================================================
// Cyanite Webhook
// =============================================================================

/// Cyanite webhook endpoint.
///
/// Checks run in a fixed order:
/// 1. Empty body (or JSON `null`) is answered 422, unparsable JSON 400
/// 2. `TEST` events are acknowledged without further checks
/// 3. The signature is verified over the re-serialized body, 400 on mismatch
/// 4. A finished `AudioAnalysisV6` event enqueues a fetch of its resource
///
/// Everything that passes the signature check is answered 200, whether or not
/// a fetch was enqueued.
pub async fn incoming_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if body.iter().all(u8::is_ascii_whitespace) {
        info!("webhook_unprocessable_entity");
        return StatusCode::UNPROCESSABLE_ENTITY;
    }

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(
                error = %e,
                body_length = body.len(),
                "webhook_body_invalid_json"
            );
            return StatusCode::BAD_REQUEST;
        }
    };

    if payload.is_null() {
        info!("webhook_unprocessable_entity");
        return StatusCode::UNPROCESSABLE_ENTITY;
    }

    info!(
        event = %serde_json::to_string_pretty(&payload).unwrap_or_default(),
        "webhook_event_received"
    );

    if is_test_event(&payload) {
        info!("webhook_test_event");
        return StatusCode::OK;
    }

    let provided = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    // Cyanite signs the compact JSON with keys in document order. Numbers keep
    // their source text so exponents and long decimals survive the round trip.
    let message = payload.to_string();

    if !signature::is_valid(&state.config.secret, provided, &message) {
        warn!(has_signature = !provided.is_empty(), "webhook_signature_invalid");
        return StatusCode::BAD_REQUEST;
    }

    info!("webhook_signature_valid");

    let Some(event) = WebhookEvent::from_value(&payload) else {
        warn!("webhook_event_unrecognized");
        return StatusCode::OK;
    };

    match event.action() {
        EventAction::FetchAnalysis { track_id } => {
            info!(track_id = %track_id, "webhook_analysis_finished");
            // Enqueue failures are logged and counted by the publisher.
            let _ = state.publisher.publish_fetch(FetchJob::new(track_id));
        }
        EventAction::MissingResource => {
            warn!("webhook_analysis_finished_without_resource");
        }
        EventAction::Ignore => {
            info!(
                event_type = %event.kind,
                nested_type = ?event.event.as_ref().map(|e| e.kind.as_str()),
                nested_status = ?event.event.as_ref().map(|e| e.status.as_str()),
                "webhook_event_ignored"
            );
        }
    }

    StatusCode::OK
}

// =============================================================================
// REST API
// =============================================================================

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct VersionResponse {
    pub version: String,
}

/// Version probe.
pub async fn api_version() -> Json<VersionResponse> {
    Json(VersionResponse {
        version: API_VERSION.to_string(),
    })
}

/// Store the single file sent in the `file` multipart field.
///
/// Text fields are ignored. A file in any other field, or a second file, is an
/// error. A form without a file is answered 200 with an empty body.
pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let mut multipart = multipart.map_err(UploadError::from)?;
    let mut stored: Option<StoredFile> = None;

    while let Some(mut field) = multipart.next_field().await.map_err(UploadError::from)? {
        let name = field.name().unwrap_or_default().to_string();

        let Some(original_name) = field.file_name().map(str::to_string) else {
            continue;
        };

        if name != UPLOAD_FIELD || stored.is_some() {
            return Err(UploadError::UnexpectedField(name).into());
        }

        let mimetype = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();

        let mut pending = state.store.begin(&original_name).await?;
        while let Some(chunk) = field.chunk().await.map_err(UploadError::from)? {
            pending.write_chunk(&chunk).await?;
        }
        stored = Some(pending.finish(&name, &mimetype).await?);
    }

    let Some(stored) = stored else {
        info!("api_upload_without_file");
        return Ok(StatusCode::OK.into_response());
    };

    info!(
        upload_id = %stored.id,
        original_name = %stored.originalname,
        size = stored.size,
        "api_upload_complete"
    );

    Ok(Json(stored).into_response())
}

#[derive(Debug, Deserialize)]
pub struct SongDataRequest {
    pub id: String,
}

/// Fetch the analysis of a track synchronously.
pub async fn song_data(
    State(state): State<AppState>,
    Json(request): Json<SongDataRequest>,
) -> Result<Json<Value>, ApiError> {
    info!(track_id = %request.id, "api_songdata_requested");
    let result = state.fetcher.fetch_library_track(&request.id).await?;
    Ok(Json(result))
}

/// Song retrieval is not implemented; answers an empty 200.
// TODO: return the stored file for an upload id once the client contract for retrieval is agreed.
pub async fn get_song() -> StatusCode {
    info!("api_getsong_not_implemented");
    StatusCode::OK
}
