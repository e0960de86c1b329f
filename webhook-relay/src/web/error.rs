//! Error responses for the REST endpoints.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::analysis::FetchError;
use crate::storage::UploadError;

/// Failure of a REST request. Always answered with 500 and an error object.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// JSON error object returned to the client.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub name: &'static str,
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ApiError {
    fn body(&self) -> ErrorBody {
        match self {
            ApiError::Upload(e) => ErrorBody {
                name: "UploadError",
                code: e.code(),
                message: e.to_string(),
                field: e.field().map(str::to_string),
            },
            ApiError::Fetch(e) => ErrorBody {
                name: "FetchError",
                code: e.code(),
                message: e.to_string(),
                field: None,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = self.body();
        error!(name = body.name, code = body.code, error = %self, "api_request_failed");
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}
