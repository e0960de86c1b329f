//! HTTP client for the analysis API.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde_json::Value;
use tracing::{error, info};
use url::Url;

use super::query::GraphQlRequest;
use crate::config::Config;

/// Errors from a single analysis query.
///
/// Domain errors such as an unknown track are returned as data by the API and
/// never show up here.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("analysis request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("analysis API returned a non-JSON body (status {status}): {source}")]
    Decode {
        status: u16,
        #[source]
        source: serde_json::Error,
    },
}

impl FetchError {
    /// Short machine-readable name used in error responses.
    pub fn code(&self) -> &'static str {
        match self {
            FetchError::Transport(e) if e.is_timeout() => "TIMEOUT",
            FetchError::Transport(_) => "TRANSPORT",
            FetchError::Decode { .. } => "INVALID_JSON",
        }
    }
}

/// Something that can look up the analysis of a library track.
#[async_trait]
pub trait TrackFetcher: Send + Sync {
    /// Query the analysis of `track_id` and return the response body as is.
    async fn fetch_library_track(&self, track_id: &str) -> Result<Value, FetchError>;
}

/// Analysis API client authenticated with a bearer token.
#[derive(Clone)]
pub struct AnalysisClient {
    client: Client,
    api_url: Url,
    access_token: String,
}

impl AnalysisClient {
    /// Build a client from the application configuration.
    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self::new(
            client,
            config.api_url.clone(),
            config.access_token.clone(),
        ))
    }

    pub fn new(client: Client, api_url: Url, access_token: String) -> Self {
        Self {
            client,
            api_url,
            access_token,
        }
    }
}

#[async_trait]
impl TrackFetcher for AnalysisClient {
    async fn fetch_library_track(&self, track_id: &str) -> Result<Value, FetchError> {
        info!(track_id = %track_id, "library_track_fetch_starting");

        let response = self
            .client
            .post(self.api_url.clone())
            .header(AUTHORIZATION, format!("Bearer {}", self.access_token))
            .header(CONTENT_TYPE, "application/json")
            .json(&GraphQlRequest::library_track(track_id))
            .send()
            .await
            .map_err(|e| {
                error!(track_id = %track_id, error = %e, "library_track_fetch_failed");
                FetchError::Transport(e)
            })?;

        let status = response.status().as_u16();
        let body = response.bytes().await?;

        let result: Value = serde_json::from_slice(&body).map_err(|source| {
            error!(
                track_id = %track_id,
                status_code = status,
                body_preview = %String::from_utf8_lossy(&body[..body.len().min(500)]),
                "library_track_invalid_json"
            );
            FetchError::Decode { status, source }
        })?;

        let pretty = serde_json::to_string_pretty(&result).unwrap_or_else(|_| result.to_string());
        info!(
            track_id = %track_id,
            status_code = status,
            result = %pretty,
            "library_track_result"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use axum::{http::HeaderMap, routing::post, Json, Router};
    use serde_json::json;
    use tokio::net::TcpListener;

    use crate::analysis::query::LIBRARY_TRACK_QUERY;

    #[derive(Default, Clone)]
    struct Captured {
        authorization: Arc<Mutex<Option<String>>>,
        body: Arc<Mutex<Option<Value>>>,
    }

    /// Serve `app` on an ephemeral port and return its URL.
    async fn serve(app: Router) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Url::parse(&format!("http://{addr}/graphql")).unwrap()
    }

    fn client_for(url: Url) -> AnalysisClient {
        AnalysisClient::new(Client::new(), url, "test-token".to_string())
    }

    #[tokio::test]
    async fn test_fetch_sends_query_and_bearer_token() {
        let captured = Captured::default();
        let sink = captured.clone();

        let app = Router::new().route(
            "/graphql",
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let sink = sink.clone();
                async move {
                    *sink.authorization.lock().unwrap() = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    *sink.body.lock().unwrap() = Some(body);
                    Json(json!({"data": {"libraryTrack": {"id": "abc123"}}}))
                }
            }),
        );

        let client = client_for(serve(app).await);
        let result = client.fetch_library_track("abc123").await.unwrap();

        assert_eq!(result, json!({"data": {"libraryTrack": {"id": "abc123"}}}));
        assert_eq!(
            captured.authorization.lock().unwrap().as_deref(),
            Some("Bearer test-token")
        );

        let body = captured.body.lock().unwrap().clone().unwrap();
        assert_eq!(body["query"], json!(LIBRARY_TRACK_QUERY));
        assert_eq!(body["variables"]["libraryTrackId"], json!("abc123"));
    }

    #[tokio::test]
    async fn test_domain_error_is_returned_as_data() {
        let not_found = json!({
            "data": {"libraryTrack": {"message": "LibraryTrack not found."}}
        });
        let response = not_found.clone();
        let app = Router::new().route(
            "/graphql",
            post(move || {
                let response = response.clone();
                async move { Json(response) }
            }),
        );

        let client = client_for(serve(app).await);
        let result = client.fetch_library_track("missing").await.unwrap();
        assert_eq!(result, not_found);
    }

    #[tokio::test]
    async fn test_error_status_with_json_body_resolves() {
        let app = Router::new().route(
            "/graphql",
            post(|| async {
                (
                    axum::http::StatusCode::UNAUTHORIZED,
                    Json(json!({"errors": [{"message": "Unauthorized"}]})),
                )
            }),
        );

        let client = client_for(serve(app).await);
        let result = client.fetch_library_track("abc123").await.unwrap();
        assert_eq!(result["errors"][0]["message"], json!("Unauthorized"));
    }

    #[tokio::test]
    async fn test_non_json_body_is_decode_error() {
        let app = Router::new().route(
            "/graphql",
            post(|| async { (axum::http::StatusCode::BAD_GATEWAY, "<html>bad gateway</html>") }),
        );

        let client = client_for(serve(app).await);
        let err = client.fetch_library_track("abc123").await.unwrap_err();

        assert!(matches!(err, FetchError::Decode { status: 502, .. }));
        assert_eq!(err.code(), "INVALID_JSON");
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client_for(Url::parse(&format!("http://{addr}/graphql")).unwrap());
        let err = client.fetch_library_track("abc123").await.unwrap_err();

        assert!(matches!(err, FetchError::Transport(_)));
        assert_eq!(err.code(), "TRANSPORT");
    }
}
