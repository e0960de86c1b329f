//! CORS policy for the REST API.
//!
//! The browser client runs on the same machine during development, so only
//! `http://localhost:<port>` and `http://127.0.0.1:<port>` origins are allowed.

use std::time::Duration;

use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Preflight cache lifetime.
pub const MAX_AGE_SECS: u64 = 3600;

const LOCAL_ORIGIN_PREFIXES: [&str; 2] = ["http://localhost:", "http://127.0.0.1:"];

/// CORS layer allowing local origins only.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(|origin: &HeaderValue, _| {
            is_local_origin(origin)
        }))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(Duration::from_secs(MAX_AGE_SECS))
}

/// `http://localhost:<digits>` or `http://127.0.0.1:<digits>`, nothing else.
pub fn is_local_origin(origin: &HeaderValue) -> bool {
    let Ok(origin) = origin.to_str() else {
        return false;
    };

    LOCAL_ORIGIN_PREFIXES.iter().any(|prefix| {
        origin
            .strip_prefix(prefix)
            .is_some_and(|port| !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()))
    })
}
