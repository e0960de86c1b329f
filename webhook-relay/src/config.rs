//! Configuration module for environment variable parsing.
//!
//! Reads all configuration from environment variables, which the binary may
//! seed from a `.env` file without overriding variables already set. Unlike a
//! best-effort loader, every value is validated up front: a missing `PORT`,
//! `SECRET` or `ACCESS_TOKEN`, or any malformed optional value, aborts startup
//! before the server binds.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tokio::sync::Semaphore;
use url::Url;

/// Default Cyanite GraphQL endpoint.
pub const DEFAULT_API_URL: &str = "https://api.cyanite.ai/graphql";

/// Default directory for uploaded files, relative to the working directory.
pub const DEFAULT_UPLOAD_DIR: &str = "./uploads";

/// Largest worker concurrency; the consumer drains by acquiring every permit
/// in one `u32` request.
const MAX_WORKER_CONCURRENCY: usize = if Semaphore::MAX_PERMITS < u32::MAX as usize {
    Semaphore::MAX_PERMITS
} else {
    u32::MAX as usize
};

/// Configuration errors detected at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Webhook signing secret shared with Cyanite
    pub secret: String,

    /// Bearer token for the outbound analysis API
    pub access_token: String,

    /// GraphQL endpoint queried for analysis results
    pub api_url: Url,

    /// Directory uploaded files are written to
    pub upload_dir: PathBuf,

    /// Maximum accepted request body size for uploads
    pub upload_max_bytes: usize,

    /// Number of fetch jobs that may wait in the queue
    pub fetch_queue_capacity: usize,

    /// Maximum number of fetches running at once
    pub worker_concurrency: usize,

    /// Optional timeout for outbound analysis requests
    pub request_timeout_ms: Option<u64>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port: u16 = parse_value(&lookup, "PORT")?.ok_or(ConfigError::Missing("PORT"))?;
        let secret = required(&lookup, "SECRET")?;
        let access_token = required(&lookup, "ACCESS_TOKEN")?;

        let api_url = parse_api_url(
            lookup("API_URL")
                .as_deref()
                .unwrap_or(DEFAULT_API_URL),
        )?;

        let upload_dir = lookup("UPLOAD_DIR")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR));

        let upload_max_bytes: usize = parse_value(&lookup, "UPLOAD_MAX_BYTES")?.unwrap_or(50 * 1024 * 1024);

        let fetch_queue_capacity =
            parse_positive(&lookup, "FETCH_QUEUE_CAPACITY", 256, Semaphore::MAX_PERMITS)?;

        let worker_concurrency =
            parse_positive(&lookup, "WORKER_CONCURRENCY", 16, MAX_WORKER_CONCURRENCY)?;

        let request_timeout_ms: Option<u64> = parse_value(&lookup, "REQUEST_TIMEOUT_MS")?;

        Ok(Config {
            port,
            secret,
            access_token,
            api_url,
            upload_dir,
            upload_max_bytes,
            fetch_queue_capacity,
            worker_concurrency,
            request_timeout_ms,
        })
    }

    /// Outbound request timeout, if one is configured.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

/// Read a required, non-blank string variable.
fn required<F>(lookup: &F, name: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::Missing(name)),
    }
}

/// Parse an optional variable. Absent or blank yields `None`, garbage is an error.
fn parse_value<F, T>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = match lookup(name) {
        Some(v) if !v.trim().is_empty() => v,
        _ => return Ok(None),
    };

    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|e| ConfigError::Invalid {
            name,
            reason: format!("{raw:?}: {e}"),
        })
}

/// Parse a count in `1..=max`.
fn parse_positive<F>(
    lookup: &F,
    name: &'static str,
    default: usize,
    max: usize,
) -> Result<usize, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match parse_value::<F, usize>(lookup, name)? {
        Some(0) => Err(ConfigError::Invalid {
            name,
            reason: "must be greater than zero".to_string(),
        }),
        Some(v) if v > max => Err(ConfigError::Invalid {
            name,
            reason: format!("must be at most {max}"),
        }),
        Some(v) => Ok(v),
        None => Ok(default),
    }
}

fn parse_api_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|e| ConfigError::Invalid {
        name: "API_URL",
        reason: format!("{raw:?}: {e}"),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::Invalid {
            name: "API_URL",
            reason: format!("unsupported scheme {other:?}"),
        }),
    }
}
