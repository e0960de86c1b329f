//! SOAI relay - Cyanite webhook receiver and REST API for the SOAI client.
//!
//! The `soai-web` binary serves both surfaces on one port:
//! - Verifies and routes Cyanite webhooks
//! - Pulls finished analysis results through a background fetch queue
//! - Stores uploaded audio files and answers analysis queries
//!
//! ## Architecture
//!
//! ```text
//! Cyanite → /incoming-webhook → fetch queue → Consumer → Analysis API
//! Client  → /api/*           → Upload store / Analysis API
//! ```

pub mod analysis;
pub mod config;
pub mod consumer;
pub mod queue;
pub mod storage;
pub mod web;

// Re-export commonly used types
pub use analysis::{AnalysisClient, FetchError, TrackFetcher};
pub use config::{Config, ConfigError};
pub use queue::{FetchJob, FetchOutcome, FetchStats, Publisher};
pub use storage::{StoredFile, UploadStore};
pub use web::AppState;
