//! In-process fetch queue.
//!
//! This module provides:
//! - The fetch job and outcome types
//! - A non-blocking publisher used by the webhook endpoint
//!
//! ## Architecture
//!
//! ```text
//! Webhook endpoint → fetch queue → Consumer → Analysis API
//! ```
//!
//! The queue lives in memory. Jobs still waiting at shutdown are drained, jobs
//! lost to a crash are not recovered.

pub mod publisher;
pub mod types;

pub use publisher::{channel, PublishError, Publisher};
pub use types::{FetchJob, FetchOutcome, FetchStats, FetchStatsSnapshot};
