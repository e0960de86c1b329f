//! Fetch queue message and outcome types.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Work item handed from the webhook endpoint to the fetch consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchJob {
    /// Library track whose analysis finished
    pub track_id: String,
}

impl FetchJob {
    pub fn new(track_id: impl Into<String>) -> Self {
        Self {
            track_id: track_id.into(),
        }
    }
}

/// Result of one background fetch, as recorded by the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The API answered with JSON. `graphql_errors` counts entries in its
    /// top-level `errors` array, if any.
    Succeeded { graphql_errors: usize },
    /// Transport or decode failure.
    Failed { error: String },
}

/// Counters for the fetch pipeline, shared by the publisher, the consumer and
/// the health endpoint.
#[derive(Debug, Default)]
pub struct FetchStats {
    enqueued: AtomicU64,
    dropped: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of [`FetchStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FetchStatsSnapshot {
    pub enqueued: u64,
    pub dropped: u64,
    pub succeeded: u64,
    pub failed: u64,
}

impl FetchStats {
    pub fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_outcome(&self, outcome: &FetchOutcome) {
        match outcome {
            FetchOutcome::Succeeded { .. } => self.succeeded.fetch_add(1, Ordering::Relaxed),
            FetchOutcome::Failed { .. } => self.failed.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn snapshot(&self) -> FetchStatsSnapshot {
        FetchStatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}
