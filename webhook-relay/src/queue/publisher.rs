//! Non-blocking publisher for the in-process fetch queue.
//!
//! The publisher is cheap to clone and shared across request handlers.
//! Publishing never waits: a full or closed queue drops the job and reports
//! it, so a webhook response is never held up by fetch backlog.

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{error, info};

use super::types::{FetchJob, FetchStats};

/// Errors when handing a job to the queue.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PublishError {
    #[error("fetch queue is full")]
    Full,

    #[error("fetch queue is closed")]
    Closed,
}

/// Sending half of the fetch queue.
#[derive(Clone)]
pub struct Publisher {
    sender: mpsc::Sender<FetchJob>,
    stats: Arc<FetchStats>,
}

/// Create a bounded fetch queue.
///
/// Returns the publisher for handlers and the receiver for the consumer.
pub fn channel(capacity: usize, stats: Arc<FetchStats>) -> (Publisher, mpsc::Receiver<FetchJob>) {
    let (sender, receiver) = mpsc::channel(capacity);
    (Publisher { sender, stats }, receiver)
}

impl Publisher {
    /// Enqueue a fetch job without waiting for capacity.
    pub fn publish_fetch(&self, job: FetchJob) -> Result<(), PublishError> {
        let track_id = job.track_id.clone();

        match self.sender.try_send(job) {
            Ok(()) => {
                self.stats.record_enqueued();
                info!(track_id = %track_id, "fetch_job_enqueued");
                Ok(())
            }
            Err(e) => {
                self.stats.record_dropped();
                let err = match e {
                    TrySendError::Full(_) => PublishError::Full,
                    TrySendError::Closed(_) => PublishError::Closed,
                };
                error!(track_id = %track_id, error = %err, "fetch_job_dropped");
                Err(err)
            }
        }
    }

    /// Shared pipeline counters.
    pub fn stats(&self) -> &Arc<FetchStats> {
        &self.stats
    }
}
