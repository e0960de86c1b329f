//! Fetch queue consumer.
//!
//! Receives jobs published by the webhook endpoint and spawns an async task
//! per job to query the analysis API. Concurrency is bounded by a semaphore.
//! Every outcome is logged and counted in [`FetchStats`]. A failed fetch never
//! reaches the webhook sender.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, Semaphore};
use tracing::{error, info, warn};

use crate::analysis::TrackFetcher;
use crate::queue::{FetchJob, FetchOutcome, FetchStats};

/// Run the consumer until every publisher is dropped.
///
/// This function:
/// 1. Receives jobs from the fetch queue
/// 2. Waits for a free concurrency slot
/// 3. Spawns a task that performs the fetch and records the outcome
/// 4. After the queue closes, waits for in-flight fetches to finish
pub async fn run(
    mut receiver: mpsc::Receiver<FetchJob>,
    fetcher: Arc<dyn TrackFetcher>,
    stats: Arc<FetchStats>,
    concurrency: usize,
) {
    let concurrency = concurrency.max(1);
    let semaphore = Arc::new(Semaphore::new(concurrency));

    info!(concurrency = concurrency, "fetch_consumer_started");

    while let Some(job) = receiver.recv().await {
        let permit = match Arc::clone(&semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                warn!("fetch_consumer_semaphore_closed");
                break;
            }
        };

        info!(track_id = %job.track_id, "fetch_job_received");

        let fetcher = Arc::clone(&fetcher);
        let stats = Arc::clone(&stats);

        tokio::spawn(async move {
            let _permit = permit;
            process_job(fetcher.as_ref(), &stats, &job).await;
        });
    }

    info!("fetch_consumer_draining");

    // Every permit back means every spawned fetch has finished.
    let permits = u32::try_from(concurrency).unwrap_or(u32::MAX);
    let _ = semaphore.acquire_many(permits).await;

    info!("fetch_consumer_stopped");
}

/// Perform one fetch and record its outcome.
pub async fn process_job(fetcher: &dyn TrackFetcher, stats: &FetchStats, job: &FetchJob) -> FetchOutcome {
    let outcome = match fetcher.fetch_library_track(&job.track_id).await {
        Ok(result) => {
            let graphql_errors = count_graphql_errors(&result);
            info!(
                track_id = %job.track_id,
                graphql_errors = graphql_errors,
                "fetch_job_completed"
            );
            FetchOutcome::Succeeded { graphql_errors }
        }
        Err(e) => {
            error!(
                track_id = %job.track_id,
                error_code = e.code(),
                error = %e,
                "fetch_job_failed"
            );
            FetchOutcome::Failed {
                error: e.to_string(),
            }
        }
    };

    stats.record_outcome(&outcome);
    outcome
}

fn count_graphql_errors(result: &Value) -> usize {
    result
        .get("errors")
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or(0)
}
