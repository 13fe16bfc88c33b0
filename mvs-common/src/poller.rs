//! Asynchronous job polling
//!
//! Waits for server-side work (image generation) by re-fetching a resource on
//! a fixed cadence until a completion predicate holds, the timeout elapses, or
//! the owner cancels.
//!
//! # Scheduling
//! The first fetch happens one interval after the poll starts. Fetches for a
//! job never overlap: a slow fetch delays the next tick instead of racing it
//! (`MissedTickBehavior::Delay`). Each fetch is itself raced against the
//! deadline and the cancellation token, so a hung request cannot hold the job
//! past its timeout.
//!
//! # Errors
//! A failed fetch is logged and polling continues. Only elapsed time ends a
//! poll that never completes.

use crate::Result;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Fetches the current state of the resource behind a job id
#[async_trait]
pub trait StatusFetcher<S: Send>: Send + Sync {
    async fn fetch_status(&self, job_id: &str) -> Result<S>;

    /// Fetch several jobs in one go, one result per id in order
    ///
    /// Batch polling calls this once per tick. The default fetches each id in
    /// turn; override it when one request can answer for all of them.
    async fn fetch_many(&self, job_ids: &[String]) -> Vec<Result<S>> {
        let mut results = Vec::with_capacity(job_ids.len());
        for job_id in job_ids {
            results.push(self.fetch_status(job_id).await);
        }
        results
    }
}

/// Polling cadence and patience
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollConfig {
    /// Single image regeneration: every 3 s, for up to 2 min
    pub const SINGLE_IMAGE: PollConfig = PollConfig {
        interval: Duration::from_millis(3_000),
        timeout: Duration::from_millis(120_000),
    };

    /// Batch image generation: every 3 s, for up to 3 min
    pub const BATCH_IMAGES: PollConfig = PollConfig {
        interval: Duration::from_millis(3_000),
        timeout: Duration::from_millis(180_000),
    };

    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

/// How a single-job poll ended
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome<S> {
    /// Predicate satisfied; carries the final fetched state
    Completed(S),
    /// Deadline reached; the server may still finish later
    TimedOut,
    /// Owner cancelled the token
    Cancelled,
}

impl<S> PollOutcome<S> {
    pub fn is_completed(&self) -> bool {
        matches!(self, PollOutcome::Completed(_))
    }
}

/// How a batch poll ended
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome<S> {
    /// `Completed` only when every id finished
    pub outcome: PollOutcome<()>,
    /// Finished ids with their final state, in input order
    pub completed: Vec<(String, S)>,
    /// Ids still unfinished when polling stopped
    pub pending: Vec<String>,
}

enum Step<T> {
    Value(T),
    TimedOut,
    Cancelled,
}

/// Race a future against the deadline and cancellation
async fn guarded<F, T>(fut: F, deadline: Instant, cancel: &CancellationToken) -> Step<T>
where
    F: std::future::Future<Output = T>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Step::Cancelled,
        _ = tokio::time::sleep_until(deadline) => Step::TimedOut,
        value = fut => Step::Value(value),
    }
}

fn ticker(start: Instant, interval: Duration) -> tokio::time::Interval {
    let mut ticker = tokio::time::interval_at(start + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Poll one job until `is_complete` holds, the timeout elapses, or `cancel` fires
pub async fn poll_until<S, F, P>(
    job_id: &str,
    fetcher: &F,
    is_complete: P,
    config: PollConfig,
    cancel: &CancellationToken,
) -> PollOutcome<S>
where
    S: Send,
    F: StatusFetcher<S> + ?Sized,
    P: Fn(&S) -> bool,
{
    let start = Instant::now();
    let deadline = start + config.timeout;
    let mut ticker = ticker(start, config.interval);
    let mut attempts: u32 = 0;

    debug!(job_id, ?config, "Polling started");

    loop {
        match guarded(ticker.tick(), deadline, cancel).await {
            Step::Value(_) => {}
            Step::TimedOut => {
                warn!(job_id, attempts, "Polling timed out");
                return PollOutcome::TimedOut;
            }
            Step::Cancelled => {
                debug!(job_id, attempts, "Polling cancelled");
                return PollOutcome::Cancelled;
            }
        }

        attempts += 1;
        let fetched = match guarded(fetcher.fetch_status(job_id), deadline, cancel).await {
            Step::Value(fetched) => fetched,
            Step::TimedOut => {
                warn!(job_id, attempts, "Polling timed out during fetch");
                return PollOutcome::TimedOut;
            }
            Step::Cancelled => return PollOutcome::Cancelled,
        };

        match fetched {
            Ok(state) if is_complete(&state) => {
                // Owner may have torn down while the fetch was in flight
                if cancel.is_cancelled() {
                    return PollOutcome::Cancelled;
                }
                info!(job_id, attempts, elapsed_ms = start.elapsed().as_millis() as u64, "Job completed");
                return PollOutcome::Completed(state);
            }
            Ok(_) => debug!(job_id, attempts, "Job still pending"),
            Err(e) => warn!(job_id, attempts, error = %e, "Status fetch failed, will retry"),
        }
    }
}

/// Poll several jobs until all satisfy `is_complete`
///
/// Each tick re-fetches only the ids that are still pending. An empty id set
/// completes immediately.
pub async fn poll_batch<S, F, P>(
    job_ids: &[String],
    fetcher: &F,
    is_complete: P,
    config: PollConfig,
    cancel: &CancellationToken,
) -> BatchOutcome<S>
where
    S: Send,
    F: StatusFetcher<S> + ?Sized,
    P: Fn(&S) -> bool,
{
    let start = Instant::now();
    let deadline = start + config.timeout;
    let mut ticker = ticker(start, config.interval);
    let mut finished: Vec<Option<S>> = job_ids.iter().map(|_| None).collect();

    debug!(jobs = job_ids.len(), ?config, "Batch polling started");

    let outcome = 'poll: loop {
        if finished.iter().all(Option::is_some) {
            break 'poll PollOutcome::Completed(());
        }

        match guarded(ticker.tick(), deadline, cancel).await {
            Step::Value(_) => {}
            Step::TimedOut => break 'poll PollOutcome::TimedOut,
            Step::Cancelled => break 'poll PollOutcome::Cancelled,
        }

        let pending: Vec<usize> = (0..job_ids.len())
            .filter(|index| finished[*index].is_none())
            .collect();
        let pending_ids: Vec<String> = pending.iter().map(|i| job_ids[*i].clone()).collect();

        let results = match guarded(fetcher.fetch_many(&pending_ids), deadline, cancel).await {
            Step::Value(results) => results,
            Step::TimedOut => break 'poll PollOutcome::TimedOut,
            Step::Cancelled => break 'poll PollOutcome::Cancelled,
        };

        for (index, result) in pending.into_iter().zip(results) {
            let job_id = &job_ids[index];
            match result {
                Ok(state) if is_complete(&state) => {
                    debug!(job_id = %job_id, "Batch member completed");
                    finished[index] = Some(state);
                }
                Ok(_) => {}
                Err(e) => warn!(job_id = %job_id, error = %e, "Status fetch failed, will retry"),
            }
        }

        if cancel.is_cancelled() {
            break 'poll PollOutcome::Cancelled;
        }
    };

    let mut completed = Vec::new();
    let mut pending = Vec::new();
    for (job_id, state) in job_ids.iter().zip(finished) {
        match state {
            Some(state) => completed.push((job_id.clone(), state)),
            None => pending.push(job_id.clone()),
        }
    }

    match &outcome {
        PollOutcome::Completed(()) => info!(jobs = completed.len(), "Batch completed"),
        PollOutcome::TimedOut => warn!(
            completed = completed.len(),
            pending = pending.len(),
            "Batch polling timed out"
        ),
        PollOutcome::Cancelled => debug!(pending = pending.len(), "Batch polling cancelled"),
    }

    BatchOutcome {
        outcome,
        completed,
        pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_configs() {
        assert_eq!(PollConfig::SINGLE_IMAGE.interval, Duration::from_secs(3));
        assert_eq!(PollConfig::SINGLE_IMAGE.timeout, Duration::from_secs(120));
        assert_eq!(PollConfig::BATCH_IMAGES.timeout, Duration::from_secs(180));
    }

    #[test]
    fn test_outcome_is_completed() {
        assert!(PollOutcome::Completed(1).is_completed());
        assert!(!PollOutcome::<u8>::TimedOut.is_completed());
        assert!(!PollOutcome::<u8>::Cancelled.is_completed());
    }
}
