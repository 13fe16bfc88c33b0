//! Background job tracking
//!
//! Keeps the "currently in progress" set the UI renders busy indicators from,
//! plus the cancellation token of every running job. All job tokens are
//! children of one root token so shutdown cancels everything at once.

use crate::events::{EventBus, JobKind, JobStatus, UiEvent};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Finished jobs retained for `snapshot()`
const MAX_FINISHED_JOBS: usize = 100;

/// Public view of a tracked job
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub job_id: String,
    pub kind: JobKind,
    pub status: JobStatus,
    /// Image ids the job is waiting on
    pub subject_ids: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

struct JobEntry {
    record: JobRecord,
    token: CancellationToken,
}

/// Shared registry of background jobs
#[derive(Clone)]
pub struct JobTracker {
    jobs: Arc<RwLock<HashMap<String, JobEntry>>>,
    root: CancellationToken,
    event_bus: EventBus,
}

impl JobTracker {
    pub fn new(event_bus: EventBus) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            root: CancellationToken::new(),
            event_bus,
        }
    }

    /// Register a job as in progress and hand back its cancellation token
    ///
    /// Fails with `Error::Conflict` if the same id is already running.
    pub async fn begin(
        &self,
        job_id: &str,
        kind: JobKind,
        subject_ids: Vec<String>,
    ) -> Result<CancellationToken> {
        let mut jobs = self.jobs.write().await;

        if let Some(existing) = jobs.get(job_id) {
            if !existing.record.status.is_finished() {
                return Err(Error::Conflict(job_id.to_string()));
            }
        }

        let token = self.root.child_token();
        let record = JobRecord {
            job_id: job_id.to_string(),
            kind,
            status: JobStatus::InProgress,
            subject_ids: subject_ids.clone(),
            started_at: Utc::now(),
            finished_at: None,
        };
        jobs.insert(
            job_id.to_string(),
            JobEntry {
                record,
                token: token.clone(),
            },
        );
        drop(jobs);

        info!(job_id, %kind, subjects = subject_ids.len(), "Job started");
        self.event_bus.emit_lossy(UiEvent::JobStarted {
            job_id: job_id.to_string(),
            kind,
            subject_ids,
            timestamp: Utc::now(),
        });

        Ok(token)
    }

    /// Replace the subject ids of a running job
    ///
    /// Batch jobs only learn their image ids after creating the images.
    pub async fn set_subjects(&self, job_id: &str, subject_ids: Vec<String>) {
        if let Some(entry) = self.jobs.write().await.get_mut(job_id) {
            entry.record.subject_ids = subject_ids;
        }
    }

    /// Record the final status of a job
    ///
    /// Returns false if the job is unknown or already finished.
    pub async fn finish(&self, job_id: &str, status: JobStatus) -> bool {
        let mut jobs = self.jobs.write().await;

        let kind = match jobs.get_mut(job_id) {
            Some(entry) if !entry.record.status.is_finished() => {
                entry.record.status = status;
                entry.record.finished_at = Some(Utc::now());
                entry.record.kind
            }
            _ => return false,
        };

        Self::prune_finished(&mut jobs);
        drop(jobs);

        info!(job_id, %kind, %status, "Job finished");
        self.event_bus.emit_lossy(UiEvent::JobFinished {
            job_id: job_id.to_string(),
            kind,
            status,
            timestamp: Utc::now(),
        });
        true
    }

    /// Cancel one running job
    ///
    /// The job's poll loop observes the token and reports `Cancelled` itself.
    pub async fn cancel(&self, job_id: &str) -> bool {
        let jobs = self.jobs.read().await;
        match jobs.get(job_id) {
            Some(entry) if !entry.record.status.is_finished() => {
                debug!(job_id, "Cancelling job");
                entry.token.cancel();
                true
            }
            _ => false,
        }
    }

    /// Cancel every running job (service teardown)
    pub fn cancel_all(&self) {
        info!("Cancelling all background jobs");
        self.root.cancel();
    }

    /// Token cancelled at service teardown, for long-lived non-job tasks
    pub fn shutdown_token(&self) -> CancellationToken {
        self.root.child_token()
    }

    /// Whether a job id is currently in progress
    pub async fn is_in_progress(&self, job_id: &str) -> bool {
        self.jobs
            .read()
            .await
            .get(job_id)
            .map(|entry| !entry.record.status.is_finished())
            .unwrap_or(false)
    }

    /// Ids of jobs and their subjects that are currently in progress
    ///
    /// This is the set the UI keys busy indicators by.
    pub async fn in_progress(&self) -> Vec<String> {
        let jobs = self.jobs.read().await;
        let mut ids: Vec<String> = jobs
            .values()
            .filter(|entry| !entry.record.status.is_finished())
            .flat_map(|entry| {
                std::iter::once(entry.record.job_id.clone())
                    .chain(entry.record.subject_ids.iter().cloned())
            })
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Look up one job
    pub async fn get(&self, job_id: &str) -> Option<JobRecord> {
        self.jobs.read().await.get(job_id).map(|e| e.record.clone())
    }

    /// All known jobs, newest first
    pub async fn snapshot(&self) -> Vec<JobRecord> {
        let mut records: Vec<JobRecord> = self
            .jobs
            .read()
            .await
            .values()
            .map(|e| e.record.clone())
            .collect();
        records.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        records
    }

    fn prune_finished(jobs: &mut HashMap<String, JobEntry>) {
        let mut finished: Vec<(DateTime<Utc>, String)> = jobs
            .values()
            .filter_map(|e| e.record.finished_at.map(|at| (at, e.record.job_id.clone())))
            .collect();
        if finished.len() <= MAX_FINISHED_JOBS {
            return;
        }
        finished.sort();
        let excess = finished.len() - MAX_FINISHED_JOBS;
        for (_, job_id) in finished.into_iter().take(excess) {
            jobs.remove(&job_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_begin_and_finish_emit_events() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        let tracker = JobTracker::new(bus);

        tracker
            .begin("42", JobKind::RegenerateImage, vec![])
            .await
            .unwrap();
        assert!(tracker.is_in_progress("42").await);
        assert_eq!(tracker.in_progress().await, vec!["42".to_string()]);

        assert!(tracker.finish("42", JobStatus::Completed).await);
        assert!(!tracker.is_in_progress("42").await);
        assert!(tracker.in_progress().await.is_empty());

        assert!(matches!(rx.recv().await.unwrap(), UiEvent::JobStarted { .. }));
        match rx.recv().await.unwrap() {
            UiEvent::JobFinished { job_id, status, .. } => {
                assert_eq!(job_id, "42");
                assert_eq!(status, JobStatus::Completed);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_duplicate_begin_conflicts_until_finished() {
        let tracker = JobTracker::new(EventBus::new(10));

        tracker.begin("7", JobKind::RegenerateImage, vec![]).await.unwrap();
        let second = tracker.begin("7", JobKind::RegenerateImage, vec![]).await;
        assert!(matches!(second, Err(Error::Conflict(_))));

        tracker.finish("7", JobStatus::TimedOut).await;
        assert!(tracker.begin("7", JobKind::RegenerateImage, vec![]).await.is_ok());
    }

    #[tokio::test]
    async fn test_finish_twice_is_rejected() {
        let tracker = JobTracker::new(EventBus::new(10));
        tracker.begin("1", JobKind::GenerateFromLyrics, vec![]).await.unwrap();

        assert!(tracker.finish("1", JobStatus::Completed).await);
        assert!(!tracker.finish("1", JobStatus::Failed).await);
        assert_eq!(tracker.get("1").await.unwrap().status, JobStatus::Completed);
        assert!(!tracker.finish("unknown", JobStatus::Completed).await);
    }

    #[tokio::test]
    async fn test_subjects_are_in_progress() {
        let tracker = JobTracker::new(EventBus::new(10));
        tracker
            .begin("batch", JobKind::GenerateMissingImages, vec!["3".into(), "5".into()])
            .await
            .unwrap();

        assert_eq!(tracker.in_progress().await, vec!["3", "5", "batch"]);

        tracker.set_subjects("batch", vec!["9".into()]).await;
        assert_eq!(tracker.in_progress().await, vec!["9", "batch"]);
    }

    #[tokio::test]
    async fn test_cancel_and_cancel_all() {
        let tracker = JobTracker::new(EventBus::new(10));
        let a = tracker.begin("a", JobKind::RegenerateImage, vec![]).await.unwrap();
        let b = tracker.begin("b", JobKind::RegenerateImage, vec![]).await.unwrap();

        assert!(tracker.cancel("a").await);
        assert!(a.is_cancelled());
        assert!(!b.is_cancelled());
        assert!(!tracker.cancel("missing").await);

        tracker.cancel_all();
        assert!(b.is_cancelled());
    }

    #[tokio::test]
    async fn test_finished_jobs_are_pruned() {
        let tracker = JobTracker::new(EventBus::new(10));
        for i in 0..(MAX_FINISHED_JOBS + 5) {
            let id = i.to_string();
            tracker.begin(&id, JobKind::RegenerateImage, vec![]).await.unwrap();
            tracker.finish(&id, JobStatus::Completed).await;
        }
        assert_eq!(tracker.snapshot().await.len(), MAX_FINISHED_JOBS);
    }
}
