//! Supervised background queue for consent decisions
//!
//! Consent often arrives from a short-lived request (a notification action,
//! a button press). Executing the approved actions can take minutes because
//! of the backoff schedule, so the work is handed to a queue that owns its
//! own worker task and outlives the request.
//!
//! - Jobs are read from a bounded `mpsc` channel by a single worker
//! - Each job runs in its own task, so different pipelines proceed concurrently
//! - Status is tracked per [`JobId`] and results are delivered on a oneshot
//! - Only the most recent finished statuses are kept; older ones are evicted
//! - `shutdown` stops intake and waits for in-flight jobs

use crate::engine::RemediationEngine;
use crate::error::JobError;
use dashmap::DashMap;
use futures::FutureExt;
use parking_lot::Mutex;
use sentinel_model::{JobSettings, RemediationResult};
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tracing::Instrument;
use ulid::Ulid;

/// Finished statuses kept when no retention is configured
pub const DEFAULT_FINISHED_RETENTION: usize = 256;

/// Unique job identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(pub Ulid);

impl JobId {
    /// Generate new job ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a submitted job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Running,
    Completed { success: bool },
    Failed(String),
}

impl JobStatus {
    #[inline]
    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed(_))
    }
}

/// Handle returned by [`RemediationJobQueue::submit`]
#[derive(Debug)]
pub struct JobTicket {
    pub id: JobId,
    result: oneshot::Receiver<RemediationResult>,
}

impl JobTicket {
    /// Wait for the job's result
    ///
    /// Dropping the ticket instead does not cancel the job.
    ///
    /// # Errors
    /// `JobError::ResultDropped` if the job ended without a result.
    pub async fn wait(self) -> Result<RemediationResult, JobError> {
        let id = self.id;
        self.result
            .await
            .map_err(|_| JobError::ResultDropped(id.to_string()))
    }
}

#[derive(Debug)]
struct Job {
    id: JobId,
    pipeline_id: String,
    approved: bool,
    reply: oneshot::Sender<RemediationResult>,
}

/// Job statuses: unfinished jobs by id, finished ones in completion order
#[derive(Debug)]
struct StatusBoard {
    active: DashMap<JobId, JobStatus>,
    finished: Mutex<VecDeque<(JobId, JobStatus)>>,
    retention: usize,
}

impl StatusBoard {
    fn new(retention: usize) -> Self {
        Self {
            active: DashMap::new(),
            finished: Mutex::new(VecDeque::with_capacity(retention.min(1024))),
            retention,
        }
    }

    fn set(&self, id: JobId, status: JobStatus) {
        self.active.insert(id, status);
    }

    /// Move `id` out of the active set, evicting the oldest finished entry
    /// once retention is reached
    fn finish(&self, id: JobId, status: JobStatus) {
        if self.retention > 0 {
            let mut finished = self.finished.lock();
            while finished.len() >= self.retention {
                finished.pop_front();
            }
            finished.push_back((id, status));
        }
        self.active.remove(&id);
    }

    fn forget(&self, id: JobId) {
        self.active.remove(&id);
    }

    fn get(&self, id: JobId) -> Option<JobStatus> {
        if let Some(status) = self.active.get(&id) {
            return Some(status.value().clone());
        }
        self.finished
            .lock()
            .iter()
            .rev()
            .find(|(finished_id, _)| *finished_id == id)
            .map(|(_, status)| status.clone())
    }

    fn active_len(&self) -> usize {
        self.active.len()
    }

    fn finished_len(&self) -> usize {
        self.finished.lock().len()
    }
}

/// Background executor for consent decisions
///
/// Must be created inside a tokio runtime.
#[derive(Debug)]
pub struct RemediationJobQueue {
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    board: Arc<StatusBoard>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl RemediationJobQueue {
    /// Start the worker for `engine`
    #[must_use]
    pub fn start(engine: Arc<RemediationEngine>, capacity: usize) -> Self {
        Self::start_with_retention(engine, capacity, DEFAULT_FINISHED_RETENTION)
    }

    /// Start the worker with queue settings from configuration
    #[must_use]
    pub fn from_config(engine: Arc<RemediationEngine>, settings: &JobSettings) -> Self {
        Self::start_with_retention(engine, settings.queue_capacity, settings.finished_retention)
    }

    /// Start the worker, keeping at most `retention` finished statuses
    #[must_use]
    pub fn start_with_retention(
        engine: Arc<RemediationEngine>,
        capacity: usize,
        retention: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let board = Arc::new(StatusBoard::new(retention));
        let worker = tokio::spawn(worker_loop(engine, rx, Arc::clone(&board)));

        Self {
            sender: Mutex::new(Some(tx)),
            board,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Queue a consent decision for `pipeline_id`
    ///
    /// # Errors
    /// `JobError::QueueClosed` after [`RemediationJobQueue::shutdown`].
    pub async fn submit(
        &self,
        pipeline_id: impl Into<String>,
        approved: bool,
    ) -> Result<JobTicket, JobError> {
        let sender = self.sender.lock().clone().ok_or(JobError::QueueClosed)?;

        let id = JobId::new();
        let (reply, result) = oneshot::channel();
        let job = Job {
            id,
            pipeline_id: pipeline_id.into(),
            approved,
            reply,
        };

        self.board.set(id, JobStatus::Queued);
        if sender.send(job).await.is_err() {
            self.board.forget(id);
            return Err(JobError::QueueClosed);
        }

        Ok(JobTicket { id, result })
    }

    /// Current status of a job
    ///
    /// `None` for unknown ids and for finished jobs already evicted.
    #[must_use]
    pub fn status(&self, id: JobId) -> Option<JobStatus> {
        self.board.get(id)
    }

    /// Number of jobs not yet finished
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.board.active_len()
    }

    /// Number of finished statuses currently retained
    #[must_use]
    pub fn retained_count(&self) -> usize {
        self.board.finished_len()
    }

    /// Stop accepting jobs and wait for queued and in-flight jobs to finish
    pub async fn shutdown(&self) {
        drop(self.sender.lock().take());
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(err) = worker.await {
                tracing::error!(error = %err, "remediation job worker terminated abnormally");
            }
        }
        tracing::info!("remediation job queue shut down");
    }
}

async fn worker_loop(
    engine: Arc<RemediationEngine>,
    mut rx: mpsc::Receiver<Job>,
    board: Arc<StatusBoard>,
) {
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            job = rx.recv() => match job {
                Some(job) => {
                    let span = tracing::info_span!(
                        "remediation_job",
                        job_id = %job.id,
                        pipeline_id = %job.pipeline_id
                    );
                    in_flight.spawn(
                        run_job(Arc::clone(&engine), job, Arc::clone(&board)).instrument(span),
                    );
                }
                None => break,
            },
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(err) = joined {
                    tracing::error!(error = %err, "remediation job task failed");
                }
            }
        }
    }

    while let Some(joined) = in_flight.join_next().await {
        if let Err(err) = joined {
            tracing::error!(error = %err, "remediation job task failed");
        }
    }
}

async fn run_job(engine: Arc<RemediationEngine>, job: Job, board: Arc<StatusBoard>) {
    let Job {
        id,
        pipeline_id,
        approved,
        reply,
    } = job;

    board.set(id, JobStatus::Running);
    tracing::info!(approved, "remediation job started");

    let outcome = AssertUnwindSafe(engine.execute_with_consent(&pipeline_id, approved))
        .catch_unwind()
        .await;

    match outcome {
        Ok(result) => {
            board.finish(
                id,
                JobStatus::Completed {
                    success: result.success,
                },
            );
            tracing::info!(success = result.success, "remediation job finished");
            // Ticket holder may have gone away; the job still counts as done.
            let _ = reply.send(result);
        }
        Err(_) => {
            board.finish(id, JobStatus::Failed("remediation panicked".to_string()));
            tracing::error!("remediation job panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_model::{InMemoryHistoryStore, PipelineRun, PipelineStatus, SentinelConfig};
    use sentinel_test_utils::RecordingExecutor;

    fn engine(executor: Arc<RecordingExecutor>) -> Arc<RemediationEngine> {
        let store = InMemoryHistoryStore::new().with_logs("p1", "marked flaky");
        Arc::new(RemediationEngine::new(
            &SentinelConfig::default(),
            Arc::new(store),
            executor,
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn submitted_job_runs_and_reports() {
        let executor = Arc::new(RecordingExecutor::new());
        let engine = engine(executor.clone());
        engine
            .evaluate_and_propose(&PipelineRun::new("p1", "svc", "main", PipelineStatus::Failure))
            .await
            .unwrap();

        let queue = RemediationJobQueue::start(Arc::clone(&engine), 4);
        let ticket = queue.submit("p1", true).await.unwrap();
        let id = ticket.id;

        let result = ticket.wait().await.unwrap();
        assert!(result.success);
        assert_eq!(executor.call_count(), 1);
        assert_eq!(queue.status(id), Some(JobStatus::Completed { success: true }));

        queue.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_ticket_does_not_cancel_job() {
        let executor = Arc::new(RecordingExecutor::new());
        let engine = engine(executor.clone());
        engine
            .evaluate_and_propose(&PipelineRun::new("p1", "svc", "main", PipelineStatus::Failure))
            .await
            .unwrap();

        let queue = RemediationJobQueue::start(engine, 4);
        let id = queue.submit("p1", true).await.unwrap().id;

        queue.shutdown().await;
        assert_eq!(executor.call_count(), 1);
        assert_eq!(queue.status(id), Some(JobStatus::Completed { success: true }));
        assert_eq!(queue.active_count(), 0);
    }

    #[tokio::test]
    async fn submit_after_shutdown_is_rejected() {
        let queue = RemediationJobQueue::start(engine(Arc::new(RecordingExecutor::new())), 1);
        queue.shutdown().await;
        let err = queue.submit("p1", true).await.unwrap_err();
        assert!(matches!(err, JobError::QueueClosed));
    }

    #[tokio::test]
    async fn job_for_unknown_pipeline_completes_unsuccessfully() {
        let queue = RemediationJobQueue::start(engine(Arc::new(RecordingExecutor::new())), 1);
        let ticket = queue.submit("ghost", true).await.unwrap();
        let id = ticket.id;
        let result = ticket.wait().await.unwrap();
        assert!(!result.success);
        assert_eq!(queue.status(id), Some(JobStatus::Completed { success: false }));
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn finished_statuses_are_evicted_past_retention() {
        let queue =
            RemediationJobQueue::start_with_retention(engine(Arc::new(RecordingExecutor::new())), 8, 16);

        let mut ids = Vec::new();
        for _ in 0..1000 {
            let ticket = queue.submit("ghost", true).await.unwrap();
            ids.push(ticket.id);
            ticket.wait().await.unwrap();
        }
        queue.shutdown().await;

        assert_eq!(queue.active_count(), 0);
        assert_eq!(queue.retained_count(), 16);
        assert_eq!(queue.status(ids[0]), None);
        assert_eq!(
            queue.status(ids[999]),
            Some(JobStatus::Completed { success: false })
        );
    }

    #[test]
    fn board_keeps_running_jobs_regardless_of_retention() {
        let board = StatusBoard::new(1);
        let (running, first, second) = (JobId::new(), JobId::new(), JobId::new());
        board.set(running, JobStatus::Running);
        board.set(first, JobStatus::Running);
        board.finish(first, JobStatus::Completed { success: true });
        board.set(second, JobStatus::Running);
        board.finish(second, JobStatus::Failed("boom".into()));

        assert_eq!(board.get(running), Some(JobStatus::Running));
        assert_eq!(board.get(first), None);
        assert_eq!(board.get(second), Some(JobStatus::Failed("boom".into())));
        assert_eq!(board.active_len(), 1);
        assert_eq!(board.finished_len(), 1);
    }

    #[test]
    fn zero_retention_keeps_no_finished_statuses() {
        let board = StatusBoard::new(0);
        let id = JobId::new();
        board.set(id, JobStatus::Running);
        board.finish(id, JobStatus::Completed { success: true });
        assert_eq!(board.get(id), None);
        assert_eq!(board.active_len(), 0);
        assert_eq!(board.finished_len(), 0);
    }
}
