//! Testing utilities for the CI Sentinel workspace
//!
//! Shared fixtures, collaborator doubles and history builders.

#![allow(missing_docs)]

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use parking_lot::Mutex;
use sentinel_model::{
    ActionExecutor, ActionResult, ActionType, Commit, ExecutorError, HistoryError, HistoryStore,
    NarrativeError, NarrativeGenerator, PipelineRun, PipelineStatus, RemediationAction,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Fixed reference instant: Monday 2024-01-15 10:00:00 UTC
pub fn reference_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).single().unwrap_or_default()
}

pub fn failed_run(id: &str, repository: &str, branch: &str) -> PipelineRun {
    PipelineRun::new(id, repository, branch, PipelineStatus::Failure)
}

pub fn run_started_at(
    id: &str,
    repository: &str,
    branch: &str,
    status: PipelineStatus,
    started_at: DateTime<Utc>,
) -> PipelineRun {
    PipelineRun::new(id, repository, branch, status).with_started_at(started_at)
}

/// One run per status, starting at `start` and spaced by `spacing`
pub fn status_sequence(
    repository: &str,
    branch: &str,
    statuses: &[PipelineStatus],
    start: DateTime<Utc>,
    spacing: ChronoDuration,
) -> Vec<PipelineRun> {
    statuses
        .iter()
        .enumerate()
        .map(|(i, status)| {
            let offset = spacing * i32::try_from(i).unwrap_or(i32::MAX);
            run_started_at(
                &format!("{repository}-{branch}-{i}"),
                repository,
                branch,
                *status,
                start + offset,
            )
        })
        .collect()
}

/// `n` runs alternating Success, Failure, Success, ...
pub fn alternating_statuses(n: usize) -> Vec<PipelineStatus> {
    (0..n)
        .map(|i| {
            if i % 2 == 0 {
                PipelineStatus::Success
            } else {
                PipelineStatus::Failure
            }
        })
        .collect()
}

pub fn commit_at(sha: &str, message: &str, timestamp: DateTime<Utc>, files: &[&str]) -> Commit {
    Commit::new(sha, message, "dev@example.com", timestamp).with_files(files.iter().copied())
}

/// One recorded executor invocation
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub action_type: ActionType,
    pub pipeline_id: String,
    pub at: tokio::time::Instant,
}

/// Action executor that records every call
///
/// Succeeds by default; can be told to fail specific action types and to
/// take simulated time per call.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    calls: Mutex<Vec<RecordedCall>>,
    failing: Mutex<Vec<ActionType>>,
    latency: Option<Duration>,
    completed: AtomicUsize,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Each call sleeps for `latency` before reporting
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    /// Calls for `action_type` return `ExecutorError::Rejected`
    pub fn fail_on(self, action_type: ActionType) -> Self {
        self.failing.lock().push(action_type);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Calls that ran to completion
    pub fn completed_count(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Gaps between consecutive call instants
    pub fn gaps(&self) -> Vec<Duration> {
        let calls = self.calls.lock();
        calls.windows(2).map(|w| w[1].at - w[0].at).collect()
    }
}

#[async_trait::async_trait]
impl ActionExecutor for RecordingExecutor {
    async fn execute(&self, action: &RemediationAction) -> Result<ActionResult, ExecutorError> {
        self.calls.lock().push(RecordedCall {
            action_type: action.action_type,
            pipeline_id: action.target.id.clone(),
            at: tokio::time::Instant::now(),
        });

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.completed.fetch_add(1, Ordering::SeqCst);

        if self.failing.lock().contains(&action.action_type) {
            return Err(ExecutorError::Rejected(format!(
                "{} not permitted",
                action.action_type
            )));
        }
        Ok(ActionResult::success(format!("{} dispatched", action.action_type)))
    }
}

/// Executor that panics on every call
#[derive(Debug, Default)]
pub struct PanickingExecutor;

#[async_trait::async_trait]
impl ActionExecutor for PanickingExecutor {
    async fn execute(&self, _action: &RemediationAction) -> Result<ActionResult, ExecutorError> {
        panic!("provider client crashed")
    }
}

/// History store whose backend is down
///
/// Listing and lookup fail with `HistoryError::Unavailable`; logs come back
/// empty as the store contract requires.
#[derive(Debug, Clone, Default)]
pub struct UnavailableHistoryStore;

#[async_trait::async_trait]
impl HistoryStore for UnavailableHistoryStore {
    async fn list_all(&self) -> Result<Vec<PipelineRun>, HistoryError> {
        Err(HistoryError::Unavailable("history backend offline".into()))
    }

    async fn get_by_id(&self, _id: &str) -> Result<Option<PipelineRun>, HistoryError> {
        Err(HistoryError::Unavailable("history backend offline".into()))
    }

    async fn fetch_logs(&self, _pipeline: &PipelineRun) -> String {
        String::new()
    }

    async fn commits_for(&self, _pipeline: &PipelineRun) -> Result<Vec<Commit>, HistoryError> {
        Err(HistoryError::Unavailable("history backend offline".into()))
    }
}

/// Narrative generator with a fixed reply
#[derive(Debug, Clone)]
pub enum ScriptedNarrator {
    Reply(String),
    Fail,
}

#[async_trait::async_trait]
impl NarrativeGenerator for ScriptedNarrator {
    async fn generate(&self, _prompt: &str) -> Result<String, NarrativeError> {
        match self {
            Self::Reply(text) => Ok(text.clone()),
            Self::Fail => Err(NarrativeError::Unavailable),
        }
    }
}
