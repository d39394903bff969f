//! Pipeline history store collaborator
//!
//! Read-only source of pipeline run snapshots, raw logs and candidate
//! commits. [`InMemoryHistoryStore`] backs the CLI and the test suites.

use crate::error::HistoryError;
use crate::pipeline::{Commit, PipelineRun};
use std::collections::HashMap;

/// Read-only access to pipeline history
#[async_trait::async_trait]
pub trait HistoryStore: Send + Sync {
    /// All known runs, in store order
    ///
    /// # Errors
    /// `HistoryError` if the backing store cannot be read.
    async fn list_all(&self) -> Result<Vec<PipelineRun>, HistoryError>;

    /// Look up a single run
    ///
    /// # Errors
    /// `HistoryError` if the backing store cannot be read.
    async fn get_by_id(&self, id: &str) -> Result<Option<PipelineRun>, HistoryError>;

    /// Raw log text for a run
    ///
    /// Returns an empty string on any failure; never errors.
    async fn fetch_logs(&self, pipeline: &PipelineRun) -> String;

    /// Candidate commits for a run, most recent first
    ///
    /// # Errors
    /// `HistoryError` if the backing store cannot be read.
    async fn commits_for(&self, _pipeline: &PipelineRun) -> Result<Vec<Commit>, HistoryError> {
        Ok(Vec::new())
    }
}

/// History store held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryHistoryStore {
    runs: Vec<PipelineRun>,
    logs: HashMap<String, String>,
    commits: HashMap<String, Vec<Commit>>,
}

impl InMemoryHistoryStore {
    /// Create an empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store from a list of runs
    #[must_use]
    pub fn from_runs(runs: Vec<PipelineRun>) -> Self {
        Self {
            runs,
            ..Self::default()
        }
    }

    /// With an additional run
    #[inline]
    #[must_use]
    pub fn with_run(mut self, run: PipelineRun) -> Self {
        self.insert_run(run);
        self
    }

    /// With log text for a pipeline id
    #[inline]
    #[must_use]
    pub fn with_logs(mut self, pipeline_id: impl Into<String>, logs: impl Into<String>) -> Self {
        self.insert_logs(pipeline_id, logs);
        self
    }

    /// With candidate commits for a pipeline id
    #[inline]
    #[must_use]
    pub fn with_commits(mut self, pipeline_id: impl Into<String>, commits: Vec<Commit>) -> Self {
        self.commits.insert(pipeline_id.into(), commits);
        self
    }

    /// Insert or replace a run by id
    pub fn insert_run(&mut self, run: PipelineRun) {
        if let Some(existing) = self.runs.iter_mut().find(|r| r.id == run.id) {
            *existing = run;
        } else {
            self.runs.push(run);
        }
    }

    pub fn insert_logs(&mut self, pipeline_id: impl Into<String>, logs: impl Into<String>) {
        self.logs.insert(pipeline_id.into(), logs.into());
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn runs(&self) -> &[PipelineRun] {
        &self.runs
    }
}

#[async_trait::async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn list_all(&self) -> Result<Vec<PipelineRun>, HistoryError> {
        Ok(self.runs.clone())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<PipelineRun>, HistoryError> {
        Ok(self.runs.iter().find(|r| r.id == id).cloned())
    }

    async fn fetch_logs(&self, pipeline: &PipelineRun) -> String {
        match self.logs.get(&pipeline.id) {
            Some(logs) => logs.clone(),
            None => {
                tracing::debug!(pipeline_id = %pipeline.id, "no logs recorded for pipeline");
                String::new()
            }
        }
    }

    async fn commits_for(&self, pipeline: &PipelineRun) -> Result<Vec<Commit>, HistoryError> {
        Ok(self.commits.get(&pipeline.id).cloned().unwrap_or_default())
    }
}
