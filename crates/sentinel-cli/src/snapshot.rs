//! JSON history snapshots
//!
//! ```json
//! {
//!   "runs": [{ "id": "P1", "repository": "svc-a", "branch": "main", "status": "failure" }],
//!   "logs": { "P1": "connection timed out" },
//!   "commits": { "P1": [{ "sha": "abc", "message": "wip", "author": "a", "timestamp": "2024-01-15T09:30:00Z" }] }
//! }
//! ```

use anyhow::{Context, Result};
use sentinel_model::{Commit, InMemoryHistoryStore, PipelineRun};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Pipeline history read from disk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub runs: Vec<PipelineRun>,
    /// Raw logs keyed by pipeline id
    pub logs: HashMap<String, String>,
    /// Candidate commits keyed by pipeline id
    pub commits: HashMap<String, Vec<Commit>>,
}

impl Snapshot {
    /// Parse snapshot JSON
    ///
    /// # Errors
    /// When `text` is not a valid snapshot document.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("invalid snapshot JSON")
    }

    /// Read and parse a snapshot file
    ///
    /// # Errors
    /// When the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read snapshot {}", path.display()))?;
        let snapshot = Self::from_json(&text)
            .with_context(|| format!("failed to load snapshot {}", path.display()))?;
        tracing::debug!(path = %path.display(), runs = snapshot.runs.len(), "loaded snapshot");
        Ok(snapshot)
    }

    /// Run with `id`
    ///
    /// # Errors
    /// When no run has that id.
    pub fn run(&self, id: &str) -> Result<&PipelineRun> {
        self.runs
            .iter()
            .find(|run| run.id == id)
            .with_context(|| format!("pipeline {id} not found in snapshot"))
    }

    /// Candidate commits for `id`, empty when none recorded
    #[must_use]
    pub fn commits_for(&self, id: &str) -> &[Commit] {
        self.commits.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    /// In-memory history store over this snapshot
    #[must_use]
    pub fn to_store(&self) -> InMemoryHistoryStore {
        let mut store = InMemoryHistoryStore::from_runs(self.runs.clone());
        for (id, logs) in &self.logs {
            store.insert_logs(id.clone(), logs.clone());
        }
        self.commits
            .iter()
            .fold(store, |store, (id, commits)| store.with_commits(id.clone(), commits.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_model::{HistoryStore, PipelineStatus};

    const SAMPLE: &str = r#"{
        "runs": [
            {"id": "P1", "repository": "svc-a", "branch": "main", "status": "failure",
             "started_at": "2024-01-15T10:00:00Z"}
        ],
        "logs": {"P1": "connection timed out"},
        "commits": {"P1": [
            {"sha": "abc1234", "message": "wip", "author": "dev", "timestamp": "2024-01-15T09:30:00Z"}
        ]}
    }"#;

    #[test]
    fn parses_sample() {
        let snapshot = Snapshot::from_json(SAMPLE).unwrap();
        assert_eq!(snapshot.runs.len(), 1);
        assert_eq!(snapshot.run("P1").unwrap().status, PipelineStatus::Failure);
        assert_eq!(snapshot.commits_for("P1").len(), 1);
        assert!(snapshot.commits_for("P2").is_empty());
        assert!(snapshot.run("P2").is_err());
    }

    #[test]
    fn missing_sections_default() {
        let snapshot = Snapshot::from_json("{}").unwrap();
        assert!(snapshot.runs.is_empty());
    }

    #[tokio::test]
    async fn store_serves_logs_and_commits() {
        let snapshot = Snapshot::from_json(SAMPLE).unwrap();
        let store = snapshot.to_store();
        let run = snapshot.run("P1").unwrap();
        assert_eq!(store.fetch_logs(run).await, "connection timed out");
        assert_eq!(store.commits_for(run).await.unwrap().len(), 1);
    }
}
