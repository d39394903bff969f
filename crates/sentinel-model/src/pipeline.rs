//! Pipeline run and commit snapshots
//!
//! These are read-only views handed to the core by the history store. The
//! core never mutates them; the `with_*` builders exist for stores and tests
//! that assemble snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Status of a pipeline run as reported by the CI provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Queued,
    Running,
    Success,
    Failure,
    Canceled,
    Skipped,
    Pending,
    #[default]
    Unknown,
}

impl PipelineStatus {
    /// Lowercase label used in logs and CLI output
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Canceled => "canceled",
            Self::Skipped => "skipped",
            Self::Pending => "pending",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineStatus {
    type Err = std::convert::Infallible;

    /// Lenient parse over the common provider spellings. Anything unrecognized
    /// becomes `Unknown` rather than an error.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let status = match s.trim().to_ascii_lowercase().as_str() {
            "queued" | "waiting" | "scheduled" => Self::Queued,
            "running" | "in_progress" | "in-progress" | "started" => Self::Running,
            "success" | "succeeded" | "passed" | "fixed" => Self::Success,
            "failure" | "failed" | "failing" | "errored" | "error" | "broken" => Self::Failure,
            "canceled" | "cancelled" | "aborted" => Self::Canceled,
            "skipped" => Self::Skipped,
            "pending" | "created" | "manual" => Self::Pending,
            _ => Self::Unknown,
        };
        Ok(status)
    }
}

/// Immutable snapshot of one recorded pipeline execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: String,
    pub repository: String,
    pub branch: String,
    #[serde(default)]
    pub build_number: u64,
    pub status: PipelineStatus,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    /// Wall-clock duration in milliseconds, when the provider reported one
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub commit_hash: Option<String>,
    #[serde(default)]
    pub commit_message: Option<String>,
    #[serde(default)]
    pub commit_author: Option<String>,
    /// Provider tag, e.g. "github", "gitlab", "jenkins"
    #[serde(default)]
    pub provider: String,
}

impl PipelineRun {
    /// Create a snapshot with the identifying fields set
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        repository: impl Into<String>,
        branch: impl Into<String>,
        status: PipelineStatus,
    ) -> Self {
        Self {
            id: id.into(),
            repository: repository.into(),
            branch: branch.into(),
            build_number: 0,
            status,
            started_at: None,
            finished_at: None,
            duration_ms: None,
            commit_hash: None,
            commit_message: None,
            commit_author: None,
            provider: String::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_build_number(mut self, build_number: u64) -> Self {
        self.build_number = build_number;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = Some(started_at);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_finished_at(mut self, finished_at: DateTime<Utc>) -> Self {
        self.finished_at = Some(finished_at);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = Some(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Attach the triggering commit
    #[must_use]
    pub fn with_commit(
        mut self,
        hash: impl Into<String>,
        message: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        self.commit_hash = Some(hash.into());
        self.commit_message = Some(message.into());
        self.commit_author = Some(author.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.status == PipelineStatus::Failure
    }

    /// Reported duration, if any
    #[inline]
    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        self.duration_ms.map(Duration::from_millis)
    }

    /// `repository:branch` grouping key
    #[must_use]
    pub fn group_key(&self) -> String {
        format!("{}:{}", self.repository, self.branch)
    }

    /// Lightweight reference used as the target of remediation actions
    #[must_use]
    pub fn to_ref(&self) -> PipelineRef {
        PipelineRef {
            id: self.id.clone(),
            repository: self.repository.clone(),
            branch: self.branch.clone(),
            build_number: self.build_number,
            provider: self.provider.clone(),
        }
    }
}

/// Reference to a pipeline run, carried by remediation actions
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PipelineRef {
    pub id: String,
    pub repository: String,
    pub branch: String,
    pub build_number: u64,
    pub provider: String,
}

impl std::fmt::Display for PipelineRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}#{}", self.repository, self.branch, self.build_number)
    }
}

/// A commit that may have contributed to a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub message: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub changed_files: Vec<String>,
    /// Reported file count; may exceed `changed_files.len()` when the
    /// provider truncates the file list
    #[serde(default)]
    pub files_changed: usize,
    #[serde(default)]
    pub lines_added: u64,
    #[serde(default)]
    pub lines_deleted: u64,
}

impl Commit {
    #[must_use]
    pub fn new(
        sha: impl Into<String>,
        message: impl Into<String>,
        author: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            sha: sha.into(),
            message: message.into(),
            author: author.into(),
            timestamp,
            changed_files: Vec::new(),
            files_changed: 0,
            lines_added: 0,
            lines_deleted: 0,
        }
    }

    /// Set the changed file list; also updates `files_changed`
    #[must_use]
    pub fn with_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.changed_files = files.into_iter().map(Into::into).collect();
        self.files_changed = self.changed_files.len();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_files_changed(mut self, count: usize) -> Self {
        self.files_changed = count;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_line_stats(mut self, added: u64, deleted: u64) -> Self {
        self.lines_added = added;
        self.lines_deleted = deleted;
        self
    }

    #[inline]
    #[must_use]
    pub fn total_lines_changed(&self) -> u64 {
        self.lines_added.saturating_add(self.lines_deleted)
    }

    /// Short form of the sha for display
    #[must_use]
    pub fn short_sha(&self) -> &str {
        self.sha.get(..7).unwrap_or(&self.sha)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_provider_spellings() {
        assert_eq!("failed".parse::<PipelineStatus>().unwrap(), PipelineStatus::Failure);
        assert_eq!("in_progress".parse::<PipelineStatus>().unwrap(), PipelineStatus::Running);
        assert_eq!("Cancelled".parse::<PipelineStatus>().unwrap(), PipelineStatus::Canceled);
        assert_eq!("weird".parse::<PipelineStatus>().unwrap(), PipelineStatus::Unknown);
    }

    #[test]
    fn status_serde_is_snake_case() {
        let json = serde_json::to_string(&PipelineStatus::Failure).unwrap();
        assert_eq!(json, "\"failure\"");
    }

    #[test]
    fn run_builder_and_ref() {
        let run = PipelineRun::new("p1", "svc-a", "main", PipelineStatus::Failure)
            .with_build_number(42)
            .with_provider("github")
            .with_duration(Duration::from_secs(90));

        assert!(run.is_failure());
        assert_eq!(run.duration_ms, Some(90_000));
        assert_eq!(run.group_key(), "svc-a:main");

        let r = run.to_ref();
        assert_eq!(r.id, "p1");
        assert_eq!(r.to_string(), "svc-a@main#42");
    }

    #[test]
    fn run_deserializes_with_missing_optionals() {
        let run: PipelineRun = serde_json::from_str(
            r#"{"id":"p9","repository":"r","branch":"dev","status":"success"}"#,
        )
        .unwrap();
        assert_eq!(run.status, PipelineStatus::Success);
        assert!(run.started_at.is_none());
        assert_eq!(run.build_number, 0);
    }

    #[test]
    fn commit_helpers() {
        let c = Commit::new("abcdef123456", "msg", "dev", Utc::now())
            .with_files(["a.rs", "b.rs"])
            .with_line_stats(10, 5);
        assert_eq!(c.files_changed, 2);
        assert_eq!(c.total_lines_changed(), 15);
        assert_eq!(c.short_sha(), "abcdef1");
    }
}
