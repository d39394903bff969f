//! Error types for collaborators and configuration
//!
//! None of these escape the core's public decision operations as hard
//! failures: executor errors become failed action results and narrative
//! errors fall back to template text. They exist so collaborator
//! implementations can report what went wrong.

use std::path::PathBuf;

/// History store errors
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    /// Backing store could not be reached
    #[error("history store unavailable: {0}")]
    Unavailable(String),
}

/// Action executor errors
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// Provider rejected the request
    #[error("provider rejected action: {0}")]
    Rejected(String),

    /// Transport-level failure talking to the provider
    #[error("provider unreachable: {0}")]
    Unreachable(String),

    /// Provider does not support this action type
    #[error("unsupported action: {0}")]
    Unsupported(String),

    /// Provider call timed out
    #[error("provider call timed out after {duration_secs}s")]
    Timeout { duration_secs: u64 },
}

impl ExecutorError {
    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::Timeout { .. })
    }
}

/// Narrative generator errors
#[derive(Debug, thiserror::Error)]
pub enum NarrativeError {
    /// Generator is not loaded or not configured
    #[error("narrative generator unavailable")]
    Unavailable,
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Value outside its allowed range
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn executor_error_display() {
        let err = ExecutorError::Rejected("403".to_string());
        assert!(err.to_string().contains("rejected"));
    }

    #[test]
    fn executor_error_is_retryable() {
        assert!(ExecutorError::Unreachable("dns".into()).is_retryable());
        assert!(ExecutorError::Timeout { duration_secs: 30 }.is_retryable());
        assert!(!ExecutorError::Unsupported("x".into()).is_retryable());
    }
}
