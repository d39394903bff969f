//! Error types for the remediation workflow
//!
//! The consent-gated entry points themselves never fail: a missing proposal
//! or a declined decision is a failed `RemediationResult`. Errors here come
//! from batch operations that must read the history store and from the
//! background job queue.

use sentinel_model::HistoryError;

/// Remediation workflow errors
#[derive(Debug, thiserror::Error)]
pub enum RemediationError {
    /// History store could not be read
    #[error("history store error: {0}")]
    History(#[from] HistoryError),

    /// Pipeline id not present in the history store
    #[error("pipeline not found: {0}")]
    PipelineNotFound(String),
}

/// Background job queue errors
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// Queue was shut down and accepts no more jobs
    #[error("job queue is closed")]
    QueueClosed,

    /// Job finished without reporting a result (worker dropped it)
    #[error("job {0} ended without a result")]
    ResultDropped(String),
}
