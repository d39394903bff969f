//! CI Sentinel remediation
//!
//! Turns a failed pipeline run into a consent-pending remediation proposal
//! and, once a human approves, executes it:
//! - Classifies raw logs into one of seven failure categories
//! - Generates a proposal from fixed per-category templates
//! - Holds proposals in a consent gate, one per pipeline id
//! - Executes approved actions in order with exponential backoff between reruns
//! - Runs consent decisions on a supervised background queue
//!
//! # Example
//!
//! ```rust,ignore
//! use sentinel_remediation::RemediationEngine;
//! use sentinel_model::SentinelConfig;
//!
//! # async fn example(store: Arc<dyn HistoryStore>, executor: Arc<dyn ActionExecutor>, run: PipelineRun) {
//! let engine = RemediationEngine::new(&SentinelConfig::default(), store, executor);
//!
//! if let Some(proposal) = engine.evaluate_and_propose(&run).await {
//!     println!("{}: {} actions", proposal.failure_type(), proposal.actions().len());
//!     let result = engine.execute_with_consent(&run.id, true).await;
//!     println!("{}", result.message);
//! }
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod classifier;
pub mod consent;
pub mod engine;
pub mod error;
pub mod jobs;
pub mod orchestrator;
pub mod proposal;

pub use classifier::{classify, ClassificationRule, FailureCategory, FailureClassifier};
pub use consent::{ConsentDecision, ConsentGate};
pub use engine::{RemediationEngine, DECLINED_MESSAGE, NO_PENDING_MESSAGE};
pub use error::{JobError, RemediationError};
pub use jobs::{JobId, JobStatus, JobTicket, RemediationJobQueue, DEFAULT_FINISHED_RETENTION};
pub use orchestrator::{BackoffPolicy, RemediationOrchestrator};
pub use proposal::ProposalGenerator;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for the remediation workflow
    pub use crate::{
        classify, ConsentGate, FailureCategory, ProposalGenerator, RemediationEngine,
        RemediationJobQueue, RemediationOrchestrator,
    };
}
