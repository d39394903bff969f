//! CI Sentinel data model
//!
//! Shared vocabulary for every other crate in the workspace:
//! - Pipeline run snapshots and commits supplied by the history store
//! - Remediation actions, proposals and execution results
//! - Collaborator traits (history store, action executor, narrative generator)
//! - Configuration and error types
//!
//! Nothing in this crate performs remote I/O. Collaborators are traits so the
//! decision logic can be exercised against in-memory implementations.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod error;
pub mod executor;
pub mod history;
pub mod narrative;
pub mod pipeline;
pub mod remediation;

pub use config::{
    CascadeSettings, FlakySettings, JobSettings, RemediationSettings, SentinelConfig,
};
pub use error::{ConfigError, ExecutorError, HistoryError, NarrativeError};
pub use executor::ActionExecutor;
pub use history::{HistoryStore, InMemoryHistoryStore};
pub use narrative::NarrativeGenerator;
pub use pipeline::{Commit, PipelineRef, PipelineRun, PipelineStatus};
pub use remediation::{
    ActionId, ActionResult, ActionType, RemediationAction, RemediationProposal,
    RemediationResult, Severity,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the CI Sentinel model
    pub use crate::{
        ActionExecutor, ActionResult, ActionType, Commit, HistoryStore, PipelineRun,
        PipelineStatus, RemediationAction, RemediationProposal, RemediationResult,
        SentinelConfig, Severity,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
