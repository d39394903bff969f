//! CI Sentinel history analyzers
//!
//! Read models computed on demand from pipeline history snapshots:
//! - Cascade risk: downstream runs exposed to a failure
//! - Flaky detection: unstable pass/fail sequences per branch
//! - Changelog correlation: the commit most likely behind a failure
//! - Deployment windows: hour/weekday slots with good or bad track records
//!
//! All analyzers are pure. Sparse or empty history gives a low-confidence or
//! empty result, never an error.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod cascade;
pub mod changelog;
pub mod deployment_window;
pub mod flaky;
pub mod narrative;

pub use cascade::{CascadeRisk, CascadeRiskAnalyzer, RiskLevel};
pub use changelog::{ChangelogAnalysis, ChangelogCorrelationAnalyzer, SuspiciousCommit};
pub use deployment_window::{
    BucketStats, DecisionBasis, DeploymentDecision, DeploymentRecommendation, DeploymentWindow,
    DeploymentWindowAdvisor,
};
pub use flaky::{FlakyPattern, FlakyTestDetector, FlakyTestReport};
pub use narrative::{fallback_for, narrate, narrate_or};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for the analyzers
    pub use crate::{
        CascadeRiskAnalyzer, ChangelogCorrelationAnalyzer, DeploymentWindowAdvisor,
        FlakyTestDetector,
    };
}
