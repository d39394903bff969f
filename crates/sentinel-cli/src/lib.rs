//! ci-sentinel command line support
//!
//! Loads pipeline history snapshots from JSON and runs the remediation
//! workflow and history analyzers over them. Remote actions are never
//! performed: approved proposals run through a dry-run executor.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod commands;
pub mod dry_run;
pub mod logging;
pub mod snapshot;

pub use commands::Summary;
pub use dry_run::DryRunExecutor;
pub use logging::LogFormat;
pub use snapshot::Snapshot;
