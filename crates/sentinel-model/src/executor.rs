//! Action executor collaborator
//!
//! Performs one remediation action against a specific CI provider. The
//! orchestrator may invoke `RerunPipeline`-type actions repeatedly, so
//! implementations must tolerate at-least-once delivery for those.

use crate::error::ExecutorError;
use crate::remediation::{ActionResult, RemediationAction};

/// Executes a single remediation action
///
/// Implement this trait per provider. Timeouts are the implementation's
/// responsibility; the orchestrator imposes none.
#[async_trait::async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Execute one action and report its outcome
    ///
    /// # Errors
    /// Any `ExecutorError` is converted by the orchestrator into a failed
    /// `ActionResult` for this action.
    async fn execute(&self, action: &RemediationAction) -> Result<ActionResult, ExecutorError>;
}
