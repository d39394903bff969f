//! Executor that reports actions instead of performing them

use sentinel_model::{ActionExecutor, ActionResult, ExecutorError, RemediationAction};

/// Logs each action and reports success without contacting a provider
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunExecutor;

#[async_trait::async_trait]
impl ActionExecutor for DryRunExecutor {
    async fn execute(&self, action: &RemediationAction) -> Result<ActionResult, ExecutorError> {
        tracing::info!(
            action_id = %action.id,
            action = %action.action_type,
            target = %action.target,
            "dry run"
        );
        Ok(ActionResult::success(format!("dry run: would {}", action.description))
            .with_detail("target", action.target.to_string()))
    }
}
