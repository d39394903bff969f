//! Remediation orchestrator
//!
//! Executes an approved action list in order against an [`ActionExecutor`].
//!
//! # Execution policy
//!
//! - Continue-on-error: every action is attempted regardless of earlier
//!   outcomes. Executor errors and panics become failed [`ActionResult`]s.
//! - Backoff: after a `RerunPipeline` action that is not last, wait
//!   `base^(index + 1)` seconds (index is the 0-based position of the action
//!   just executed). The wait is a tokio sleep and holds no lock.
//! - Cancellation: each dispatched action runs in its own task. If the
//!   caller drops the future, the in-flight action still runs to completion;
//!   only actions not yet dispatched are skipped.

use sentinel_model::{
    ActionExecutor, ActionResult, ActionType, RemediationAction, RemediationResult,
};
use std::sync::Arc;
use std::time::Duration;

/// Delay schedule between consecutive reruns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    base_secs: u64,
}

impl BackoffPolicy {
    /// Base used when nothing is configured
    pub const DEFAULT_BASE_SECS: u64 = 2;

    /// Exponential backoff with the given base; a zero base is treated as 1
    #[inline]
    #[must_use]
    pub fn exponential(base_secs: u64) -> Self {
        Self {
            base_secs: base_secs.max(1),
        }
    }

    #[inline]
    #[must_use]
    pub fn base_secs(&self) -> u64 {
        self.base_secs
    }

    /// Delay after the action at `index`: `base^(index + 1)` seconds
    #[must_use]
    pub fn delay_after(&self, index: usize) -> Duration {
        let exp = u32::try_from(index.saturating_add(1)).unwrap_or(u32::MAX);
        Duration::from_secs(self.base_secs.saturating_pow(exp))
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::exponential(Self::DEFAULT_BASE_SECS)
    }
}

/// Runs action lists against an executor
#[derive(Clone)]
pub struct RemediationOrchestrator {
    executor: Arc<dyn ActionExecutor>,
    backoff: BackoffPolicy,
}

impl std::fmt::Debug for RemediationOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemediationOrchestrator")
            .field("executor", &"<ActionExecutor>")
            .field("backoff", &self.backoff)
            .finish()
    }
}

impl RemediationOrchestrator {
    /// Create with the default backoff
    #[must_use]
    pub fn new(executor: Arc<dyn ActionExecutor>) -> Self {
        Self {
            executor,
            backoff: BackoffPolicy::default(),
        }
    }

    /// With a custom backoff policy
    #[inline]
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    #[inline]
    #[must_use]
    pub fn backoff(&self) -> BackoffPolicy {
        self.backoff
    }

    /// Execute `actions` in order and aggregate the results
    pub async fn execute(&self, actions: Vec<RemediationAction>) -> RemediationResult {
        let total = actions.len();
        let mut results = Vec::with_capacity(total);

        for (index, action) in actions.into_iter().enumerate() {
            let action_type = action.action_type;
            tracing::info!(
                action_id = %action.id,
                action_type = %action_type,
                target = %action.target,
                position = index + 1,
                total,
                "dispatching remediation action"
            );

            let result = self.dispatch(action).await;
            let outcome = if result.success { "success" } else { "failure" };
            metrics::counter!("sentinel_actions_total", "outcome" => outcome).increment(1);
            results.push(result);

            if action_type == ActionType::RerunPipeline && index + 1 < total {
                let delay = self.backoff.delay_after(index);
                tracing::debug!(delay_secs = delay.as_secs(), "backing off before next action");
                tokio::time::sleep(delay).await;
            }
        }

        let result = RemediationResult::from_results(results);
        tracing::info!(success = result.success, "{}", result.message);
        result
    }

    /// Run one action in its own task and convert every failure mode into an
    /// `ActionResult`
    async fn dispatch(&self, action: RemediationAction) -> ActionResult {
        let executor = Arc::clone(&self.executor);
        let action_id = action.id.to_string();
        let handle = tokio::spawn(async move { executor.execute(&action).await });

        match handle.await {
            Ok(Ok(result)) => result.with_detail("action_id", action_id),
            Ok(Err(err)) => {
                tracing::warn!(action_id = %action_id, error = %err, "remediation action failed");
                ActionResult::failure(format!("action {action_id} failed: {err}"))
                    .with_detail("action_id", action_id)
                    .with_detail("error", err.to_string())
                    .with_detail("retryable", err.is_retryable().to_string())
            }
            Err(join_err) => {
                let cause = if join_err.is_panic() {
                    "executor panicked"
                } else {
                    "executor task cancelled"
                };
                tracing::error!(action_id = %action_id, "{cause}");
                ActionResult::failure(format!("action {action_id} aborted: {cause}"))
                    .with_detail("action_id", action_id)
                    .with_detail("error", cause)
            }
        }
    }
}
