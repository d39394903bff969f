//! Remediation actions, proposals and execution results

use crate::pipeline::PipelineRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ulid::Ulid;

/// Unique action identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActionId(pub Ulid);

impl ActionId {
    /// Generate new action ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for ActionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ActionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of remote operation an action performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    RerunPipeline,
    RerunFailedJobs,
    RollbackDeployment,
    CancelPipeline,
    RetryWithDebug,
    NotifySlack,
    NotifyEmail,
}

impl ActionType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RerunPipeline => "rerun_pipeline",
            Self::RerunFailedJobs => "rerun_failed_jobs",
            Self::RollbackDeployment => "rollback_deployment",
            Self::CancelPipeline => "cancel_pipeline",
            Self::RetryWithDebug => "retry_with_debug",
            Self::NotifySlack => "notify_slack",
            Self::NotifyEmail => "notify_email",
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single concrete remote operation targeting a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemediationAction {
    pub id: ActionId,
    pub action_type: ActionType,
    pub target: PipelineRef,
    pub description: String,
    /// Must be approved by a human before dispatch
    pub requires_confirmation: bool,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

impl RemediationAction {
    /// New action; confirmation is required unless explicitly waived
    #[must_use]
    pub fn new(action_type: ActionType, target: PipelineRef, description: impl Into<String>) -> Self {
        Self {
            id: ActionId::new(),
            action_type,
            target,
            description: description.into(),
            requires_confirmation: true,
            parameters: BTreeMap::new(),
        }
    }

    /// Add a string parameter
    #[inline]
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }
}

/// Severity of a failure as judged by the proposal generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Consent-pending bundle of remediation actions with rationale
///
/// Immutable once built: fields are private and exposed through accessors so
/// a pending proposal cannot be edited between proposal and consent. Only
/// serialized; proposals are always built through [`RemediationProposal::new`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemediationProposal {
    target: PipelineRef,
    failure_type: String,
    reason: String,
    actions: Vec<RemediationAction>,
    severity: Severity,
    confidence: f64,
    estimated_time: String,
    warning: Option<String>,
    created_at: DateTime<Utc>,
}

impl RemediationProposal {
    /// Build a proposal. Confidence is clamped to `[0, 1]`.
    #[must_use]
    pub fn new(
        target: PipelineRef,
        failure_type: impl Into<String>,
        reason: impl Into<String>,
        actions: Vec<RemediationAction>,
        severity: Severity,
        confidence: f64,
        estimated_time: impl Into<String>,
    ) -> Self {
        Self {
            target,
            failure_type: failure_type.into(),
            reason: reason.into(),
            actions,
            severity,
            confidence: clamp_unit(confidence),
            estimated_time: estimated_time.into(),
            warning: None,
            created_at: Utc::now(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = Some(warning.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn target(&self) -> &PipelineRef {
        &self.target
    }

    #[inline]
    #[must_use]
    pub fn pipeline_id(&self) -> &str {
        &self.target.id
    }

    #[inline]
    #[must_use]
    pub fn failure_type(&self) -> &str {
        &self.failure_type
    }

    #[inline]
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }

    #[inline]
    #[must_use]
    pub fn actions(&self) -> &[RemediationAction] {
        &self.actions
    }

    /// Consume the proposal, yielding its ordered action list
    #[inline]
    #[must_use]
    pub fn into_actions(self) -> Vec<RemediationAction> {
        self.actions
    }

    #[inline]
    #[must_use]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    #[inline]
    #[must_use]
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    #[inline]
    #[must_use]
    pub fn estimated_time(&self) -> &str {
        &self.estimated_time
    }

    #[inline]
    #[must_use]
    pub fn warning(&self) -> Option<&str> {
        self.warning.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// True when the proposal carries no automatic actions
    #[inline]
    #[must_use]
    pub fn is_manual_only(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Outcome of executing one action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub details: BTreeMap<String, String>,
}

impl ActionResult {
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            timestamp: Utc::now(),
            details: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            timestamp: Utc::now(),
            details: BTreeMap::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// Aggregate outcome of executing a proposal's action list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemediationResult {
    /// Logical AND of every action result
    pub success: bool,
    pub message: String,
    pub results: Vec<ActionResult>,
}

impl RemediationResult {
    /// Failure with no actions executed
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            results: Vec::new(),
        }
    }

    /// Aggregate per-action results in execution order
    #[must_use]
    pub fn from_results(results: Vec<ActionResult>) -> Self {
        let total = results.len();
        let succeeded = results.iter().filter(|r| r.success).count();
        let success = succeeded == total;
        let message = if total == 0 {
            "no actions to execute".to_string()
        } else if success {
            format!("{succeeded} of {total} actions succeeded")
        } else {
            format!("{} of {total} actions failed", total - succeeded)
        };

        Self {
            success,
            message,
            results,
        }
    }

    #[inline]
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }
}

#[inline]
fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
