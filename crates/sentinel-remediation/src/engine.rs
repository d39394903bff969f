//! Remediation engine
//!
//! Owns the consent gate and wires the classifier, proposal generator and
//! orchestrator to the history store and action executor.
//!
//! # Workflow
//! 1. `evaluate_and_propose`: failed run -> logs -> category -> proposal,
//!    stored in the gate under the pipeline id
//! 2. `execute_with_consent`: take the proposal out of the gate; run it only
//!    when approved

use crate::classifier::{FailureCategory, FailureClassifier};
use crate::consent::{ConsentDecision, ConsentGate};
use crate::error::RemediationError;
use crate::orchestrator::{BackoffPolicy, RemediationOrchestrator};
use crate::proposal::ProposalGenerator;
use sentinel_model::{
    ActionExecutor, HistoryStore, PipelineRun, PipelineStatus, RemediationProposal,
    RemediationResult, SentinelConfig,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Result message when no proposal is pending for an id
pub const NO_PENDING_MESSAGE: &str = "no pending remediation found";
/// Result message when the user declines a proposal
pub const DECLINED_MESSAGE: &str = "user declined remediation";

/// Entry point for the consent-gated remediation workflow
pub struct RemediationEngine {
    auto_remediation: AtomicBool,
    history: Arc<dyn HistoryStore>,
    classifier: FailureClassifier,
    generator: ProposalGenerator,
    gate: ConsentGate,
    orchestrator: RemediationOrchestrator,
}

impl std::fmt::Debug for RemediationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemediationEngine")
            .field("auto_remediation", &self.auto_remediation)
            .field("history", &"<HistoryStore>")
            .field("gate", &self.gate)
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}

impl RemediationEngine {
    /// Create an engine from configuration and collaborators
    #[must_use]
    pub fn new(
        config: &SentinelConfig,
        history: Arc<dyn HistoryStore>,
        executor: Arc<dyn ActionExecutor>,
    ) -> Self {
        let backoff = BackoffPolicy::exponential(config.remediation.backoff_base_secs);
        Self {
            auto_remediation: AtomicBool::new(config.remediation.auto_remediation_enabled),
            history,
            classifier: FailureClassifier::default(),
            generator: ProposalGenerator::new(),
            gate: ConsentGate::new(),
            orchestrator: RemediationOrchestrator::new(executor).with_backoff(backoff),
        }
    }

    /// With a custom classifier
    #[inline]
    #[must_use]
    pub fn with_classifier(mut self, classifier: FailureClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Toggle the global auto-remediation switch
    pub fn set_auto_remediation(&self, enabled: bool) {
        self.auto_remediation.store(enabled, Ordering::SeqCst);
        tracing::info!(enabled, "auto-remediation toggled");
    }

    #[inline]
    #[must_use]
    pub fn auto_remediation_enabled(&self) -> bool {
        self.auto_remediation.load(Ordering::SeqCst)
    }

    /// Classify a run from its logs. Missing logs classify as `Unknown`.
    pub async fn classify(&self, pipeline: &PipelineRun) -> FailureCategory {
        let logs = self.history.fetch_logs(pipeline).await;
        self.classifier.classify(&logs)
    }

    /// Propose remediation for a failed run
    ///
    /// Returns `None` unless auto-remediation is enabled and the run failed.
    /// Otherwise the proposal replaces any pending one for the same id.
    pub async fn evaluate_and_propose(&self, pipeline: &PipelineRun) -> Option<RemediationProposal> {
        if !self.auto_remediation_enabled() {
            tracing::debug!(pipeline_id = %pipeline.id, "auto-remediation disabled; skipping");
            return None;
        }
        if pipeline.status != PipelineStatus::Failure {
            return None;
        }

        let category = self.classify(pipeline).await;
        let proposal = self.generator.generate(category, pipeline);

        tracing::info!(
            pipeline_id = %pipeline.id,
            category = category.as_str(),
            actions = proposal.actions().len(),
            confidence = proposal.confidence(),
            "remediation proposed"
        );
        metrics::counter!("sentinel_proposals_total", "category" => category.as_str()).increment(1);

        self.gate.propose(proposal.clone());
        Some(proposal)
    }

    /// Resolve the pending proposal for `pipeline_id` with a consent decision
    ///
    /// The proposal is removed from the gate whether approved or declined.
    pub async fn execute_with_consent(&self, pipeline_id: &str, approved: bool) -> RemediationResult {
        let Some(proposal) = self.gate.consume(pipeline_id) else {
            tracing::warn!(pipeline_id, "consent received with no pending remediation");
            return RemediationResult::failure(NO_PENDING_MESSAGE);
        };

        let decision = ConsentDecision::from_approved(approved);
        metrics::counter!("sentinel_consent_decisions_total", "decision" => decision.as_str())
            .increment(1);

        match decision {
            ConsentDecision::Declined => {
                tracing::info!(pipeline_id, "remediation declined");
                RemediationResult::failure(DECLINED_MESSAGE)
            }
            ConsentDecision::Approved => {
                tracing::info!(
                    pipeline_id,
                    failure_type = proposal.failure_type(),
                    "remediation approved; executing"
                );
                self.orchestrator.execute(proposal.into_actions()).await
            }
        }
    }

    /// Evaluate the run with `pipeline_id` from the history store
    ///
    /// # Errors
    /// `RemediationError::PipelineNotFound` for an unknown id,
    /// `RemediationError::History` when the store fails.
    pub async fn evaluate_by_id(
        &self,
        pipeline_id: &str,
    ) -> Result<Option<RemediationProposal>, RemediationError> {
        let pipeline = self
            .history
            .get_by_id(pipeline_id)
            .await?
            .ok_or_else(|| RemediationError::PipelineNotFound(pipeline_id.to_string()))?;
        Ok(self.evaluate_and_propose(&pipeline).await)
    }

    /// Propose remediation for every failed run in the history store
    ///
    /// # Errors
    /// `RemediationError::History` when the store fails.
    pub async fn evaluate_failures(&self) -> Result<Vec<RemediationProposal>, RemediationError> {
        let runs = self.history.list_all().await?;
        let mut proposals = Vec::new();
        for run in runs.iter().filter(|r| r.is_failure()) {
            if let Some(proposal) = self.evaluate_and_propose(run).await {
                proposals.push(proposal);
            }
        }
        tracing::info!(count = proposals.len(), "evaluated failed pipelines");
        Ok(proposals)
    }

    /// Pending proposal for `pipeline_id`, if any
    #[must_use]
    pub fn pending(&self, pipeline_id: &str) -> Option<RemediationProposal> {
        self.gate.pending(pipeline_id)
    }

    #[inline]
    #[must_use]
    pub fn gate(&self) -> &ConsentGate {
        &self.gate
    }

    #[inline]
    #[must_use]
    pub fn orchestrator(&self) -> &RemediationOrchestrator {
        &self.orchestrator
    }
}
