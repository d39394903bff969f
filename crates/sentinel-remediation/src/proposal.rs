//! Remediation proposal generation
//!
//! Pure `category x pipeline -> proposal` mapping over fixed per-category
//! templates. Every generated action requires confirmation.

use crate::classifier::FailureCategory;
use sentinel_model::{ActionType, PipelineRef, PipelineRun, RemediationAction, RemediationProposal, Severity};

/// Reruns proposed for a transient failure
pub const TRANSIENT_RERUN_ATTEMPTS: u32 = 3;
/// Reruns proposed for a timeout
pub const TIMEOUT_RERUN_ATTEMPTS: u32 = 2;

/// Builds proposals from fixed templates
#[derive(Debug, Clone, Copy, Default)]
pub struct ProposalGenerator;

impl ProposalGenerator {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Generate the proposal for `category` targeting `pipeline`
    #[must_use]
    pub fn generate(&self, category: FailureCategory, pipeline: &PipelineRun) -> RemediationProposal {
        let target = pipeline.to_ref();
        match category {
            FailureCategory::Transient => {
                let actions = reruns(&target, TRANSIENT_RERUN_ATTEMPTS, |attempt| {
                    format!("Rerun pipeline (attempt {attempt} of {TRANSIENT_RERUN_ATTEMPTS})")
                });
                RemediationProposal::new(
                    target,
                    category.label(),
                    "Network or upstream service error detected; the failure is likely to clear on retry.",
                    actions,
                    Severity::Low,
                    0.85,
                    "2-5 minutes",
                )
            }
            FailureCategory::Timeout => {
                let actions = reruns(&target, TIMEOUT_RERUN_ATTEMPTS, |attempt| {
                    format!(
                        "Rerun pipeline with extended timeout (attempt {attempt} of {TIMEOUT_RERUN_ATTEMPTS})"
                    )
                })
                .into_iter()
                .map(|a| a.with_parameter("extended_timeout", "true"))
                .collect();
                RemediationProposal::new(
                    target,
                    category.label(),
                    "A step exceeded its time limit. Retrying may succeed; consider raising the job timeout.",
                    actions,
                    Severity::Medium,
                    0.60,
                    "5-15 minutes",
                )
            }
            FailureCategory::FlakyTest => {
                let action = RemediationAction::new(
                    ActionType::RerunPipeline,
                    target.clone(),
                    "Rerun pipeline to confirm flaky test",
                )
                .with_parameter("attempt", "1");
                RemediationProposal::new(
                    target,
                    category.label(),
                    "Intermittent test failure detected; a single rerun usually passes.",
                    vec![action],
                    Severity::Low,
                    0.70,
                    "1-3 minutes",
                )
            }
            FailureCategory::Deployment => {
                let action = RemediationAction::new(
                    ActionType::RollbackDeployment,
                    target.clone(),
                    format!("Roll back the latest deployment of {}", target.repository),
                );
                let warning = format!(
                    "Rollback reverts {} on {} to the previous release. Verify the previous release is healthy and that no irreversible migrations ran before approving.",
                    target.repository, target.branch
                );
                RemediationProposal::new(
                    target,
                    category.label(),
                    "The deployment or rollout step failed; production may be in a degraded state.",
                    vec![action],
                    Severity::Critical,
                    0.95,
                    "3-10 minutes",
                )
                .with_warning(warning)
            }
            FailureCategory::ResourceLimit => RemediationProposal::new(
                target,
                category.label(),
                "The runner ran out of memory or disk space. Retrying without changes will fail again.",
                Vec::new(),
                Severity::High,
                0.90,
                "manual intervention required",
            )
            .with_warning(
                "Increase the runner memory limit, free disk space or clear caches on build agents, or split the job into smaller stages.",
            ),
            FailureCategory::Permanent => RemediationProposal::new(
                target,
                category.label(),
                "Compilation or syntax error detected. The code must be fixed before the pipeline can pass.",
                Vec::new(),
                Severity::High,
                0.95,
                "requires code fix",
            ),
            FailureCategory::Unknown => {
                let action = RemediationAction::new(
                    ActionType::RerunPipeline,
                    target.clone(),
                    "Rerun pipeline once as a conservative first step",
                )
                .with_parameter("attempt", "1")
                .with_parameter("conservative", "true");
                RemediationProposal::new(
                    target,
                    category.label(),
                    "No known failure pattern matched the logs. A single rerun will show whether the failure reproduces.",
                    vec![action],
                    Severity::Medium,
                    0.50,
                    "2-5 minutes",
                )
            }
        }
    }
}

fn reruns(
    target: &PipelineRef,
    attempts: u32,
    describe: impl Fn(u32) -> String,
) -> Vec<RemediationAction> {
    (1..=attempts)
        .map(|attempt| {
            RemediationAction::new(ActionType::RerunPipeline, target.clone(), describe(attempt))
                .with_parameter("attempt", attempt.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_model::PipelineStatus;

    fn pipeline() -> PipelineRun {
        PipelineRun::new("p1", "svc-a", "main", PipelineStatus::Failure).with_build_number(7)
    }

    #[test]
    fn transient_template() {
        let p = ProposalGenerator::new().generate(FailureCategory::Transient, &pipeline());
        assert_eq!(p.actions().len(), 3);
        assert!(p.actions().iter().all(|a| a.action_type == ActionType::RerunPipeline));
        assert_eq!(p.severity(), Severity::Low);
        assert_eq!(p.confidence(), 0.85);
        let attempts: Vec<_> = p.actions().iter().filter_map(|a| a.parameter("attempt")).collect();
        assert_eq!(attempts, ["1", "2", "3"]);
    }

    #[test]
    fn timeout_template_notes_extended_timeout() {
        let p = ProposalGenerator::new().generate(FailureCategory::Timeout, &pipeline());
        assert_eq!(p.actions().len(), 2);
        assert!(p.actions().iter().all(|a| a.parameter("extended_timeout") == Some("true")));
        assert_eq!(p.severity(), Severity::Medium);
        assert_eq!(p.confidence(), 0.60);
    }

    #[test]
    fn deployment_template_is_critical_rollback_with_warning() {
        let p = ProposalGenerator::new().generate(FailureCategory::Deployment, &pipeline());
        assert_eq!(p.actions().len(), 1);
        assert_eq!(p.actions()[0].action_type, ActionType::RollbackDeployment);
        assert_eq!(p.severity(), Severity::Critical);
        assert_eq!(p.confidence(), 0.95);
        assert!(p.warning().is_some());
    }

    #[test]
    fn manual_only_templates() {
        let generator = ProposalGenerator::new();

        let resource = generator.generate(FailureCategory::ResourceLimit, &pipeline());
        assert!(resource.is_manual_only());
        assert_eq!(resource.severity(), Severity::High);
        assert_eq!(resource.confidence(), 0.90);
        assert_eq!(resource.estimated_time(), "manual intervention required");
        assert!(resource.warning().unwrap().contains("memory"));

        let permanent = generator.generate(FailureCategory::Permanent, &pipeline());
        assert!(permanent.is_manual_only());
        assert_eq!(permanent.confidence(), 0.95);
        assert_eq!(permanent.estimated_time(), "requires code fix");
    }

    #[test]
    fn unknown_and_flaky_templates() {
        let generator = ProposalGenerator::new();
        let unknown = generator.generate(FailureCategory::Unknown, &pipeline());
        assert_eq!(unknown.actions().len(), 1);
        assert_eq!(unknown.confidence(), 0.50);
        assert_eq!(unknown.severity(), Severity::Medium);

        let flaky = generator.generate(FailureCategory::FlakyTest, &pipeline());
        assert_eq!(flaky.actions().len(), 1);
        assert_eq!(flaky.confidence(), 0.70);
        assert_eq!(flaky.estimated_time(), "1-3 minutes");
    }

    #[test]
    fn every_generated_action_requires_confirmation() {
        let generator = ProposalGenerator::new();
        for category in FailureCategory::all() {
            let p = generator.generate(*category, &pipeline());
            assert_eq!(p.pipeline_id(), "p1");
            assert_eq!(p.failure_type(), category.label());
            assert!(p.actions().iter().all(|a| a.requires_confirmation));
            assert!(p.actions().iter().all(|a| a.target.id == "p1"));
        }
    }
}
