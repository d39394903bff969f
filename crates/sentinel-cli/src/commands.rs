//! Subcommand implementations
//!
//! Each command returns a serializable report; `main` prints it as JSON or
//! as the report's human summary.

use crate::dry_run::DryRunExecutor;
use crate::snapshot::Snapshot;
use anyhow::Result;
use chrono::{DateTime, Utc};
use sentinel_analysis::{
    CascadeRisk, CascadeRiskAnalyzer, ChangelogAnalysis, ChangelogCorrelationAnalyzer,
    DeploymentDecision, DeploymentRecommendation, DeploymentWindowAdvisor, FlakyTestDetector,
    FlakyTestReport,
};
use sentinel_model::{RemediationProposal, RemediationResult, SentinelConfig};
use sentinel_remediation::{FailureCategory, RemediationEngine, RemediationJobQueue};
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::Arc;

/// Human-readable rendering of a report
pub trait Summary {
    fn summary(&self) -> String;
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassifyReport {
    pub pipeline_id: String,
    pub category: FailureCategory,
    pub label: String,
}

impl Summary for ClassifyReport {
    fn summary(&self) -> String {
        format!("{}: {}", self.pipeline_id, self.label)
    }
}

/// Classify the logs of one run
///
/// # Errors
/// When the pipeline is not in the snapshot.
pub fn classify(snapshot: &Snapshot, pipeline_id: &str) -> Result<ClassifyReport> {
    let run = snapshot.run(pipeline_id)?;
    let logs = snapshot.logs.get(&run.id).map_or("", String::as_str);
    let category = sentinel_remediation::classify(logs);
    Ok(ClassifyReport {
        pipeline_id: run.id.clone(),
        category,
        label: category.label().to_string(),
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct ProposeReport {
    pub pipeline_id: String,
    pub proposal: Option<RemediationProposal>,
    /// Present when a consent decision was given
    pub result: Option<RemediationResult>,
}

impl Summary for ProposeReport {
    fn summary(&self) -> String {
        let mut out = String::new();
        match &self.proposal {
            None => {
                let _ = writeln!(out, "{}: no remediation proposed", self.pipeline_id);
            }
            Some(proposal) => {
                let _ = writeln!(
                    out,
                    "{}: {} (severity {}, confidence {:.2}, est. {})",
                    self.pipeline_id,
                    proposal.failure_type(),
                    proposal.severity(),
                    proposal.confidence(),
                    proposal.estimated_time()
                );
                let _ = writeln!(out, "  {}", proposal.reason());
                if let Some(warning) = proposal.warning() {
                    let _ = writeln!(out, "  warning: {warning}");
                }
                for (i, action) in proposal.actions().iter().enumerate() {
                    let _ = writeln!(out, "  {}. {} - {}", i + 1, action.action_type, action.description);
                }
            }
        }
        if let Some(result) = &self.result {
            let _ = writeln!(out, "result: {}", result.message);
        }
        out.trim_end().to_string()
    }
}

/// Propose remediation for one run, optionally deciding consent
///
/// Approved actions go through a dry-run executor on the background job
/// queue, so backoff delays are real.
///
/// # Errors
/// When the pipeline is not in the snapshot or the job queue fails.
pub async fn propose(
    config: &SentinelConfig,
    snapshot: &Snapshot,
    pipeline_id: &str,
    decision: Option<bool>,
) -> Result<ProposeReport> {
    let run = snapshot.run(pipeline_id)?.clone();
    let engine = Arc::new(RemediationEngine::new(
        config,
        Arc::new(snapshot.to_store()),
        Arc::new(DryRunExecutor),
    ));

    let proposal = engine.evaluate_and_propose(&run).await;
    let result = match (decision, proposal.is_some()) {
        (Some(approved), true) => {
            let queue = RemediationJobQueue::from_config(Arc::clone(&engine), &config.jobs);
            let ticket = queue.submit(run.id.clone(), approved).await?;
            let result = ticket.wait().await?;
            queue.shutdown().await;
            Some(result)
        }
        _ => None,
    };

    Ok(ProposeReport {
        pipeline_id: run.id,
        proposal,
        result,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct CascadeReport {
    #[serde(flatten)]
    pub risk: CascadeRisk,
    /// Prose summary; absent when nothing downstream is exposed
    pub narrative: Option<String>,
}

impl Summary for CascadeReport {
    fn summary(&self) -> String {
        let risk = &self.risk;
        let mut out = format!(
            "{} ({}): {} risk, {} downstream, ~{} min impact",
            risk.failed_pipeline_id,
            risk.repository,
            risk.risk_level,
            risk.affected_count,
            risk.estimated_impact_minutes
        );
        if let Some(narrative) = &self.narrative {
            let _ = write!(out, "\n  {narrative}");
        }
        for rec in &risk.recommendations {
            let _ = write!(out, "\n  - {rec}");
        }
        out
    }
}

/// Cascade risk of one failed run
///
/// No narrative generator is configured for the CLI, so the prose comes from
/// the keyword fallback table.
///
/// # Errors
/// When the pipeline is not in the snapshot.
pub async fn cascade(
    config: &SentinelConfig,
    snapshot: &Snapshot,
    pipeline_id: &str,
) -> Result<CascadeReport> {
    let run = snapshot.run(pipeline_id)?;
    let risk = CascadeRiskAnalyzer::from_config(config).analyze(run, &snapshot.runs);
    let narrative = risk.narrative(None).await;
    Ok(CascadeReport { risk, narrative })
}

impl Summary for Vec<FlakyTestReport> {
    fn summary(&self) -> String {
        if self.is_empty() {
            return "no branch has enough runs to assess".to_string();
        }
        self.iter()
            .map(|r| {
                format!(
                    "{}:{} score {} {} ({} runs, {:.0}% failing) - {}",
                    r.repository,
                    r.branch,
                    r.flakiness_score,
                    if r.is_flaky { "FLAKY" } else { "stable" },
                    r.total_runs,
                    r.failure_rate * 100.0,
                    r.recommendation
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Flaky detection across the snapshot
#[must_use]
pub fn flaky(config: &SentinelConfig, snapshot: &Snapshot) -> Vec<FlakyTestReport> {
    FlakyTestDetector::from_config(config).detect(&snapshot.runs)
}

impl Summary for ChangelogAnalysis {
    fn summary(&self) -> String {
        let mut out = format!(
            "{}: {} of {} commits suspicious (confidence {:.2})\n{}\nrecommendation: {}",
            self.pipeline_id,
            self.suspicious_commits.len(),
            self.analyzed_commits,
            self.confidence,
            self.analysis,
            self.recommendation
        );
        for commit in &self.suspicious_commits {
            let _ = write!(out, "\n  {} [{}] {}", commit.sha, commit.suspicion_score, commit.message);
        }
        out
    }
}

/// Changelog correlation for one run
///
/// # Errors
/// When the pipeline is not in the snapshot.
pub fn changelog(snapshot: &Snapshot, pipeline_id: &str) -> Result<ChangelogAnalysis> {
    let run = snapshot.run(pipeline_id)?;
    Ok(ChangelogCorrelationAnalyzer::new().analyze(run, snapshot.commits_for(pipeline_id)))
}

#[derive(Debug, Clone, Serialize)]
pub struct WindowReport {
    pub at: DateTime<Utc>,
    pub recommendation: DeploymentRecommendation,
    pub decision: DeploymentDecision,
    pub next_optimal_window: Option<DateTime<Utc>>,
}

impl Summary for WindowReport {
    fn summary(&self) -> String {
        let rec = &self.recommendation;
        let mut out = format!(
            "{}:{} at {}: {} ({})\n{} runs, {:.0}% success, confidence {:.2}",
            rec.repository,
            rec.branch,
            self.at.format("%a %H:%M UTC"),
            if self.decision.allowed { "deploy" } else { "hold" },
            self.decision.reason,
            rec.total_runs,
            rec.overall_success_rate,
            rec.confidence
        );
        if let Some(next) = self.next_optimal_window {
            let _ = write!(out, "\nnext optimal window: {}", next.format("%a %Y-%m-%d %H:00 UTC"));
        }
        out
    }
}

/// Deployment advice for a repository/branch at `at`
#[must_use]
pub fn window(snapshot: &Snapshot, repository: &str, branch: &str, at: DateTime<Utc>) -> WindowReport {
    let recommendation = DeploymentWindowAdvisor::new().analyze(repository, branch, &snapshot.runs);
    WindowReport {
        at,
        decision: recommendation.should_deploy_at(at),
        next_optimal_window: recommendation.next_optimal_window(at),
        recommendation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_test_utils::{failed_run, reference_time};

    fn snapshot() -> Snapshot {
        let mut snapshot = Snapshot::default();
        snapshot.runs.push(failed_run("P1", "svc-a", "main").with_started_at(reference_time()));
        snapshot.logs.insert("P1".into(), "Rollout failed for replica set".into());
        snapshot
    }

    #[test]
    fn classify_uses_snapshot_logs() {
        let report = classify(&snapshot(), "P1").unwrap();
        assert_eq!(report.category, FailureCategory::Deployment);
        assert!(classify(&snapshot(), "nope").is_err());
    }

    #[tokio::test]
    async fn propose_without_decision_leaves_result_empty() {
        let report = propose(&SentinelConfig::default(), &snapshot(), "P1", None).await.unwrap();
        assert!(report.proposal.is_some());
        assert!(report.result.is_none());
        assert!(report.summary().contains("Deployment Failure"));
    }

    #[tokio::test]
    async fn declined_proposal_reports_decline() {
        let report = propose(&SentinelConfig::default(), &snapshot(), "P1", Some(false))
            .await
            .unwrap();
        let result = report.result.unwrap();
        assert!(!result.success);
        assert_eq!(result.message, sentinel_remediation::DECLINED_MESSAGE);
    }

    #[tokio::test]
    async fn approved_rollback_runs_dry() {
        let report = propose(&SentinelConfig::default(), &snapshot(), "P1", Some(true))
            .await
            .unwrap();
        let result = report.result.unwrap();
        assert!(result.success);
        assert_eq!(result.results.len(), 1);
    }

    #[test]
    fn window_on_sparse_history_allows() {
        let report = window(&snapshot(), "svc-a", "main", reference_time());
        assert!(report.decision.allowed);
        assert!(report.next_optimal_window.is_none());
    }

    #[test]
    fn flaky_empty_summary() {
        let reports = flaky(&SentinelConfig::default(), &snapshot());
        assert!(reports.summary().contains("enough runs"));
    }

    #[tokio::test]
    async fn cascade_of_lone_failure() {
        let report = cascade(&SentinelConfig::default(), &snapshot(), "P1").await.unwrap();
        assert_eq!(report.risk.affected_count, 0);
        assert!(report.narrative.is_none());
    }
}
