//! Cascade risk: downstream blast radius of a failure
//!
//! Downstream pipelines are runs of the same repository that started after
//! the failed run and are still running.

use crate::narrative::narrate;
use sentinel_model::{NarrativeGenerator, PipelineRun, PipelineStatus, SentinelConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Branches whose downstream exposure is always critical
const PROTECTED_BRANCHES: &[&str] = &["main", "master"];

/// Downstream risk tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Fixed recommendation list for this tier
    #[must_use]
    pub fn recommendations(self) -> &'static [&'static str] {
        match self {
            Self::Critical => &[
                "Cancel running downstream pipelines to stop the failure spreading",
                "Block deployments from the affected repository until the failure is resolved",
                "Notify team leads and the on-call engineer",
                "Prepare a rollback of the last known good release",
            ],
            Self::High => &[
                "Cancel non-essential downstream pipelines",
                "Pause scheduled deployments for this repository",
                "Notify the owning team",
            ],
            Self::Medium => &[
                "Monitor downstream pipelines for related failures",
                "Notify the commit author",
            ],
            Self::Low => &["Monitor the downstream pipeline for related failures"],
            Self::None => &["No downstream impact detected; no action needed"],
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Downstream impact of one failed run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CascadeRisk {
    pub failed_pipeline_id: String,
    pub repository: String,
    pub risk_level: RiskLevel,
    pub affected_count: usize,
    pub affected_pipelines: Vec<String>,
    pub estimated_impact_minutes: u64,
    pub recommendations: Vec<String>,
}

impl CascadeRisk {
    /// Prose summary for tiers above `None`
    ///
    /// Uses `generator` when it answers, otherwise the keyword fallback text.
    pub async fn narrative(&self, generator: Option<&dyn NarrativeGenerator>) -> Option<String> {
        if self.risk_level == RiskLevel::None {
            return None;
        }
        let mut prompt = format!(
            "Summarize the cascade risk for pipeline {} in {}: {} risk, {} downstream pipelines, about {} minutes of impact.",
            self.failed_pipeline_id,
            self.repository,
            self.risk_level,
            self.affected_count,
            self.estimated_impact_minutes
        );
        for id in self.affected_pipelines.iter().take(5) {
            prompt.push_str(&format!("\n- {id}"));
        }
        Some(narrate(generator, &prompt).await)
    }
}

/// Estimates downstream impact of a failure
#[derive(Debug, Clone, Copy)]
pub struct CascadeRiskAnalyzer {
    default_duration: Duration,
}

impl CascadeRiskAnalyzer {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Analyzer using the configured default duration
    #[must_use]
    pub fn from_config(config: &SentinelConfig) -> Self {
        Self::new().with_default_duration(Duration::from_secs(
            config.cascade.default_duration_minutes.saturating_mul(60),
        ))
    }

    /// Duration assumed for downstream runs that report none
    #[inline]
    #[must_use]
    pub fn with_default_duration(mut self, duration: Duration) -> Self {
        self.default_duration = duration;
        self
    }

    /// Compute cascade risk for `failed` over `history`
    #[must_use]
    pub fn analyze(&self, failed: &PipelineRun, history: &[PipelineRun]) -> CascadeRisk {
        let downstream: Vec<&PipelineRun> = history
            .iter()
            .filter(|run| is_downstream_of(run, failed))
            .collect();

        let risk_level = if downstream
            .iter()
            .any(|run| PROTECTED_BRANCHES.contains(&run.branch.as_str()))
        {
            RiskLevel::Critical
        } else {
            match downstream.len() {
                n if n > 5 => RiskLevel::High,
                n if n > 2 => RiskLevel::Medium,
                n if n > 0 => RiskLevel::Low,
                _ => RiskLevel::None,
            }
        };

        let default_ms = u64::try_from(self.default_duration.as_millis()).unwrap_or(u64::MAX);
        let total_ms = downstream
            .iter()
            .map(|run| run.duration_ms.unwrap_or(default_ms))
            .fold(0u64, u64::saturating_add);

        tracing::debug!(
            pipeline_id = %failed.id,
            downstream = downstream.len(),
            risk = %risk_level,
            "cascade risk computed"
        );

        CascadeRisk {
            failed_pipeline_id: failed.id.clone(),
            repository: failed.repository.clone(),
            risk_level,
            affected_count: downstream.len(),
            affected_pipelines: downstream.iter().map(|run| run.id.clone()).collect(),
            estimated_impact_minutes: total_ms / 60_000,
            recommendations: risk_level
                .recommendations()
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }
}

impl Default for CascadeRiskAnalyzer {
    fn default() -> Self {
        Self {
            default_duration: Duration::from_secs(5 * 60),
        }
    }
}

fn is_downstream_of(run: &PipelineRun, failed: &PipelineRun) -> bool {
    if run.id == failed.id
        || run.repository != failed.repository
        || run.status != PipelineStatus::Running
    {
        return false;
    }
    match (run.started_at, failed.started_at) {
        (Some(started), Some(failed_started)) => started > failed_started,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use crate::narrative::fallback_for;
    use sentinel_test_utils::{reference_time, run_started_at, ScriptedNarrator};

    fn failed() -> PipelineRun {
        run_started_at("f", "svc", "feature", PipelineStatus::Failure, reference_time())
    }

    fn running(id: &str, branch: &str, minutes_after: i64) -> PipelineRun {
        run_started_at(
            id,
            "svc",
            branch,
            PipelineStatus::Running,
            reference_time() + ChronoDuration::minutes(minutes_after),
        )
    }

    #[test]
    fn no_downstream_is_none() {
        let history = vec![
            failed(),
            // different repo
            run_started_at("x", "other", "dev", PipelineStatus::Running, reference_time() + ChronoDuration::minutes(1)),
            // started earlier
            running("early", "dev", -5),
            // finished
            run_started_at("done", "svc", "dev", PipelineStatus::Success, reference_time() + ChronoDuration::minutes(2)),
        ];
        let risk = CascadeRiskAnalyzer::new().analyze(&failed(), &history);
        assert_eq!(risk.risk_level, RiskLevel::None);
        assert_eq!(risk.affected_count, 0);
        assert_eq!(risk.estimated_impact_minutes, 0);
        assert_eq!(risk.recommendations.len(), 1);
    }

    #[test]
    fn count_tiers() {
        let analyzer = CascadeRiskAnalyzer::new();
        let make = |n: usize| -> Vec<PipelineRun> {
            (0..n)
                .map(|i| running(&format!("d{i}"), "dev", i64::try_from(i).unwrap() + 1))
                .collect()
        };
        assert_eq!(analyzer.analyze(&failed(), &make(1)).risk_level, RiskLevel::Low);
        assert_eq!(analyzer.analyze(&failed(), &make(2)).risk_level, RiskLevel::Low);
        assert_eq!(analyzer.analyze(&failed(), &make(3)).risk_level, RiskLevel::Medium);
        assert_eq!(analyzer.analyze(&failed(), &make(5)).risk_level, RiskLevel::Medium);
        assert_eq!(analyzer.analyze(&failed(), &make(6)).risk_level, RiskLevel::High);
    }

    #[test]
    fn protected_branch_is_critical_regardless_of_count() {
        let history = vec![running("m", "master", 3)];
        let risk = CascadeRiskAnalyzer::new().analyze(&failed(), &history);
        assert_eq!(risk.risk_level, RiskLevel::Critical);
        assert_eq!(risk.recommendations.len(), 4);
        assert_eq!(risk.affected_pipelines, vec!["m".to_string()]);
    }

    #[test]
    fn impact_uses_durations_with_default() {
        let history = vec![
            running("a", "dev", 1).with_duration(Duration::from_secs(12 * 60)),
            running("b", "dev", 2),
        ];
        let risk = CascadeRiskAnalyzer::new().analyze(&failed(), &history);
        assert_eq!(risk.estimated_impact_minutes, 17);

        let risk = CascadeRiskAnalyzer::new()
            .with_default_duration(Duration::from_secs(60))
            .analyze(&failed(), &history);
        assert_eq!(risk.estimated_impact_minutes, 13);
    }

    #[test]
    fn configured_default_duration() {
        let config = SentinelConfig::default().with_default_duration_minutes(2);
        let risk = CascadeRiskAnalyzer::from_config(&config).analyze(&failed(), &[running("a", "dev", 1)]);
        assert_eq!(risk.estimated_impact_minutes, 2);
    }

    #[test]
    fn failed_run_without_start_time_has_no_downstream() {
        let failed = PipelineRun::new("f", "svc", "dev", PipelineStatus::Failure);
        let risk = CascadeRiskAnalyzer::new().analyze(&failed, &[running("a", "main", 1)]);
        assert_eq!(risk.risk_level, RiskLevel::None);
    }

    #[tokio::test]
    async fn narrative_only_above_none() {
        let quiet = CascadeRiskAnalyzer::new().analyze(&failed(), &[]);
        assert_eq!(quiet.narrative(None).await, None);

        let risky = CascadeRiskAnalyzer::new().analyze(&failed(), &[running("m", "main", 1)]);
        let text = risky.narrative(None).await.unwrap();
        assert_eq!(text, fallback_for("risk"));
        assert!(text.starts_with("Elevated risk"));
    }

    #[tokio::test]
    async fn narrative_prefers_generator_output() {
        let risky = CascadeRiskAnalyzer::new().analyze(&failed(), &[running("d", "dev", 1)]);
        let narrator = ScriptedNarrator::Reply("one downstream run exposed".into());
        assert_eq!(
            risky.narrative(Some(&narrator)).await.as_deref(),
            Some("one downstream run exposed")
        );
        assert_eq!(
            risky.narrative(Some(&ScriptedNarrator::Fail)).await.as_deref(),
            Some(fallback_for("risk"))
        );
    }
}
