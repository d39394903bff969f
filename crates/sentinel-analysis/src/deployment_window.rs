//! Deployment window advice from historical success rates
//!
//! Runs are bucketed by UTC hour-of-day and by weekday. A window is a
//! (weekday, hour) pair whose two buckets both clear the optimal thresholds,
//! or both fall under the risky ones.

use chrono::{DateTime, Datelike, Duration, DurationRound, Timelike, Utc, Weekday};
use sentinel_model::{PipelineRun, PipelineStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const OPTIMAL_DAY_RATE: f64 = 85.0;
const OPTIMAL_DAY_MIN_RUNS: usize = 10;
const OPTIMAL_HOUR_RATE: f64 = 90.0;
const OPTIMAL_HOUR_MIN_RUNS: usize = 5;

const RISKY_DAY_RATE: f64 = 75.0;
const RISKY_DAY_MIN_RUNS: usize = 5;
const RISKY_HOUR_RATE: f64 = 70.0;
const RISKY_HOUR_MIN_RUNS: usize = 3;

/// Confidence above which deploys outside any known window are allowed
const HIGH_CONFIDENCE: f64 = 0.7;

const HOURS_PER_WEEK: i64 = 7 * 24;

/// Outcome counts for one bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BucketStats {
    pub total: usize,
    pub failures: usize,
}

impl BucketStats {
    fn record(&mut self, status: PipelineStatus) {
        self.total += 1;
        if status == PipelineStatus::Failure {
            self.failures += 1;
        }
    }

    /// Percentage of non-failed runs, 0 when empty
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.total - self.failures) as f64 / self.total as f64 * 100.0
    }
}

/// A recurring weekly hour slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentWindow {
    pub day: Weekday,
    /// UTC hour, 0..=23
    pub hour: u32,
    /// Mean of the day and hour success rates
    pub score: f64,
    pub day_success_rate: f64,
    pub hour_success_rate: f64,
}

impl DeploymentWindow {
    #[inline]
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at.weekday() == self.day && at.hour() == self.hour
    }
}

/// Why a deploy was allowed or denied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionBasis {
    RiskyWindow,
    OptimalWindow,
    HighConfidence,
    /// No pattern matched; allowed without supporting data
    DefaultAllow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentDecision {
    pub allowed: bool,
    pub basis: DecisionBasis,
    pub reason: String,
}

/// Deployment timing advice for one repository/branch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentRecommendation {
    pub repository: String,
    pub branch: String,
    pub total_runs: usize,
    pub overall_success_rate: f64,
    pub confidence: f64,
    /// Best first
    pub optimal_windows: Vec<DeploymentWindow>,
    /// Worst first
    pub risky_windows: Vec<DeploymentWindow>,
}

impl DeploymentRecommendation {
    /// Whether deploying at `now` is advised
    ///
    /// Risky windows deny, optimal windows allow, high confidence allows.
    /// Anything else is allowed by default.
    #[must_use]
    pub fn should_deploy_at(&self, now: DateTime<Utc>) -> DeploymentDecision {
        if let Some(window) = self.risky_windows.iter().find(|w| w.contains(now)) {
            return DeploymentDecision {
                allowed: false,
                basis: DecisionBasis::RiskyWindow,
                reason: format!(
                    "{} {:02}:00 UTC is historically risky ({:.0}% success)",
                    window.day, window.hour, window.score
                ),
            };
        }
        if let Some(window) = self.optimal_windows.iter().find(|w| w.contains(now)) {
            return DeploymentDecision {
                allowed: true,
                basis: DecisionBasis::OptimalWindow,
                reason: format!(
                    "{} {:02}:00 UTC is an optimal window ({:.0}% success)",
                    window.day, window.hour, window.score
                ),
            };
        }
        if self.confidence > HIGH_CONFIDENCE {
            return DeploymentDecision {
                allowed: true,
                basis: DecisionBasis::HighConfidence,
                reason: format!(
                    "no risky pattern at this time across {} runs ({:.0}% overall success)",
                    self.total_runs, self.overall_success_rate
                ),
            };
        }

        // TODO: decide whether low-confidence data should require manual approval instead
        tracing::warn!(
            repository = %self.repository,
            branch = %self.branch,
            confidence = self.confidence,
            "deployment allowed without supporting history"
        );
        DeploymentDecision {
            allowed: true,
            basis: DecisionBasis::DefaultAllow,
            reason: "not enough history to judge; allowed by default".to_string(),
        }
    }

    /// Start of the next optimal window at or after `now`, within a week
    #[must_use]
    pub fn next_optimal_window(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.optimal_windows.is_empty() {
            return None;
        }
        if self.optimal_windows.iter().any(|w| w.contains(now)) {
            return Some(now);
        }
        let hour_start = now.duration_trunc(Duration::hours(1)).ok()?;
        (1..=HOURS_PER_WEEK)
            .map(|h| hour_start + Duration::hours(h))
            .find(|at| self.optimal_windows.iter().any(|w| w.contains(*at)))
    }
}

/// Mines run history for deployment timing patterns
#[derive(Debug, Clone, Copy, Default)]
pub struct DeploymentWindowAdvisor;

impl DeploymentWindowAdvisor {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Analyze the runs of `repository`/`branch` within `history`
    #[must_use]
    pub fn analyze(&self, repository: &str, branch: &str, history: &[PipelineRun]) -> DeploymentRecommendation {
        let mut hours: BTreeMap<u32, BucketStats> = BTreeMap::new();
        let mut days: BTreeMap<u32, (Weekday, BucketStats)> = BTreeMap::new();
        let mut overall = BucketStats::default();

        for run in history
            .iter()
            .filter(|run| run.repository == repository && run.branch == branch)
        {
            let Some(started_at) = run.started_at else {
                continue;
            };
            overall.record(run.status);
            hours.entry(started_at.hour()).or_default().record(run.status);
            let day = started_at.weekday();
            days.entry(day.num_days_from_monday())
                .or_insert_with(|| (day, BucketStats::default()))
                .1
                .record(run.status);
        }

        let mut optimal_windows = Vec::new();
        let mut risky_windows = Vec::new();
        for (day, day_stats) in days.values() {
            for (hour, hour_stats) in &hours {
                let window = || DeploymentWindow {
                    day: *day,
                    hour: *hour,
                    score: (day_stats.success_rate() + hour_stats.success_rate()) / 2.0,
                    day_success_rate: day_stats.success_rate(),
                    hour_success_rate: hour_stats.success_rate(),
                };
                if is_optimal(day_stats, hour_stats) {
                    optimal_windows.push(window());
                } else if is_risky(day_stats, hour_stats) {
                    risky_windows.push(window());
                }
            }
        }
        optimal_windows.sort_by(|a, b| b.score.total_cmp(&a.score));
        risky_windows.sort_by(|a, b| a.score.total_cmp(&b.score));

        let confidence = sample_confidence(overall.total);
        tracing::debug!(
            repository,
            branch,
            runs = overall.total,
            optimal = optimal_windows.len(),
            risky = risky_windows.len(),
            confidence,
            "deployment windows computed"
        );

        DeploymentRecommendation {
            repository: repository.to_string(),
            branch: branch.to_string(),
            total_runs: overall.total,
            overall_success_rate: overall.success_rate(),
            confidence,
            optimal_windows,
            risky_windows,
        }
    }
}

fn is_optimal(day: &BucketStats, hour: &BucketStats) -> bool {
    day.success_rate() >= OPTIMAL_DAY_RATE
        && day.total >= OPTIMAL_DAY_MIN_RUNS
        && hour.success_rate() >= OPTIMAL_HOUR_RATE
        && hour.total >= OPTIMAL_HOUR_MIN_RUNS
}

fn is_risky(day: &BucketStats, hour: &BucketStats) -> bool {
    day.success_rate() < RISKY_DAY_RATE
        && day.total >= RISKY_DAY_MIN_RUNS
        && hour.success_rate() < RISKY_HOUR_RATE
        && hour.total >= RISKY_HOUR_MIN_RUNS
}

/// Confidence from total sample size
#[must_use]
pub fn sample_confidence(runs: usize) -> f64 {
    match runs {
        n if n >= 100 => 0.95,
        n if n >= 50 => 0.85,
        n if n >= 25 => 0.70,
        n if n >= 10 => 0.55,
        _ => 0.40,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_test_utils::{reference_time, run_started_at};

    /// `n` weekly runs at the reference slot (Monday 10:00), failing every `fail_every`th
    fn weekly(prefix: &str, n: usize, hour_offset: i64, fail_every: usize) -> Vec<PipelineRun> {
        (0..n)
            .map(|i| {
                let status = if fail_every > 0 && i % fail_every == 0 {
                    PipelineStatus::Failure
                } else {
                    PipelineStatus::Success
                };
                let at = reference_time()
                    + Duration::weeks(i64::try_from(i).unwrap())
                    + Duration::hours(hour_offset);
                run_started_at(&format!("{prefix}{i}"), "svc", "main", status, at)
            })
            .collect()
    }

    #[test]
    fn empty_history_is_low_confidence() {
        let rec = DeploymentWindowAdvisor::new().analyze("svc", "main", &[]);
        assert!(rec.confidence <= 0.4);
        assert!(rec.optimal_windows.is_empty());
        assert!(rec.risky_windows.is_empty());
        assert_eq!(rec.total_runs, 0);
    }

    #[test]
    fn optimal_window_found() {
        let history = weekly("r", 12, 0, 0);
        let rec = DeploymentWindowAdvisor::new().analyze("svc", "main", &history);
        assert_eq!(rec.optimal_windows.len(), 1);
        let window = &rec.optimal_windows[0];
        assert_eq!(window.day, Weekday::Mon);
        assert_eq!(window.hour, 10);
        assert_eq!(window.score, 100.0);
        assert_eq!(rec.confidence, 0.55);

        let decision = rec.should_deploy_at(reference_time());
        assert!(decision.allowed);
        assert_eq!(decision.basis, DecisionBasis::OptimalWindow);
    }

    #[test]
    fn risky_window_denies() {
        // Monday 10:00, half failing
        let history = weekly("r", 8, 0, 2);
        let rec = DeploymentWindowAdvisor::new().analyze("svc", "main", &history);
        assert_eq!(rec.risky_windows.len(), 1);
        let decision = rec.should_deploy_at(reference_time() + Duration::minutes(30));
        assert!(!decision.allowed);
        assert_eq!(decision.basis, DecisionBasis::RiskyWindow);
    }

    #[test]
    fn sparse_history_defaults_to_allow() {
        let history = weekly("r", 3, 0, 0);
        let rec = DeploymentWindowAdvisor::new().analyze("svc", "main", &history);
        let decision = rec.should_deploy_at(reference_time() + Duration::hours(5));
        assert!(decision.allowed);
        assert_eq!(decision.basis, DecisionBasis::DefaultAllow);
    }

    #[test]
    fn high_confidence_allows_outside_windows() {
        let mut history = weekly("a", 15, 0, 0);
        history.extend(weekly("b", 15, 1, 0));
        let rec = DeploymentWindowAdvisor::new().analyze("svc", "main", &history);
        assert_eq!(rec.confidence, 0.70);
        // exactly 0.7 is not above the threshold
        let decision = rec.should_deploy_at(reference_time() + Duration::hours(6));
        assert_eq!(decision.basis, DecisionBasis::DefaultAllow);

        history.extend(weekly("c", 20, 2, 0));
        let rec = DeploymentWindowAdvisor::new().analyze("svc", "main", &history);
        let decision = rec.should_deploy_at(reference_time() + Duration::hours(6));
        assert_eq!(decision.basis, DecisionBasis::HighConfidence);
    }

    #[test]
    fn other_branches_and_unstarted_runs_ignored() {
        let mut history = weekly("r", 12, 0, 0);
        history.push(run_started_at("x", "svc", "dev", PipelineStatus::Failure, reference_time()));
        history.push(PipelineRun::new("y", "svc", "main", PipelineStatus::Failure));
        let rec = DeploymentWindowAdvisor::new().analyze("svc", "main", &history);
        assert_eq!(rec.total_runs, 12);
        assert_eq!(rec.overall_success_rate, 100.0);
    }

    #[test]
    fn next_optimal_window_wraps_the_week() {
        let rec = DeploymentWindowAdvisor::new().analyze("svc", "main", &weekly("r", 12, 0, 0));
        assert_eq!(rec.next_optimal_window(reference_time()), Some(reference_time()));

        let tuesday = reference_time() + Duration::days(1) + Duration::minutes(17);
        assert_eq!(
            rec.next_optimal_window(tuesday),
            Some(reference_time() + Duration::weeks(1))
        );

        let empty = DeploymentWindowAdvisor::new().analyze("svc", "main", &[]);
        assert_eq!(empty.next_optimal_window(reference_time()), None);
    }

    #[test]
    fn confidence_tiers() {
        assert_eq!(sample_confidence(150), 0.95);
        assert_eq!(sample_confidence(50), 0.85);
        assert_eq!(sample_confidence(25), 0.70);
        assert_eq!(sample_confidence(10), 0.55);
        assert_eq!(sample_confidence(9), 0.40);
    }
}
