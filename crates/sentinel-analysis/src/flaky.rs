//! Flaky run detection
//!
//! Groups history by `repository:branch` and scores each group's pass/fail
//! sequence for instability.
//!
//! Score components (clamped to 0..=100):
//! - 40 when the failure rate is within [0.1, 0.9]
//! - 30 when more than 60% of adjacent runs change status
//! - 20 when at least two failures sit between two successes
//! - 10 when no status repeats three or more times in a row

use sentinel_model::{PipelineRun, PipelineStatus, SentinelConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Score at or above which a group is reported flaky
pub const FLAKY_THRESHOLD: u32 = 40;

const ALTERNATION_THRESHOLD: f64 = 0.6;
const MIN_INTERMITTENT_FAILURES: usize = 2;
const STABLE_STREAK: usize = 3;

/// Instability pattern observed in a run sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlakyPattern {
    /// Failure rate is neither near zero nor near one
    MixedOutcomes,
    /// Status flips between most adjacent runs
    Alternating,
    /// Isolated failures surrounded by successes
    Intermittent,
    /// No long streak of identical statuses
    NoStableStreak,
}

impl FlakyPattern {
    #[must_use]
    pub const fn weight(self) -> u32 {
        match self {
            Self::MixedOutcomes => 40,
            Self::Alternating => 30,
            Self::Intermittent => 20,
            Self::NoStableStreak => 10,
        }
    }
}

/// Flakiness assessment for one repository/branch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlakyTestReport {
    pub repository: String,
    pub branch: String,
    pub total_runs: usize,
    pub failure_count: usize,
    pub failure_rate: f64,
    /// Fraction of adjacent run pairs whose status differs
    pub alternation_rate: f64,
    pub intermittent_failures: usize,
    pub longest_streak: usize,
    pub flakiness_score: u32,
    pub is_flaky: bool,
    pub confidence: f64,
    pub patterns: Vec<FlakyPattern>,
    pub recommendation: String,
}

/// Statistical flaky-run detector
#[derive(Debug, Clone, Copy)]
pub struct FlakyTestDetector {
    min_runs: usize,
}

impl FlakyTestDetector {
    /// Default minimum sample size per group
    pub const DEFAULT_MIN_RUNS: usize = 10;

    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_config(config: &SentinelConfig) -> Self {
        Self::new().with_min_runs(config.flaky.min_runs)
    }

    #[inline]
    #[must_use]
    pub fn with_min_runs(mut self, min_runs: usize) -> Self {
        self.min_runs = min_runs;
        self
    }

    #[inline]
    #[must_use]
    pub fn min_runs(&self) -> usize {
        self.min_runs
    }

    /// Analyze every qualifying group, most flaky first
    #[must_use]
    pub fn detect(&self, history: &[PipelineRun]) -> Vec<FlakyTestReport> {
        let mut groups: BTreeMap<(&str, &str), Vec<&PipelineRun>> = BTreeMap::new();
        for run in history {
            groups
                .entry((run.repository.as_str(), run.branch.as_str()))
                .or_default()
                .push(run);
        }

        let mut reports: Vec<FlakyTestReport> = groups
            .into_iter()
            .filter(|(key, runs)| {
                let enough = runs.len() >= self.min_runs;
                if !enough {
                    tracing::trace!(repository = key.0, branch = key.1, runs = runs.len(), "skipping sparse group");
                }
                enough
            })
            .map(|((repository, branch), mut runs)| {
                runs.sort_by_key(|run| run.started_at);
                let statuses: Vec<PipelineStatus> = runs.iter().map(|run| run.status).collect();
                score_sequence(repository, branch, &statuses)
            })
            .collect();

        reports.sort_by(|a, b| b.flakiness_score.cmp(&a.flakiness_score));
        reports
    }

    /// Analyze a single repository/branch, if it has enough runs
    #[must_use]
    pub fn detect_for(
        &self,
        repository: &str,
        branch: &str,
        history: &[PipelineRun],
    ) -> Option<FlakyTestReport> {
        let runs: Vec<PipelineRun> = history
            .iter()
            .filter(|run| run.repository == repository && run.branch == branch)
            .cloned()
            .collect();
        self.detect(&runs).into_iter().next()
    }
}

impl Default for FlakyTestDetector {
    fn default() -> Self {
        Self {
            min_runs: Self::DEFAULT_MIN_RUNS,
        }
    }
}

/// Score an ordered status sequence
#[must_use]
pub fn score_sequence(repository: &str, branch: &str, statuses: &[PipelineStatus]) -> FlakyTestReport {
    let total = statuses.len();
    let failure_count = statuses
        .iter()
        .filter(|s| **s == PipelineStatus::Failure)
        .count();
    let failure_rate = ratio(failure_count, total);

    let changes = statuses.windows(2).filter(|w| w[0] != w[1]).count();
    let alternation_rate = ratio(changes, total.saturating_sub(1));

    let intermittent_failures = statuses
        .windows(3)
        .filter(|w| {
            w[0] == PipelineStatus::Success
                && w[1] == PipelineStatus::Failure
                && w[2] == PipelineStatus::Success
        })
        .count();

    let longest_streak = longest_streak(statuses);

    let mut patterns = Vec::new();
    if (0.1..=0.9).contains(&failure_rate) {
        patterns.push(FlakyPattern::MixedOutcomes);
    }
    if alternation_rate > ALTERNATION_THRESHOLD {
        patterns.push(FlakyPattern::Alternating);
    }
    if intermittent_failures >= MIN_INTERMITTENT_FAILURES {
        patterns.push(FlakyPattern::Intermittent);
    }
    if longest_streak < STABLE_STREAK {
        patterns.push(FlakyPattern::NoStableStreak);
    }

    let flakiness_score = patterns.iter().map(|p| p.weight()).sum::<u32>().min(100);
    let is_flaky = flakiness_score >= FLAKY_THRESHOLD;
    let confidence =
        (sample_confidence(total) + f64::from(flakiness_score) / 100.0) / 2.0;

    FlakyTestReport {
        repository: repository.to_string(),
        branch: branch.to_string(),
        total_runs: total,
        failure_count,
        failure_rate,
        alternation_rate,
        intermittent_failures,
        longest_streak,
        flakiness_score,
        is_flaky,
        confidence: confidence.clamp(0.0, 1.0),
        patterns,
        recommendation: recommendation(flakiness_score, failure_rate).to_string(),
    }
}

/// Confidence contributed by sample size alone
#[must_use]
pub fn sample_confidence(runs: usize) -> f64 {
    match runs {
        n if n >= 50 => 0.95,
        n if n >= 30 => 0.85,
        n if n >= 20 => 0.75,
        n if n >= 10 => 0.65,
        _ => 0.50,
    }
}

fn recommendation(score: u32, failure_rate: f64) -> &'static str {
    if score >= 70 {
        "Highly unstable: quarantine the affected tests and investigate shared state, ordering and timing dependencies"
    } else if score >= FLAKY_THRESHOLD {
        "Likely flaky: enable automatic retry for this branch and track the failing tests"
    } else if failure_rate > 0.9 {
        "Consistently failing: this is a real breakage, not flakiness"
    } else {
        "Stable: no action needed"
    }
}

fn longest_streak(statuses: &[PipelineStatus]) -> usize {
    let mut longest = 0;
    let mut current = 0;
    let mut previous = None;
    for status in statuses {
        if previous == Some(status) {
            current += 1;
        } else {
            current = 1;
            previous = Some(status);
        }
        longest = longest.max(current);
    }
    longest
}

#[allow(clippy::cast_precision_loss)]
fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}
