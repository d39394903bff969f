//! Changelog correlation: which recent commit most likely broke the build
//!
//! Each candidate commit collects suspicion points from its size, its
//! distance to the failed run's start, message keywords and the kinds of
//! files it touched. Scores are clamped to 0..=100.

use crate::narrative::narrate_or;
use chrono::{DateTime, Duration, Utc};
use sentinel_model::{Commit, NarrativeGenerator, PipelineRun};
use serde::{Deserialize, Serialize};

/// Score at or above which a commit is reported suspicious
pub const SUSPICION_THRESHOLD: u32 = 30;

/// Confidence when suspicious commits exist but none is singled out
pub const UNRESOLVED_CONFIDENCE: f64 = 0.3;

const LARGE_FILE_COUNT: usize = 10;
const LARGE_LINE_COUNT: u64 = 500;
const REASONS_FOR_FULL_CONFIDENCE: f64 = 5.0;

/// Message keywords and their point adjustments, checked on lowercased text
const MESSAGE_KEYWORDS: &[(&str, i32)] = &[
    ("refactor", 10),
    ("experimental", 20),
    ("wip", 25),
    ("fix", -5),
    ("typo", -10),
];

const CONFIG_EXTENSIONS: &[&str] = &[".yml", ".yaml", ".json", ".properties"];
const DEPENDENCY_MANIFESTS: &[&str] = &["package.json", "build.gradle", "pom.xml", "requirements.txt"];

/// A scored commit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspiciousCommit {
    pub sha: String,
    pub message: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub suspicion_score: u32,
    /// One entry per rule that added or removed points
    pub reasons: Vec<String>,
}

/// Correlation of a failed run against its candidate commits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangelogAnalysis {
    pub pipeline_id: String,
    pub analyzed_commits: usize,
    /// Commits scoring at or above the threshold, highest first
    pub suspicious_commits: Vec<SuspiciousCommit>,
    pub root_cause: Option<SuspiciousCommit>,
    pub confidence: f64,
    pub analysis: String,
    pub recommendation: String,
}

/// Scores commits against a failed run
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangelogCorrelationAnalyzer;

impl ChangelogCorrelationAnalyzer {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Score and rank `commits` for the failed `pipeline`
    #[must_use]
    pub fn analyze(&self, pipeline: &PipelineRun, commits: &[Commit]) -> ChangelogAnalysis {
        let mut suspicious: Vec<SuspiciousCommit> = commits
            .iter()
            .map(|commit| score_commit(commit, pipeline.started_at))
            .filter(|scored| scored.suspicion_score >= SUSPICION_THRESHOLD)
            .collect();
        // stable: ties keep input order
        suspicious.sort_by(|a, b| b.suspicion_score.cmp(&a.suspicion_score));

        let root_cause = suspicious.first().cloned();
        let confidence = correlation_confidence(root_cause.as_ref(), suspicious.len());

        tracing::debug!(
            pipeline_id = %pipeline.id,
            analyzed = commits.len(),
            suspicious = suspicious.len(),
            root_cause = root_cause.as_ref().map(|c| c.sha.as_str()),
            "changelog correlated"
        );

        let analysis = template_analysis(root_cause.as_ref(), suspicious.len(), commits.len());
        let recommendation = template_recommendation(root_cause.as_ref()).to_string();

        ChangelogAnalysis {
            pipeline_id: pipeline.id.clone(),
            analyzed_commits: commits.len(),
            suspicious_commits: suspicious,
            root_cause,
            confidence,
            analysis,
            recommendation,
        }
    }

    /// As [`analyze`](Self::analyze), with analysis prose from `generator`
    ///
    /// Scores and selection are identical to `analyze`. The template text is
    /// kept when the generator fails or returns blank output.
    pub async fn analyze_with_narrative(
        &self,
        pipeline: &PipelineRun,
        commits: &[Commit],
        generator: &dyn NarrativeGenerator,
    ) -> ChangelogAnalysis {
        let mut result = self.analyze(pipeline, commits);
        let prompt = narrative_prompt(pipeline, &result);
        result.analysis = narrate_or(Some(generator), &prompt, result.analysis).await;
        result
    }
}

/// Score one commit; `started_at` is the failed run's start
#[must_use]
pub fn score_commit(commit: &Commit, started_at: Option<DateTime<Utc>>) -> SuspiciousCommit {
    let mut score: i32 = 0;
    let mut reasons = Vec::new();
    let mut add = |points: i32, reason: String| {
        score += points;
        reasons.push(reason);
    };

    if commit.files_changed > LARGE_FILE_COUNT {
        add(20, format!("large change: {} files", commit.files_changed));
    }
    if commit.total_lines_changed() > LARGE_LINE_COUNT {
        add(15, format!("large diff: {} lines", commit.total_lines_changed()));
    }

    if let Some(started_at) = started_at {
        let lead = started_at - commit.timestamp;
        if lead >= Duration::zero() {
            if lead < Duration::hours(1) {
                add(30, "committed less than an hour before the run".to_string());
            } else if lead < Duration::hours(24) {
                add(15, "committed less than a day before the run".to_string());
            }
        }
    }

    let message = commit.message.to_lowercase();
    for (keyword, points) in MESSAGE_KEYWORDS {
        if message.contains(*keyword) {
            add(*points, format!("message mentions \"{keyword}\""));
        }
    }

    if commit.changed_files.iter().any(|f| is_config_file(f)) {
        add(15, "touches configuration files".to_string());
    }
    if commit.changed_files.iter().any(|f| is_dependency_manifest(f)) {
        add(20, "touches dependency manifests".to_string());
    }

    SuspiciousCommit {
        sha: commit.sha.clone(),
        message: commit.message.clone(),
        author: commit.author.clone(),
        timestamp: commit.timestamp,
        suspicion_score: u32::try_from(score.clamp(0, 100)).unwrap_or(0),
        reasons,
    }
}

/// Confidence for a correlation result
///
/// 0 with no suspicious commits; [`UNRESOLVED_CONFIDENCE`] when some are
/// suspicious but no root cause is chosen; otherwise the mean of the root
/// cause's score fraction and its reason coverage.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn correlation_confidence(root_cause: Option<&SuspiciousCommit>, suspicious_count: usize) -> f64 {
    match root_cause {
        _ if suspicious_count == 0 => 0.0,
        None => UNRESOLVED_CONFIDENCE,
        Some(root) => {
            let score_part = f64::from(root.suspicion_score) / 100.0;
            let reason_part = (root.reasons.len() as f64 / REASONS_FOR_FULL_CONFIDENCE).min(1.0);
            (score_part + reason_part) / 2.0
        }
    }
}

fn is_config_file(path: &str) -> bool {
    let path = path.to_lowercase();
    CONFIG_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

fn is_dependency_manifest(path: &str) -> bool {
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    DEPENDENCY_MANIFESTS.contains(&name)
}

fn template_analysis(root: Option<&SuspiciousCommit>, suspicious: usize, analyzed: usize) -> String {
    match root {
        Some(root) => format!(
            "{suspicious} of {analyzed} recent commits look suspicious. Most likely cause: {} \"{}\" by {} (score {}): {}.",
            short(&root.sha),
            root.message,
            root.author,
            root.suspicion_score,
            root.reasons.join(", ")
        ),
        None if analyzed == 0 => "No recent commits to correlate with this failure.".to_string(),
        None => format!(
            "None of the {analyzed} recent commits stand out; the failure is likely environmental or pre-existing."
        ),
    }
}

fn template_recommendation(root: Option<&SuspiciousCommit>) -> &'static str {
    match root {
        Some(root) if root.suspicion_score >= 70 => {
            "Revert the suspected commit or roll back to the previous build, then rerun"
        }
        Some(_) => "Review the suspected commit with its author before rerunning",
        None => "Inspect the build logs and environment; no commit stands out",
    }
}

fn narrative_prompt(pipeline: &PipelineRun, analysis: &ChangelogAnalysis) -> String {
    let mut prompt = format!(
        "Explain the likely cause of the failed build {} on {}:{}.",
        pipeline.id, pipeline.repository, pipeline.branch
    );
    for commit in analysis.suspicious_commits.iter().take(3) {
        prompt.push_str(&format!(
            "\n- {} \"{}\" score {} ({})",
            short(&commit.sha),
            commit.message,
            commit.suspicion_score,
            commit.reasons.join(", ")
        ));
    }
    prompt
}

fn short(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sentinel_model::PipelineStatus;
    use sentinel_test_utils::{commit_at, reference_time, run_started_at, ScriptedNarrator};

    fn failed() -> PipelineRun {
        run_started_at("P1", "svc", "main", PipelineStatus::Failure, reference_time())
    }

    fn many_files(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("src/file{i}.rs")).collect()
    }

    #[test]
    fn wip_refactor_outscores_typo_fix() {
        let ts = reference_time() - Duration::hours(3);
        let wip = Commit::new("aaaaaaa1", "WIP refactor", "a", ts).with_files(many_files(50));
        let typo = Commit::new("bbbbbbb2", "fix typo", "b", ts).with_files(many_files(1));

        let wip_score = score_commit(&wip, Some(reference_time()));
        let typo_score = score_commit(&typo, Some(reference_time()));
        assert!(wip_score.suspicion_score > typo_score.suspicion_score);

        let analysis = ChangelogCorrelationAnalyzer::new().analyze(&failed(), &[typo, wip]);
        assert_eq!(analysis.suspicious_commits[0].sha, "aaaaaaa1");
        assert_eq!(analysis.root_cause.unwrap().sha, "aaaaaaa1");
    }

    #[test]
    fn score_components() {
        let commit = commit_at(
            "c1",
            "Experimental wip",
            reference_time() - Duration::minutes(20),
            &["package.json", "config/app.yaml"],
        )
        .with_line_stats(400, 200);
        let scored = score_commit(&commit, Some(reference_time()));
        // 15 lines + 30 recent + 20 experimental + 25 wip + 15 config + 20 manifest
        assert_eq!(scored.suspicion_score, 100);
        assert_eq!(scored.reasons.len(), 6);
    }

    #[test]
    fn score_never_negative() {
        let commit = commit_at("c1", "fix typo", reference_time() - Duration::days(3), &["README.md"]);
        assert_eq!(score_commit(&commit, Some(reference_time())).suspicion_score, 0);
    }

    #[test]
    fn recency_tiers() {
        let at = |ago: Duration| {
            score_commit(
                &commit_at("c", "change", reference_time() - ago, &[]),
                Some(reference_time()),
            )
            .suspicion_score
        };
        assert_eq!(at(Duration::minutes(59)), 30);
        assert_eq!(at(Duration::hours(5)), 15);
        assert_eq!(at(Duration::hours(30)), 0);
        // after the run started
        assert_eq!(at(Duration::minutes(-10)), 0);
        assert_eq!(
            score_commit(&commit_at("c", "change", reference_time(), &[]), None).suspicion_score,
            0
        );
    }

    #[test]
    fn nested_manifest_counts() {
        assert!(is_dependency_manifest("web/package.json"));
        assert!(!is_dependency_manifest("web/package.json.bak"));
        assert!(is_config_file("deploy/values.YAML"));
    }

    #[test]
    fn no_suspicious_commits_has_zero_confidence() {
        let commits = vec![commit_at("c", "docs", reference_time() - Duration::days(2), &["a.md"])];
        let analysis = ChangelogCorrelationAnalyzer::new().analyze(&failed(), &commits);
        assert!(analysis.suspicious_commits.is_empty());
        assert!(analysis.root_cause.is_none());
        assert_eq!(analysis.confidence, 0.0);
        assert_eq!(analysis.analyzed_commits, 1);
    }

    #[test]
    fn confidence_rules() {
        let root = score_commit(
            &commit_at("c", "wip", reference_time() - Duration::minutes(5), &[]),
            Some(reference_time()),
        );
        // 55 points, 2 reasons
        assert!((correlation_confidence(Some(&root), 1) - (0.55 + 0.4) / 2.0).abs() < 1e-9);
        assert_eq!(correlation_confidence(None, 2), UNRESOLVED_CONFIDENCE);
        assert_eq!(correlation_confidence(None, 0), 0.0);
    }

    #[test]
    fn ties_keep_input_order() {
        let ts = reference_time() - Duration::minutes(10);
        let commits = vec![commit_at("first", "x", ts, &[]), commit_at("second", "y", ts, &[])];
        let analysis = ChangelogCorrelationAnalyzer::new().analyze(&failed(), &commits);
        assert_eq!(analysis.root_cause.unwrap().sha, "first");
    }

    #[tokio::test]
    async fn narrative_replaces_analysis_only() {
        let commits = vec![commit_at("c", "wip", reference_time() - Duration::minutes(5), &[])];
        let analyzer = ChangelogCorrelationAnalyzer::new();
        let plain = analyzer.analyze(&failed(), &commits);

        let narrated = analyzer
            .analyze_with_narrative(&failed(), &commits, &ScriptedNarrator::Reply("LLM prose".into()))
            .await;
        assert_eq!(narrated.analysis, "LLM prose");
        assert_eq!(narrated.suspicious_commits, plain.suspicious_commits);
        assert_eq!(narrated.confidence, plain.confidence);

        let fallback = analyzer
            .analyze_with_narrative(&failed(), &commits, &ScriptedNarrator::Fail)
            .await;
        assert_eq!(fallback.analysis, plain.analysis);

        let blank = analyzer
            .analyze_with_narrative(&failed(), &commits, &ScriptedNarrator::Reply("  ".into()))
            .await;
        assert_eq!(blank.analysis, plain.analysis);
    }
}
