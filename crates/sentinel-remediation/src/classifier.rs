//! Failure classification
//!
//! Maps raw log text to exactly one [`FailureCategory`]. Rules are an ordered
//! list of `(predicate, category)` pairs evaluated top to bottom; the first
//! match wins and no match yields [`FailureCategory::Unknown`].

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Failure category assigned to a failed pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    /// Network or upstream service blip
    Transient,
    Timeout,
    FlakyTest,
    /// Memory or disk exhaustion on the runner
    ResourceLimit,
    Deployment,
    /// Broken code or build configuration
    Permanent,
    Unknown,
}

impl FailureCategory {
    /// All categories in classification priority order
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Transient,
            Self::Timeout,
            Self::FlakyTest,
            Self::ResourceLimit,
            Self::Deployment,
            Self::Permanent,
            Self::Unknown,
        ]
    }

    /// Human-readable label, used as the proposal's failure type
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Transient => "Transient Failure",
            Self::Timeout => "Timeout",
            Self::FlakyTest => "Flaky Test",
            Self::ResourceLimit => "Resource Limit",
            Self::Deployment => "Deployment Failure",
            Self::Permanent => "Permanent Failure",
            Self::Unknown => "Unknown Failure",
        }
    }

    /// Metric/log tag
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Timeout => "timeout",
            Self::FlakyTest => "flaky_test",
            Self::ResourceLimit => "resource_limit",
            Self::Deployment => "deployment",
            Self::Permanent => "permanent",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One classification rule: a predicate over lowercased log text
#[derive(Debug, Clone, Copy)]
pub struct ClassificationRule {
    pub category: FailureCategory,
    pub description: &'static str,
    predicate: fn(&str) -> bool,
}

impl ClassificationRule {
    /// Create a rule. `predicate` receives lowercased text.
    #[inline]
    #[must_use]
    pub const fn new(
        category: FailureCategory,
        description: &'static str,
        predicate: fn(&str) -> bool,
    ) -> Self {
        Self {
            category,
            description,
            predicate,
        }
    }

    #[inline]
    #[must_use]
    pub fn matches(&self, lowercased_log: &str) -> bool {
        (self.predicate)(lowercased_log)
    }
}

fn contains_any(text: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| text.contains(n))
}

fn is_transient(log: &str) -> bool {
    contains_any(
        log,
        &[
            "connection refused",
            "connection timed out",
            "temporarily unavailable",
            "503 service unavailable",
            "502 bad gateway",
        ],
    )
}

fn is_timeout(log: &str) -> bool {
    contains_any(log, &["timeout", "timed out"])
}

fn is_flaky_test(log: &str) -> bool {
    log.contains("flaky") || (log.contains("test") && log.contains("intermittent"))
}

fn is_resource_limit(log: &str) -> bool {
    contains_any(log, &["out of memory", "oom", "no space left", "disk full"])
}

fn is_deployment(log: &str) -> bool {
    (log.contains("deployment") && log.contains("failed")) || log.contains("rollout failed")
}

fn is_permanent(log: &str) -> bool {
    contains_any(log, &["compilation failed", "build failed", "syntax error"])
}

/// Built-in rules in priority order
pub const DEFAULT_RULES: &[ClassificationRule] = &[
    ClassificationRule::new(FailureCategory::Transient, "network or upstream outage", is_transient),
    ClassificationRule::new(FailureCategory::Timeout, "step exceeded its time limit", is_timeout),
    ClassificationRule::new(FailureCategory::FlakyTest, "intermittent test failure", is_flaky_test),
    ClassificationRule::new(FailureCategory::ResourceLimit, "memory or disk exhausted", is_resource_limit),
    ClassificationRule::new(FailureCategory::Deployment, "deployment or rollout failed", is_deployment),
    ClassificationRule::new(FailureCategory::Permanent, "build or compilation error", is_permanent),
];

/// Ordered, first-match-wins log classifier
#[derive(Debug, Clone)]
pub struct FailureClassifier {
    rules: Vec<ClassificationRule>,
}

impl FailureClassifier {
    /// Classifier with the built-in rules
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            rules: DEFAULT_RULES.to_vec(),
        }
    }

    /// Classifier with a custom rule list
    #[inline]
    #[must_use]
    pub fn with_rules(rules: Vec<ClassificationRule>) -> Self {
        Self { rules }
    }

    /// Insert a rule ahead of all existing ones
    #[must_use]
    pub fn with_priority_rule(mut self, rule: ClassificationRule) -> Self {
        self.rules.insert(0, rule);
        self
    }

    #[inline]
    #[must_use]
    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    /// Classify log text. Total and deterministic; empty input is `Unknown`.
    #[must_use]
    pub fn classify(&self, log: &str) -> FailureCategory {
        let text = lowercase(log);
        self.rules
            .iter()
            .find(|rule| rule.matches(&text))
            .map_or(FailureCategory::Unknown, |rule| rule.category)
    }
}

impl Default for FailureClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Classify with the built-in rules
#[must_use]
pub fn classify(log: &str) -> FailureCategory {
    let text = lowercase(log);
    DEFAULT_RULES
        .iter()
        .find(|rule| rule.matches(&text))
        .map_or(FailureCategory::Unknown, |rule| rule.category)
}

fn lowercase(log: &str) -> Cow<'_, str> {
    if log.chars().any(char::is_uppercase) {
        Cow::Owned(log.to_lowercase())
    } else {
        Cow::Borrowed(log)
    }
}
