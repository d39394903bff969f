//! Narrative prose with deterministic fallbacks
//!
//! A generator is optional. When absent, failing, or returning blank text the
//! caller gets fixed template prose chosen by keywords in the prompt.

use sentinel_model::NarrativeGenerator;

/// Keyword table checked in order against the lowercased prompt
const FALLBACKS: &[(&str, &str)] = &[
    (
        "build",
        "The build failed. Check the most recent commits and the failing step's logs for the root cause.",
    ),
    (
        "fail",
        "A failure was detected. Review the logs of the failing stage and rerun once the cause is understood.",
    ),
    (
        "risk",
        "Elevated risk detected. Review downstream pipelines and hold deployments until the failure is resolved.",
    ),
    (
        "performance",
        "Pipeline performance has degraded. Compare recent durations against the historical baseline.",
    ),
    (
        "optimize",
        "Consider caching dependencies and parallelizing independent stages to shorten pipeline time.",
    ),
];

const DEFAULT_FALLBACK: &str = "Analysis is unavailable right now. Review the pipeline history for details.";

/// Template text for `prompt`
#[must_use]
pub fn fallback_for(prompt: &str) -> &'static str {
    let prompt = prompt.to_lowercase();
    FALLBACKS
        .iter()
        .find(|(keyword, _)| prompt.contains(keyword))
        .map_or(DEFAULT_FALLBACK, |(_, text)| text)
}

/// Generated prose for `prompt`, or its keyword fallback
pub async fn narrate(generator: Option<&dyn NarrativeGenerator>, prompt: &str) -> String {
    narrate_or(generator, prompt, fallback_for(prompt).to_string()).await
}

/// Generated prose for `prompt`, or `fallback`
pub async fn narrate_or(
    generator: Option<&dyn NarrativeGenerator>,
    prompt: &str,
    fallback: String,
) -> String {
    let Some(generator) = generator else {
        return fallback;
    };
    match generator.generate(prompt).await {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => {
            tracing::debug!("narrative generator returned blank text; using fallback");
            fallback
        }
        Err(e) => {
            tracing::debug!(error = %e, "narrative generation failed; using fallback");
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_test_utils::ScriptedNarrator;

    #[test]
    fn keyword_order() {
        assert!(fallback_for("Why did the BUILD fail?").starts_with("The build failed"));
        assert!(fallback_for("tests fail on main").starts_with("A failure"));
        assert!(fallback_for("cascade risk").starts_with("Elevated risk"));
        assert!(fallback_for("performance trend").contains("baseline"));
        assert!(fallback_for("optimize this").contains("caching"));
        assert_eq!(fallback_for("hello"), DEFAULT_FALLBACK);
    }

    #[tokio::test]
    async fn generator_output_wins_when_present() {
        let narrator = ScriptedNarrator::Reply("custom".into());
        assert_eq!(narrate(Some(&narrator), "risk").await, "custom");
    }

    #[tokio::test]
    async fn failures_fall_back() {
        assert_eq!(narrate(None, "risk").await, fallback_for("risk"));
        assert_eq!(
            narrate(Some(&ScriptedNarrator::Fail), "optimize").await,
            fallback_for("optimize")
        );
        assert_eq!(
            narrate(Some(&ScriptedNarrator::Reply(String::new())), "x").await,
            DEFAULT_FALLBACK
        );
    }
}
