//! CI Sentinel configuration
//!
//! Loaded from TOML. Every field has a default, so an empty file (or no file
//! at all) yields the reference behavior.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelConfig {
    pub remediation: RemediationSettings,
    pub cascade: CascadeSettings,
    pub flaky: FlakySettings,
    pub jobs: JobSettings,
}

impl SentinelConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configuration from TOML text
    ///
    /// # Errors
    /// `ConfigError::Parse` on malformed TOML, `ConfigError::InvalidValue`
    /// when a value is out of range.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    ///
    /// # Errors
    /// `ConfigError::Read` if the file cannot be read, otherwise as
    /// [`SentinelConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// `ConfigError::InvalidValue` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.remediation.backoff_base_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "remediation.backoff_base_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.flaky.min_runs < 2 {
            return Err(ConfigError::InvalidValue {
                field: "flaky.min_runs",
                reason: "need at least 2 runs to observe a status change".to_string(),
            });
        }
        if self.jobs.queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "jobs.queue_capacity",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// With auto-remediation toggled
    #[inline]
    #[must_use]
    pub fn with_auto_remediation(mut self, enabled: bool) -> Self {
        self.remediation.auto_remediation_enabled = enabled;
        self
    }

    /// With backoff base in seconds
    #[inline]
    #[must_use]
    pub fn with_backoff_base_secs(mut self, base: u64) -> Self {
        self.remediation.backoff_base_secs = base;
        self
    }

    /// With flaky-detection minimum sample size
    #[inline]
    #[must_use]
    pub fn with_flaky_min_runs(mut self, min_runs: usize) -> Self {
        self.flaky.min_runs = min_runs;
        self
    }

    /// With default duration assumed for runs without one
    #[inline]
    #[must_use]
    pub fn with_default_duration_minutes(mut self, minutes: u64) -> Self {
        self.cascade.default_duration_minutes = minutes;
        self
    }
}

/// Remediation workflow settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemediationSettings {
    /// Global switch; when off, failures are never turned into proposals
    pub auto_remediation_enabled: bool,
    /// Base of the exponential delay between consecutive reruns
    pub backoff_base_secs: u64,
}

impl Default for RemediationSettings {
    fn default() -> Self {
        Self {
            auto_remediation_enabled: true,
            backoff_base_secs: 2,
        }
    }
}

/// Cascade risk settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeSettings {
    /// Duration assumed for downstream runs that report none
    pub default_duration_minutes: u64,
}

impl Default for CascadeSettings {
    fn default() -> Self {
        Self {
            default_duration_minutes: 5,
        }
    }
}

/// Flaky detection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlakySettings {
    /// Groups with fewer runs are skipped
    pub min_runs: usize,
}

impl Default for FlakySettings {
    fn default() -> Self {
        Self { min_runs: 10 }
    }
}

/// Background job queue settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobSettings {
    /// Bounded channel capacity for submitted jobs
    pub queue_capacity: usize,
    /// Finished job statuses kept for lookup; older ones are evicted
    pub finished_retention: usize,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            finished_retention: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn empty_toml_is_default() {
        let config = SentinelConfig::from_toml_str("").unwrap();
        assert_eq!(config, SentinelConfig::default());
        assert!(config.remediation.auto_remediation_enabled);
        assert_eq!(config.remediation.backoff_base_secs, 2);
        assert_eq!(config.flaky.min_runs, 10);
        assert_eq!(config.cascade.default_duration_minutes, 5);
        assert_eq!(config.jobs.finished_retention, 256);
    }

    #[test]
    fn job_retention_is_configurable() {
        let config = SentinelConfig::from_toml_str("[jobs]\nfinished_retention = 8\n").unwrap();
        assert_eq!(config.jobs.finished_retention, 8);
        assert_eq!(config.jobs.queue_capacity, 64);
    }

    #[test]
    fn partial_toml_overrides_only_named_fields() {
        let config = SentinelConfig::from_toml_str(
            "[remediation]\nauto_remediation_enabled = false\n\n[flaky]\nmin_runs = 20\n",
        )
        .unwrap();
        assert!(!config.remediation.auto_remediation_enabled);
        assert_eq!(config.remediation.backoff_base_secs, 2);
        assert_eq!(config.flaky.min_runs, 20);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = SentinelConfig::from_toml_str("[remediation]\nbackoff_base_secs = 0\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "remediation.backoff_base_secs", .. }));

        let err = SentinelConfig::from_toml_str("[flaky]\nmin_runs = \"ten\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[cascade]\ndefault_duration_minutes = 7").unwrap();

        let config = SentinelConfig::load(file.path()).unwrap();
        assert_eq!(config.cascade.default_duration_minutes, 7);
    }

    #[test]
    fn load_missing_file_is_read_error() {
        let err = SentinelConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
