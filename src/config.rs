//! Analysis configuration
//!
//! Mirrors the user-tunable surface of the time-course analysis: time
//! bucketing, rolling averaging, the invalid-sample policy, and output column
//! selection. Configurations round-trip through JSON so a run can be pinned
//! to a file and overridden from the command line.

use crate::error::AnalysisError;
use crate::types::BucketRow;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Default bucket grid size in milliseconds
pub const DEFAULT_TIME_STEP_MS: u32 = 50;

/// Default rolling window span in milliseconds
pub const DEFAULT_ROLLING_WINDOW_MS: u32 = 100;

/// How invalid (no valid eye) samples participate in bucket means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidSamplePolicy {
    /// Invalid samples are excluded from the mean; an all-invalid run
    /// produces a bucket with no value.
    #[default]
    Exclude,
    /// Invalid samples contribute the legacy `-1.0` sentinel to the mean,
    /// reproducing the historical pipeline's bucket values verbatim.
    SentinelCompat,
}

impl InvalidSamplePolicy {
    /// Numeric contribution of a validated pupil value under this policy.
    pub fn numeric(&self, value: Option<f64>) -> Option<f64> {
        match (self, value) {
            (_, Some(v)) => Some(v),
            (InvalidSamplePolicy::Exclude, None) => None,
            (InvalidSamplePolicy::SentinelCompat, None) => Some(-1.0),
        }
    }
}

/// Where the per-sample validated pupil value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PupilSource {
    /// Read the upstream-validated column (filtered, interpolated, trials
    /// removed); rows with an empty/NA value are dropped at ingestion.
    #[default]
    PrevalidatedColumn,
    /// Recompute the value from the two per-eye diameter/validity columns.
    TwoEyeAverage,
}

/// Configuration for one analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Collapse same-time samples into buckets before analysis.
    pub bucketing_enabled: bool,
    /// Bucket grid size in milliseconds.
    pub time_step_ms: u32,
    /// Use the trailing rolling average instead of plain bucket means in the
    /// baseline and response passes.
    pub use_rolling_average: bool,
    /// Rolling window span in milliseconds.
    pub rolling_window_ms: u32,
    pub invalid_policy: InvalidSamplePolicy,
    pub pupil_source: PupilSource,
    /// Default input location for the CLI when no input path is given.
    pub input_directory: Option<PathBuf>,
    /// Original column indices to retain on output; `None` keeps all.
    pub output_columns: Option<BTreeSet<usize>>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            bucketing_enabled: true,
            time_step_ms: DEFAULT_TIME_STEP_MS,
            use_rolling_average: false,
            rolling_window_ms: DEFAULT_ROLLING_WINDOW_MS,
            invalid_policy: InvalidSamplePolicy::default(),
            pupil_source: PupilSource::default(),
            input_directory: None,
            output_columns: None,
        }
    }
}

impl AnalysisConfig {
    /// Check the configuration for unusable combinations.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.time_step_ms == 0 {
            return Err(AnalysisError::ConfigError(
                "time_step_ms must be greater than zero".to_string(),
            ));
        }
        if self.use_rolling_average && !self.bucketing_enabled {
            return Err(AnalysisError::ConfigError(
                "rolling averaging requires bucketing to be enabled".to_string(),
            ));
        }
        if self.use_rolling_average && self.rolling_window_ms == 0 {
            return Err(AnalysisError::ConfigError(
                "rolling_window_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// The value a bucket row contributes to the baseline and response
    /// passes: the rolling mean when rolling mode is on, else the plain
    /// bucket mean.
    pub fn chosen_value(&self, row: &BucketRow) -> Option<f64> {
        if self.use_rolling_average {
            row.pupil_roll
        } else {
            row.pupil_avg
        }
    }

    /// Load a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Sample, WindowLabel};

    fn make_row(avg: Option<f64>, roll: Option<f64>) -> BucketRow {
        BucketRow {
            sample: Sample::default(),
            window: WindowLabel::Item(1),
            normalized_time_ms: 0,
            pupil_avg: avg,
            pupil_roll: roll,
            member_count: 1,
        }
    }

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::default();
        assert!(config.bucketing_enabled);
        assert_eq!(config.time_step_ms, 50);
        assert!(!config.use_rolling_average);
        assert_eq!(config.rolling_window_ms, 100);
        assert_eq!(config.invalid_policy, InvalidSamplePolicy::Exclude);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_step() {
        let config = AnalysisConfig {
            time_step_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_rolling_without_bucketing() {
        let config = AnalysisConfig {
            bucketing_enabled: false,
            use_rolling_average: true,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_chosen_value_follows_mode() {
        let row = make_row(Some(4.0), Some(3.5));

        let plain = AnalysisConfig::default();
        assert_eq!(plain.chosen_value(&row), Some(4.0));

        let rolling = AnalysisConfig {
            use_rolling_average: true,
            ..Default::default()
        };
        assert_eq!(rolling.chosen_value(&row), Some(3.5));
    }

    #[test]
    fn test_invalid_policy_numeric() {
        assert_eq!(InvalidSamplePolicy::Exclude.numeric(Some(4.2)), Some(4.2));
        assert_eq!(InvalidSamplePolicy::Exclude.numeric(None), None);
        assert_eq!(
            InvalidSamplePolicy::SentinelCompat.numeric(None),
            Some(-1.0)
        );
    }

    #[test]
    fn test_json_round_trip() {
        let config = AnalysisConfig {
            time_step_ms: 20,
            use_rolling_average: true,
            rolling_window_ms: 200,
            ..Default::default()
        };
        let json = config.to_json().unwrap();
        let loaded = AnalysisConfig::from_json(&json).unwrap();
        assert_eq!(loaded.time_step_ms, 20);
        assert!(loaded.use_rolling_average);
        assert_eq!(loaded.rolling_window_ms, 200);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let loaded = AnalysisConfig::from_json(r#"{"time_step_ms": 25}"#).unwrap();
        assert_eq!(loaded.time_step_ms, 25);
        assert!(loaded.bucketing_enabled);
        assert_eq!(loaded.rolling_window_ms, DEFAULT_ROLLING_WINDOW_MS);
    }
}
