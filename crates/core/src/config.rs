// Copyright 2025 LLM Observatory Contributors
// SPDX-License-Identifier: Apache-2.0

//! Regression detection configuration.

use crate::model::BenchmarkRecord;
use crate::tool::{Direction, ToolKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised by invalid configuration values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// The comparison window must hold at least one point.
    #[error("window_size must be at least 1")]
    EmptyWindow,

    /// A threshold is negative or not finite.
    #[error("{field} must be a finite, non-negative number (got {value})")]
    InvalidThreshold {
        /// Configuration field name.
        field: &'static str,
        /// Offending value.
        value: f64,
    },

    /// Improvement threshold of 1 or more can never trigger.
    #[error("improvement_threshold must be below 1.0 (got {0})")]
    ImprovementOutOfRange(f64),
}

/// How the window of prior values is reduced to one baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineStrategy {
    /// Most recent prior value.
    #[default]
    Latest,
    /// Arithmetic mean of the window.
    Mean,
    /// Median of the window.
    Median,
}

/// What happens to a record whose unit differs from its series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitMismatchPolicy {
    /// Drop the record from the entry, keep its siblings.
    #[default]
    RejectRecord,
    /// Fail the whole ingestion.
    RejectRun,
}

/// Regression evaluation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegressionConfig {
    /// Number of prior points compared against.
    pub window_size: usize,
    /// Reduction of the window to a baseline.
    pub baseline: BaselineStrategy,
    /// REGRESSED when the ratio exceeds `1 + alert_threshold`.
    pub alert_threshold: f64,
    /// IMPROVED when the ratio falls below `1 - improvement_threshold`.
    pub improvement_threshold: f64,
    /// Handling of unit mismatches during ingestion.
    pub unit_mismatch: UnitMismatchPolicy,
    /// Per-benchmark direction overrides, keyed by record name. Names match
    /// without regard to case.
    pub directions: BTreeMap<String, Direction>,
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            window_size: 1,
            baseline: BaselineStrategy::Latest,
            alert_threshold: 0.5,       // 150%
            improvement_threshold: 0.5, // 50%
            unit_mismatch: UnitMismatchPolicy::RejectRecord,
            directions: BTreeMap::new(),
        }
    }
}

impl RegressionConfig {
    /// Set the alert threshold.
    pub fn with_alert_threshold(mut self, threshold: f64) -> Self {
        self.alert_threshold = threshold;
        self
    }

    /// Set the improvement threshold.
    pub fn with_improvement_threshold(mut self, threshold: f64) -> Self {
        self.improvement_threshold = threshold;
        self
    }

    /// Set the window size and baseline strategy.
    pub fn with_window(mut self, window_size: usize, baseline: BaselineStrategy) -> Self {
        self.window_size = window_size;
        self.baseline = baseline;
        self
    }

    /// Override the direction of one benchmark.
    pub fn with_direction(mut self, name: impl Into<String>, direction: Direction) -> Self {
        self.directions.insert(name.into(), direction);
        self
    }

    /// Set the unit mismatch policy.
    pub fn with_unit_mismatch(mut self, policy: UnitMismatchPolicy) -> Self {
        self.unit_mismatch = policy;
        self
    }

    /// Direction of a record: configured override, else the direction the
    /// record carries, else the tool default.
    pub fn direction_for(&self, record: &BenchmarkRecord, tool: ToolKind) -> Direction {
        self.override_for(&record.name)
            .or(record.direction)
            .unwrap_or_else(|| tool.direction())
    }

    // Layered settings sources fold map keys to lowercase.
    fn override_for(&self, name: &str) -> Option<Direction> {
        self.directions.get(name).copied().or_else(|| {
            self.directions
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, direction)| *direction)
        })
    }

    /// Validate the settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 {
            return Err(ConfigError::EmptyWindow);
        }
        for (field, value) in [
            ("alert_threshold", self.alert_threshold),
            ("improvement_threshold", self.improvement_threshold),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidThreshold { field, value });
            }
        }
        if self.improvement_threshold >= 1.0 {
            return Err(ConfigError::ImprovementOutOfRange(
                self.improvement_threshold,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RegressionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.window_size, 1);
        assert_eq!(config.baseline, BaselineStrategy::Latest);
    }

    #[test]
    fn test_invalid_values() {
        let config = RegressionConfig::default().with_window(0, BaselineStrategy::Mean);
        assert_eq!(config.validate(), Err(ConfigError::EmptyWindow));

        let config = RegressionConfig::default().with_alert_threshold(-0.1);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidThreshold {
                field: "alert_threshold",
                ..
            })
        ));

        let config = RegressionConfig::default().with_improvement_threshold(1.0);
        assert_eq!(
            config.validate(),
            Err(ConfigError::ImprovementOutOfRange(1.0))
        );
    }

    fn record(name: &str) -> BenchmarkRecord {
        BenchmarkRecord::new(name, 1.0, crate::model::Unit::new("ops/s").unwrap())
    }

    #[test]
    fn test_direction_override() {
        let config = RegressionConfig::default()
            .with_direction("BenchmarkThroughput - ops/s", Direction::BiggerIsBetter);
        assert_eq!(
            config.direction_for(&record("BenchmarkThroughput - ops/s"), ToolKind::Go),
            Direction::BiggerIsBetter
        );
        assert_eq!(
            config.direction_for(&record("BenchmarkThroughput"), ToolKind::Go),
            Direction::SmallerIsBetter
        );
    }

    #[test]
    fn test_direction_override_ignores_case() {
        let config = RegressionConfig::default()
            .with_direction("benchmarkthroughput", Direction::BiggerIsBetter);
        assert_eq!(
            config.direction_for(&record("BenchmarkThroughput"), ToolKind::Go),
            Direction::BiggerIsBetter
        );
    }

    #[test]
    fn test_record_direction_between_override_and_tool() {
        let pinned = record("fib - B/op").with_direction(Direction::SmallerIsBetter);
        let config = RegressionConfig::default();
        assert_eq!(
            config.direction_for(&pinned, ToolKind::BenchmarkJs),
            Direction::SmallerIsBetter
        );

        let config = config.with_direction("fib - B/op", Direction::BiggerIsBetter);
        assert_eq!(
            config.direction_for(&pinned, ToolKind::BenchmarkJs),
            Direction::BiggerIsBetter
        );
    }

    #[test]
    fn test_partial_deserialization_keeps_defaults() {
        let config: RegressionConfig =
            serde_json::from_str(r#"{"alert_threshold": 0.05, "baseline": "median"}"#).unwrap();
        assert_eq!(config.alert_threshold, 0.05);
        assert_eq!(config.baseline, BaselineStrategy::Median);
        assert_eq!(config.window_size, 1);
        assert_eq!(config.unit_mismatch, UnitMismatchPolicy::RejectRecord);
    }
}
