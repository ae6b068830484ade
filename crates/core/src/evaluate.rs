// Copyright 2025 LLM Observatory Contributors
// SPDX-License-Identifier: Apache-2.0

//! Regression evaluation.
//!
//! A new measurement is compared against a window of prior points of the
//! same `(tool, name)` series:
//!
//! ```text
//! ratio = current / baseline     (smaller is better)
//! ratio = baseline / current     (bigger is better)
//!
//! ratio > 1 + alert_threshold        → REGRESSED
//! ratio < 1 - improvement_threshold  → IMPROVED
//! otherwise                          → OK
//! ```
//!
//! Custom tools may report negative values. Against a negative divisor the
//! ratio is taken on the signed relative change, `1 + (n - d) / |d|`, so a
//! smaller-is-better series moving from -10 to -20 has ratio 0 and improves.
//!
//! The first observation of a series is always OK.

use crate::config::{BaselineStrategy, RegressionConfig};
use crate::model::{BenchmarkRecord, SeriesPoint, Unit};
use crate::tool::Direction;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// A record's unit does not match the unit recorded for its series.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unit mismatch for '{name}': series is recorded in '{expected}', got '{found}'")]
pub struct UnitMismatchError {
    /// Benchmark name.
    pub name: String,
    /// Base unit of the stored series.
    pub expected: String,
    /// Base unit of the incoming record.
    pub found: String,
}

/// Classification of a measurement relative to its baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    /// Within tolerance.
    Ok,
    /// Better than baseline beyond the improvement threshold.
    Improved,
    /// Worse than baseline beyond the alert threshold.
    Regressed,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Verdict::Ok => "OK",
            Verdict::Improved => "IMPROVED",
            Verdict::Regressed => "REGRESSED",
        })
    }
}

/// Outcome of evaluating one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Benchmark name.
    pub name: String,
    /// Classification.
    pub verdict: Verdict,
    /// Direction-adjusted ratio; `None` when undefined (zero divisor).
    pub ratio: Option<f64>,
    /// Threshold the ratio was judged against.
    pub threshold_used: f64,
    /// Direction applied.
    pub direction: Direction,
    /// New value.
    pub current: f64,
    /// Aggregated baseline, absent on first observation.
    pub baseline: Option<f64>,
    /// Commit of the most recent point in the window.
    pub baseline_commit: Option<String>,
    /// Number of prior points used.
    pub window: usize,
}

impl Evaluation {
    /// Whether the verdict is [`Verdict::Regressed`].
    pub fn is_regression(&self) -> bool {
        self.verdict == Verdict::Regressed
    }
}

/// Applies a [`RegressionConfig`] to series history.
#[derive(Debug, Clone, Default)]
pub struct RegressionEvaluator {
    config: RegressionConfig,
}

impl RegressionEvaluator {
    /// Create an evaluator.
    pub fn new(config: RegressionConfig) -> Self {
        Self { config }
    }

    /// Active configuration.
    pub fn config(&self) -> &RegressionConfig {
        &self.config
    }

    /// Evaluate `record` against `history`, ordered oldest first.
    ///
    /// Only the last `window_size` points of `history` are used.
    pub fn evaluate(
        &self,
        history: &[SeriesPoint],
        record: &BenchmarkRecord,
        direction: Direction,
    ) -> Result<Evaluation, UnitMismatchError> {
        let start = history.len().saturating_sub(self.config.window_size.max(1));
        let window = &history[start..];

        let Some(newest) = window.last() else {
            return Ok(Evaluation {
                name: record.name.clone(),
                verdict: Verdict::Ok,
                ratio: None,
                threshold_used: self.config.alert_threshold,
                direction,
                current: record.value,
                baseline: None,
                baseline_commit: None,
                window: 0,
            });
        };

        if let Some(point) = window.iter().find(|p| !p.unit.is_compatible(&record.unit)) {
            return Err(mismatch(&record.name, &point.unit, &record.unit));
        }

        let values: Vec<f64> = window.iter().map(|p| p.value).collect();
        let baseline = aggregate(&values, self.config.baseline);
        let (verdict, ratio, threshold_used) = self.classify(record.value, baseline, direction);

        debug!(
            name = %record.name,
            current = record.value,
            baseline,
            ?ratio,
            %verdict,
            "Benchmark evaluated"
        );

        Ok(Evaluation {
            name: record.name.clone(),
            verdict,
            ratio,
            threshold_used,
            direction,
            current: record.value,
            baseline: Some(baseline),
            baseline_commit: Some(newest.commit_id.clone()),
            window: window.len(),
        })
    }

    fn classify(&self, current: f64, baseline: f64, direction: Direction) -> (Verdict, Option<f64>, f64) {
        let alert = self.config.alert_threshold;
        let improvement = self.config.improvement_threshold;

        let (numerator, denominator) = match direction {
            Direction::SmallerIsBetter => (current, baseline),
            Direction::BiggerIsBetter => (baseline, current),
        };

        if denominator == 0.0 {
            return if numerator == 0.0 {
                (Verdict::Ok, Some(1.0), alert)
            } else if numerator > 0.0 {
                // Unbounded worsening.
                (Verdict::Regressed, None, alert)
            } else {
                (Verdict::Improved, None, improvement)
            };
        }

        let ratio = if denominator > 0.0 {
            numerator / denominator
        } else {
            1.0 + (numerator - denominator) / denominator.abs()
        };
        let verdict = if ratio > 1.0 + alert {
            Verdict::Regressed
        } else if ratio < 1.0 - improvement {
            Verdict::Improved
        } else {
            Verdict::Ok
        };
        let threshold_used = if ratio >= 1.0 { alert } else { improvement };
        (verdict, Some(ratio), threshold_used)
    }
}

fn mismatch(name: &str, expected: &Unit, found: &Unit) -> UnitMismatchError {
    UnitMismatchError {
        name: name.to_string(),
        expected: expected.base().to_string(),
        found: found.base().to_string(),
    }
}

/// Reduce a non-empty window to a baseline value.
fn aggregate(values: &[f64], strategy: BaselineStrategy) -> f64 {
    match strategy {
        BaselineStrategy::Latest => values.last().copied().unwrap_or_default(),
        BaselineStrategy::Mean => values.iter().sum::<f64>() / values.len().max(1) as f64,
        BaselineStrategy::Median => {
            let mut sorted = values.to_vec();
            sorted.sort_by(f64::total_cmp);
            let mid = sorted.len() / 2;
            if sorted.is_empty() {
                0.0
            } else if sorted.len() % 2 == 0 {
                (sorted[mid - 1] + sorted[mid]) / 2.0
            } else {
                sorted[mid]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(s: &str) -> Unit {
        Unit::new(s).unwrap()
    }

    fn point(value: f64, unit_str: &str, commit: &str) -> SeriesPoint {
        SeriesPoint {
            date: 0,
            value,
            unit: unit(unit_str),
            commit_id: commit.to_string(),
            position: 0,
        }
    }

    fn record(value: f64) -> BenchmarkRecord {
        BenchmarkRecord::new("BenchmarkIOBound", value, unit("ns/op"))
    }

    fn evaluator(alert: f64) -> RegressionEvaluator {
        RegressionEvaluator::new(RegressionConfig::default().with_alert_threshold(alert))
    }

    #[test]
    fn test_first_observation_is_ok() {
        let eval = evaluator(0.05)
            .evaluate(&[], &record(1e9), Direction::SmallerIsBetter)
            .unwrap();
        assert_eq!(eval.verdict, Verdict::Ok);
        assert_eq!(eval.baseline, None);
        assert_eq!(eval.window, 0);
    }

    #[test]
    fn test_threshold_boundary() {
        let history = [point(500.0, "ns/op", "a")];
        let ok = evaluator(0.05)
            .evaluate(&history, &record(524.0), Direction::SmallerIsBetter)
            .unwrap();
        assert_eq!(ok.verdict, Verdict::Ok);
        assert!((ok.ratio.unwrap() - 1.048).abs() < 1e-9);

        let regressed = evaluator(0.05)
            .evaluate(&history, &record(526.0), Direction::SmallerIsBetter)
            .unwrap();
        assert_eq!(regressed.verdict, Verdict::Regressed);
        assert_eq!(regressed.threshold_used, 0.05);
        assert_eq!(regressed.baseline_commit.as_deref(), Some("a"));
    }

    #[test]
    fn test_equal_values_are_ok() {
        let history = [point(500.0, "ns/op", "a")];
        let eval = RegressionEvaluator::new(
            RegressionConfig::default()
                .with_alert_threshold(0.0)
                .with_improvement_threshold(0.0),
        )
        .evaluate(&history, &record(500.0), Direction::SmallerIsBetter)
        .unwrap();
        assert_eq!(eval.verdict, Verdict::Ok);
        assert_eq!(eval.ratio, Some(1.0));
    }

    #[test]
    fn test_improvement() {
        let history = [point(1000.0, "ns/op", "a")];
        let eval = evaluator(0.5)
            .evaluate(&history, &record(400.0), Direction::SmallerIsBetter)
            .unwrap();
        assert_eq!(eval.verdict, Verdict::Improved);
        assert_eq!(eval.threshold_used, 0.5);
    }

    #[test]
    fn test_bigger_is_better_inverts_ratio() {
        let history = [point(1000.0, "ops/sec", "a")];
        let throughput = BenchmarkRecord::new("qps", 400.0, unit("ops/sec"));
        let eval = evaluator(0.5)
            .evaluate(&history, &throughput, Direction::BiggerIsBetter)
            .unwrap();
        assert_eq!(eval.verdict, Verdict::Regressed);
        assert_eq!(eval.ratio, Some(2.5));
    }

    #[test]
    fn test_unit_mismatch() {
        let history = [point(3.0, "ms/op", "a")];
        let err = evaluator(0.5)
            .evaluate(&history, &record(3000.0), Direction::SmallerIsBetter)
            .unwrap_err();
        assert_eq!(err.expected, "ms/op");
        assert_eq!(err.found, "ns/op");
    }

    #[test]
    fn test_composite_unit_is_compatible() {
        let history = [point(500.0, "ns/op\t       0 B/op\t       0 allocs/op", "a")];
        let eval = evaluator(0.5)
            .evaluate(&history, &record(510.0), Direction::SmallerIsBetter)
            .unwrap();
        assert_eq!(eval.verdict, Verdict::Ok);
    }

    #[test]
    fn test_zero_baseline() {
        let history = [point(0.0, "B/op", "a")];
        let allocs = |v| BenchmarkRecord::new("x - B/op", v, unit("B/op"));

        let both_zero = evaluator(0.5)
            .evaluate(&history, &allocs(0.0), Direction::SmallerIsBetter)
            .unwrap();
        assert_eq!(both_zero.verdict, Verdict::Ok);

        let grew = evaluator(0.5)
            .evaluate(&history, &allocs(16.0), Direction::SmallerIsBetter)
            .unwrap();
        assert_eq!(grew.verdict, Verdict::Regressed);
        assert_eq!(grew.ratio, None);
    }

    #[test]
    fn test_negative_values_keep_direction() {
        let history = [point(-10.0, "delta", "a")];
        let delta = |v| BenchmarkRecord::new("delta", v, unit("delta"));

        let lower = evaluator(0.5)
            .evaluate(&history, &delta(-20.0), Direction::SmallerIsBetter)
            .unwrap();
        assert_eq!(lower.verdict, Verdict::Improved);
        assert_eq!(lower.ratio, Some(0.0));

        let higher = evaluator(0.5)
            .evaluate(&history, &delta(4.0), Direction::SmallerIsBetter)
            .unwrap();
        assert_eq!(higher.verdict, Verdict::Regressed);
        assert!((higher.ratio.unwrap() - 2.4).abs() < 1e-9);

        let bigger = evaluator(0.5)
            .evaluate(&history, &delta(-40.0), Direction::BiggerIsBetter)
            .unwrap();
        assert_eq!(bigger.verdict, Verdict::Regressed);
        assert_eq!(bigger.ratio, Some(1.75));
    }

    #[test]
    fn test_negative_over_zero_baseline_improves() {
        let history = [point(0.0, "delta", "a")];
        let eval = evaluator(0.5)
            .evaluate(
                &history,
                &BenchmarkRecord::new("delta", -3.0, unit("delta")),
                Direction::SmallerIsBetter,
            )
            .unwrap();
        assert_eq!(eval.verdict, Verdict::Improved);
        assert_eq!(eval.ratio, None);
    }

    #[test]
    fn test_window_aggregates() {
        let history = [
            point(100.0, "ns/op", "a"),
            point(300.0, "ns/op", "b"),
            point(200.0, "ns/op", "c"),
            point(900.0, "ns/op", "d"),
        ];

        let mean = RegressionEvaluator::new(
            RegressionConfig::default().with_window(3, BaselineStrategy::Mean),
        )
        .evaluate(&history, &record(500.0), Direction::SmallerIsBetter)
        .unwrap();
        assert_eq!(mean.baseline, Some(1400.0 / 3.0));
        assert_eq!(mean.window, 3);

        let median = RegressionEvaluator::new(
            RegressionConfig::default().with_window(4, BaselineStrategy::Median),
        )
        .evaluate(&history, &record(500.0), Direction::SmallerIsBetter)
        .unwrap();
        assert_eq!(median.baseline, Some(250.0));
        assert_eq!(median.baseline_commit.as_deref(), Some("d"));

        let latest = RegressionEvaluator::default()
            .evaluate(&history, &record(500.0), Direction::SmallerIsBetter)
            .unwrap();
        assert_eq!(latest.baseline, Some(900.0));
    }
}
