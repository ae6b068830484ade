// Copyright 2025 LLM Observatory Contributors
// SPDX-License-Identifier: Apache-2.0

//! Record normalization.
//!
//! Converts a harness result into canonical [`BenchmarkRecord`]s. Secondary
//! metrics reported next to the primary value (memory per operation,
//! allocation counts, ...) fan out into their own records named
//! `"<primary-name> - <metric>"`, so every metric is tracked as an
//! independent scalar series.
//!
//! # Example
//!
//! ```
//! use bench_history_core::normalize::{normalize, RawBenchmark, RawMetric, RawValue};
//! use bench_history_core::ToolKind;
//!
//! let raw = RawBenchmark {
//!     name: Some("BenchmarkThroughput".into()),
//!     value: Some(RawValue::Number(528.2)),
//!     iterations: Some(2294203),
//!     procs: Some(4),
//!     metrics: vec![RawMetric::new(0.0, "B/op"), RawMetric::new(0.0, "allocs/op")],
//!     ..Default::default()
//! };
//!
//! let records = normalize(&raw, ToolKind::Go).unwrap();
//! assert_eq!(records.len(), 4);
//! assert_eq!(records[2].name, "BenchmarkThroughput - B/op");
//! ```

use crate::model::{BenchmarkRecord, Extra, Unit};
use crate::tool::{Direction, ToolKind};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Write;
use thiserror::Error;
use tracing::debug;

/// Errors produced while normalizing harness output.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NormalizationError {
    /// The result has no usable name.
    #[error("benchmark result is missing a name")]
    MissingName,

    /// The result has no primary value.
    #[error("benchmark '{name}' is missing a value")]
    MissingValue {
        /// Benchmark name.
        name: String,
    },

    /// The value could not be read as a finite number.
    #[error("benchmark '{name}' has an invalid value '{raw}'")]
    InvalidValue {
        /// Benchmark name.
        name: String,
        /// Offending input.
        raw: String,
    },

    /// A duration or count metric was negative.
    #[error("benchmark '{name}' has a negative value {value}")]
    NegativeValue {
        /// Benchmark name.
        name: String,
        /// Offending value.
        value: f64,
    },

    /// Neither the result nor the tool supplies a unit.
    #[error("benchmark '{name}' is missing a unit")]
    MissingUnit {
        /// Benchmark name.
        name: String,
    },

    /// Two records of the same run share a name.
    #[error("benchmark '{name}' appears more than once in the run")]
    DuplicateName {
        /// Benchmark name.
        name: String,
    },
}

/// Result type for normalization.
pub type Result<T> = std::result::Result<T, NormalizationError>;

/// A value as reported by a harness: a JSON number or a numeric string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    /// Numeric value.
    Number(f64),
    /// Textual value such as `"1,234.5"`.
    Text(String),
}

impl RawValue {
    fn parse(&self, name: &str) -> Result<f64> {
        let value = match self {
            RawValue::Number(n) => *n,
            RawValue::Text(text) => {
                let cleaned: String = text.trim().chars().filter(|c| *c != ',').collect();
                cleaned.parse::<f64>().map_err(|_| NormalizationError::InvalidValue {
                    name: name.to_string(),
                    raw: text.clone(),
                })?
            }
        };
        if !value.is_finite() {
            return Err(NormalizationError::InvalidValue {
                name: name.to_string(),
                raw: value.to_string(),
            });
        }
        Ok(value)
    }
}

/// A secondary measurement reported alongside the primary value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMetric {
    /// Suffix of the synthetic record name; the unit is used when absent.
    #[serde(default)]
    pub name: Option<String>,
    /// Measured value.
    pub value: RawValue,
    /// Unit of the measurement.
    pub unit: String,
    /// Direction of the measurement; smaller is better when absent.
    #[serde(default)]
    pub direction: Option<Direction>,
}

impl RawMetric {
    /// Create an unnamed metric.
    pub fn new(value: f64, unit: impl Into<String>) -> Self {
        Self {
            name: None,
            value: RawValue::Number(value),
            unit: unit.into(),
            direction: None,
        }
    }

    /// Set the direction of the measurement.
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    fn suffix(&self) -> &str {
        self.name.as_deref().unwrap_or(self.unit.as_str())
    }
}

/// Harness output for one benchmark, already split into fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawBenchmark {
    /// Benchmark name.
    #[serde(default)]
    pub name: Option<String>,
    /// Primary value.
    #[serde(default)]
    pub value: Option<RawValue>,
    /// Unit of the primary value; the tool default applies when absent.
    #[serde(default)]
    pub unit: Option<String>,
    /// Variance or confidence range.
    #[serde(default)]
    pub range: Option<String>,
    /// Free-form metadata.
    #[serde(default)]
    pub extra: Option<String>,
    /// Iteration count.
    #[serde(default)]
    pub iterations: Option<u64>,
    /// Processor count.
    #[serde(default)]
    pub procs: Option<u32>,
    /// Secondary measurements.
    #[serde(default)]
    pub metrics: Vec<RawMetric>,
}

/// Normalize one harness result into its primary record and fan-out records.
pub fn normalize(raw: &RawBenchmark, tool: ToolKind) -> Result<Vec<BenchmarkRecord>> {
    let name = raw
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or(NormalizationError::MissingName)?;

    let value = raw
        .value
        .as_ref()
        .ok_or_else(|| NormalizationError::MissingValue {
            name: name.to_string(),
        })?
        .parse(name)?;
    check_sign(name, value, tool)?;

    let unit = raw
        .unit
        .as_deref()
        .filter(|unit| !unit.trim().is_empty())
        .or_else(|| tool.default_unit())
        .ok_or_else(|| NormalizationError::MissingUnit {
            name: name.to_string(),
        })?;

    let extra = match (raw.iterations, &raw.extra) {
        (Some(iterations), _) => Some(Extra::Samples {
            iterations,
            procs: raw.procs,
        }),
        (None, Some(extra)) => Some(Extra::parse(extra)),
        (None, None) => None,
    };

    let mut secondaries = Vec::with_capacity(raw.metrics.len());
    for metric in &raw.metrics {
        let metric_name = format!("{} - {}", name, metric.suffix());
        let metric_value = metric.value.parse(&metric_name)?;
        check_sign(&metric_name, metric_value, tool)?;
        let metric_unit = Unit::new(metric.unit.clone()).map_err(|_| {
            NormalizationError::MissingUnit {
                name: metric_name.clone(),
            }
        })?;
        let direction = metric.direction.unwrap_or(Direction::SmallerIsBetter);
        secondaries.push((metric_name, metric_value, metric_unit, direction));
    }

    let fan_out_primary = tool == ToolKind::Go && !secondaries.is_empty();
    let primary_unit = if fan_out_primary {
        composite_unit(unit, &secondaries)
    } else {
        unit.to_string()
    };

    let finish = |record: BenchmarkRecord| {
        let record = match &extra {
            Some(extra) => record.with_extra(extra.clone()),
            None => record,
        };
        match &raw.range {
            Some(range) => record.with_range(range.clone()),
            None => record,
        }
    };

    let mut records = Vec::with_capacity(secondaries.len() + 2);
    records.push(finish(BenchmarkRecord::new(
        name,
        value,
        unit_or_missing(name, primary_unit)?,
    )));
    if fan_out_primary {
        records.push(finish(BenchmarkRecord::new(
            format!("{} - {}", name, unit),
            value,
            unit_or_missing(name, unit.to_string())?,
        )));
    }
    for (metric_name, metric_value, metric_unit, direction) in secondaries {
        let record = finish(BenchmarkRecord::new(metric_name, metric_value, metric_unit));
        // Only pinned when the tool default would judge it the other way.
        records.push(if direction == tool.direction() {
            record
        } else {
            record.with_direction(direction)
        });
    }

    Ok(records)
}

/// Normalize a whole run, failing on the first invalid result.
///
/// Record names must be unique across the expanded run.
pub fn normalize_run(raws: &[RawBenchmark], tool: ToolKind) -> Result<Vec<BenchmarkRecord>> {
    let mut records = Vec::new();
    let mut seen = HashSet::new();
    for (index, raw) in raws.iter().enumerate() {
        let expanded = normalize(raw, tool).map_err(|err| {
            debug!(index, error = %err, "Benchmark result rejected");
            err
        })?;
        for record in expanded {
            if !seen.insert(record.name.clone()) {
                return Err(NormalizationError::DuplicateName { name: record.name });
            }
            records.push(record);
        }
    }
    Ok(records)
}

fn check_sign(name: &str, value: f64, tool: ToolKind) -> Result<()> {
    if value < 0.0 && !tool.is_custom() {
        return Err(NormalizationError::NegativeValue {
            name: name.to_string(),
            value,
        });
    }
    Ok(())
}

fn unit_or_missing(name: &str, unit: String) -> Result<Unit> {
    Unit::new(unit).map_err(|_| NormalizationError::MissingUnit {
        name: name.to_string(),
    })
}

/// Go reports every metric on one line: `ns/op\t       0 B/op\t       0 allocs/op`.
fn composite_unit(primary: &str, secondaries: &[(String, f64, Unit, Direction)]) -> String {
    let mut unit = primary.to_string();
    for (_, value, metric_unit, _) in secondaries {
        if value.fract() == 0.0 {
            let _ = write!(unit, "\t{:>8} {}", *value as i64, metric_unit);
        } else {
            let _ = write!(unit, "\t{:>8} {}", value, metric_unit);
        }
    }
    unit
}
