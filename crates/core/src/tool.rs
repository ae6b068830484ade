// Copyright 2025 LLM Observatory Contributors
// SPDX-License-Identifier: Apache-2.0

//! Benchmark harness identifiers and metric directionality.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a tool identifier is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized benchmark tool '{0}'")]
pub struct UnknownToolError(pub String);

/// Whether lower or higher values are better for a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Latency, allocation counts, memory per operation.
    SmallerIsBetter,
    /// Throughput, operations per second.
    BiggerIsBetter,
}

/// Benchmark harness that produced a run.
///
/// The serialized form is the identifier stored in `Entry::tool`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolKind {
    /// `cargo bench` (libtest).
    #[serde(rename = "cargo")]
    Cargo,
    /// `go test -bench`.
    #[serde(rename = "go")]
    Go,
    /// Benchmark.js.
    #[serde(rename = "benchmarkjs")]
    BenchmarkJs,
    /// pytest-benchmark.
    #[serde(rename = "pytest")]
    Pytest,
    /// Google Benchmark.
    #[serde(rename = "googlecpp")]
    GoogleCpp,
    /// Catch2.
    #[serde(rename = "catch2")]
    Catch2,
    /// BenchmarkTools.jl.
    #[serde(rename = "julia")]
    Julia,
    /// JMH.
    #[serde(rename = "jmh")]
    Jmh,
    /// BenchmarkDotNet.
    #[serde(rename = "benchmarkdotnet")]
    BenchmarkDotNet,
    /// Arbitrary metrics where a larger value is better.
    #[serde(rename = "customBiggerIsBetter")]
    CustomBiggerIsBetter,
    /// Arbitrary metrics where a smaller value is better.
    #[serde(rename = "customSmallerIsBetter")]
    CustomSmallerIsBetter,
}

impl ToolKind {
    /// All recognized tools.
    pub const ALL: [ToolKind; 11] = [
        ToolKind::Cargo,
        ToolKind::Go,
        ToolKind::BenchmarkJs,
        ToolKind::Pytest,
        ToolKind::GoogleCpp,
        ToolKind::Catch2,
        ToolKind::Julia,
        ToolKind::Jmh,
        ToolKind::BenchmarkDotNet,
        ToolKind::CustomBiggerIsBetter,
        ToolKind::CustomSmallerIsBetter,
    ];

    /// Identifier as stored in the history document.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cargo => "cargo",
            Self::Go => "go",
            Self::BenchmarkJs => "benchmarkjs",
            Self::Pytest => "pytest",
            Self::GoogleCpp => "googlecpp",
            Self::Catch2 => "catch2",
            Self::Julia => "julia",
            Self::Jmh => "jmh",
            Self::BenchmarkDotNet => "benchmarkdotnet",
            Self::CustomBiggerIsBetter => "customBiggerIsBetter",
            Self::CustomSmallerIsBetter => "customSmallerIsBetter",
        }
    }

    /// Unit assumed when a result does not carry one.
    pub fn default_unit(&self) -> Option<&'static str> {
        match self {
            Self::Cargo => Some("ns/iter"),
            Self::Go => Some("ns/op"),
            Self::BenchmarkJs => Some("ops/sec"),
            Self::Pytest => Some("iter/sec"),
            Self::GoogleCpp | Self::Catch2 | Self::Julia | Self::BenchmarkDotNet => Some("ns"),
            Self::Jmh | Self::CustomBiggerIsBetter | Self::CustomSmallerIsBetter => None,
        }
    }

    /// Default directionality of the tool's primary metric.
    pub fn direction(&self) -> Direction {
        match self {
            Self::BenchmarkJs | Self::Pytest | Self::CustomBiggerIsBetter => {
                Direction::BiggerIsBetter
            }
            _ => Direction::SmallerIsBetter,
        }
    }

    /// Whether values may be negative.
    pub fn is_custom(&self) -> bool {
        matches!(self, Self::CustomBiggerIsBetter | Self::CustomSmallerIsBetter)
    }
}

impl FromStr for ToolKind {
    type Err = UnknownToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolKind::ALL
            .into_iter()
            .find(|tool| tool.as_str() == s)
            .ok_or_else(|| UnknownToolError(s.to_string()))
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_identifiers_round_trip() {
        for tool in ToolKind::ALL {
            assert_eq!(tool.as_str().parse::<ToolKind>().unwrap(), tool);
            let json = serde_json::to_string(&tool).unwrap();
            assert_eq!(json, format!("\"{}\"", tool.as_str()));
        }
    }

    #[test]
    fn test_unknown_tool() {
        let err = "gobench".parse::<ToolKind>().unwrap_err();
        assert_eq!(err, UnknownToolError("gobench".to_string()));
    }

    #[test]
    fn test_default_directions() {
        assert_eq!(ToolKind::Go.direction(), Direction::SmallerIsBetter);
        assert_eq!(ToolKind::BenchmarkJs.direction(), Direction::BiggerIsBetter);
        assert_eq!(
            ToolKind::CustomBiggerIsBetter.direction(),
            Direction::BiggerIsBetter
        );
    }
}
