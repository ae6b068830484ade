// Copyright 2025 LLM Observatory Contributors
// SPDX-License-Identifier: Apache-2.0

//! Benchmark history data model.
//!
//! These types mirror the persisted history document consumed by the
//! benchmark dashboard:
//!
//! ```text
//! HistoryDocument
//!   └─ entries[group]
//!       └─ Entry (one per commit + tool)
//!           └─ BenchmarkRecord (one per metric)
//! ```
//!
//! A series (all records sharing `(tool, name)` within a group) is never
//! stored on its own; it is derived on read from the entry sequence.

use crate::tool::Direction;
use chrono::{DateTime, FixedOffset};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Default group key used by the dashboard when a run does not name one.
pub const DEFAULT_GROUP: &str = "Benchmark";

/// Error returned when a unit string is empty.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("benchmark unit must not be empty")]
pub struct InvalidUnit;

/// Measurement unit of a benchmark record.
///
/// The full string is preserved as reported. Comparability between two
/// records is decided on the *base unit*, the first whitespace-delimited
/// token, so that composite units such as
/// `"ns/op\t       0 B/op\t       0 allocs/op"` still line up with `"ns/op"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Unit(String);

impl Unit {
    /// Create a unit, rejecting blank strings.
    pub fn new(unit: impl Into<String>) -> Result<Self, InvalidUnit> {
        let unit = unit.into();
        if unit.trim().is_empty() {
            return Err(InvalidUnit);
        }
        Ok(Self(unit))
    }

    /// The unit exactly as reported.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The base unit used for comparability checks.
    pub fn base(&self) -> &str {
        self.0.split_whitespace().next().unwrap_or(self.0.as_str())
    }

    /// Whether values in `self` and `other` can be compared directly.
    pub fn is_compatible(&self, other: &Unit) -> bool {
        self.base() == other.base()
    }
}

impl TryFrom<String> for Unit {
    type Error = InvalidUnit;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Unit::new(value)
    }
}

impl From<Unit> for String {
    fn from(unit: Unit) -> Self {
        unit.0
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

static SAMPLES_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+) times(?:\n(\d+) procs)?$").expect("samples pattern is valid")
});

/// Free-form metadata attached to a record.
///
/// Persisted as a plain string; the sample-count shape emitted by iteration
/// based harnesses is recognized and kept typed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Extra {
    /// Iteration count and parallelism of the measurement.
    Samples {
        /// Number of iterations the harness ran.
        iterations: u64,
        /// Number of processors used, when reported.
        procs: Option<u32>,
    },
    /// Anything else, kept verbatim.
    Text(String),
}

impl Extra {
    /// Parse a persisted extra string.
    ///
    /// Only strings that render back identically are read as samples, so the
    /// persisted text never changes on a load/save cycle.
    pub fn parse(raw: &str) -> Self {
        if let Some(caps) = SAMPLES_RE.captures(raw) {
            let iterations = caps[1].parse::<u64>().ok();
            let procs = match caps.get(2) {
                Some(m) => m.as_str().parse::<u32>().ok().map(Some),
                None => Some(None),
            };
            if let (Some(iterations), Some(procs)) = (iterations, procs) {
                let samples = Extra::Samples { iterations, procs };
                if samples.to_string() == raw {
                    return samples;
                }
            }
        }
        Extra::Text(raw.to_string())
    }
}

impl From<String> for Extra {
    fn from(raw: String) -> Self {
        Extra::parse(&raw)
    }
}

impl From<Extra> for String {
    fn from(extra: Extra) -> Self {
        extra.to_string()
    }
}

impl fmt::Display for Extra {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Extra::Samples {
                iterations,
                procs: Some(procs),
            } => write!(f, "{} times\n{} procs", iterations, procs),
            Extra::Samples {
                iterations,
                procs: None,
            } => write!(f, "{} times", iterations),
            Extra::Text(text) => f.write_str(text),
        }
    }
}

/// Serializes integral floats as JSON integers, matching the dashboard data.
mod number {
    use serde::Serializer;

    /// Largest integer exactly representable by an `f64`.
    const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() && value.fract() == 0.0 && value.abs() <= MAX_SAFE_INTEGER {
            serializer.serialize_i64(*value as i64)
        } else {
            serializer.serialize_f64(*value)
        }
    }
}

/// One measured metric from one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRecord {
    /// Benchmark name, unique within a run and tool.
    pub name: String,
    /// Measured value.
    #[serde(serialize_with = "number::serialize")]
    pub value: f64,
    /// Unit of `value`.
    pub unit: Unit,
    /// Variance or confidence range as reported by the harness.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
    /// Additional metadata such as sample counts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Extra>,
    /// Direction, when it differs from the tool's.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
}

impl BenchmarkRecord {
    /// Create a record without range or extra metadata.
    pub fn new(name: impl Into<String>, value: f64, unit: Unit) -> Self {
        Self {
            name: name.into(),
            value,
            unit,
            range: None,
            extra: None,
            direction: None,
        }
    }

    /// Attach extra metadata.
    pub fn with_extra(mut self, extra: Extra) -> Self {
        self.extra = Some(extra);
        self
    }

    /// Pin the direction of this record.
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    /// Attach a range string.
    pub fn with_range(mut self, range: impl Into<String>) -> Self {
        self.range = Some(range.into());
        self
    }
}

/// Author or committer identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    /// Email address.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Forge handle, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Provenance of a benchmark run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    /// Commit author.
    pub author: Person,
    /// Commit committer.
    pub committer: Person,
    /// Whether the commit was distinct in the triggering push.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distinct: Option<bool>,
    /// Commit hash; the primary identity of an entry.
    pub id: String,
    /// Commit message.
    pub message: String,
    /// ISO-8601 commit timestamp, kept as reported.
    pub timestamp: String,
    /// Tree hash of the commit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree_id: Option<String>,
    /// Browsable URL of the commit.
    pub url: String,
}

impl CommitInfo {
    /// Parse the commit timestamp.
    pub fn parsed_timestamp(&self) -> Result<DateTime<FixedOffset>, chrono::ParseError> {
        DateTime::parse_from_rfc3339(&self.timestamp)
    }
}

/// One run's full result set; the unit of append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Run provenance.
    pub commit: CommitInfo,
    /// Ingestion time in epoch milliseconds.
    pub date: i64,
    /// Harness that produced the results.
    pub tool: String,
    /// Records in harness order.
    pub benches: Vec<BenchmarkRecord>,
}

impl Entry {
    /// Whether this entry is identified by `(commit_id, tool)`.
    pub fn is_identified_by(&self, commit_id: &str, tool: &str) -> bool {
        self.commit.id == commit_id && self.tool == tool
    }
}

/// One point of a derived series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    /// Entry date in epoch milliseconds.
    pub date: i64,
    /// Recorded value.
    pub value: f64,
    /// Recorded unit.
    pub unit: Unit,
    /// Commit the value was measured at.
    pub commit_id: String,
    /// Position of the owning entry within its group.
    pub position: usize,
}

/// Root of the persisted history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryDocument {
    /// Date of the most recent append, epoch milliseconds.
    pub last_update: i64,
    /// Repository the history belongs to.
    pub repo_url: String,
    /// Entries per group, in append order.
    #[serde(default)]
    pub entries: BTreeMap<String, Vec<Entry>>,
}

impl HistoryDocument {
    /// Create an empty document.
    pub fn new(repo_url: impl Into<String>) -> Self {
        Self {
            last_update: 0,
            repo_url: repo_url.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Entries of a group, empty when the group does not exist.
    pub fn group(&self, group: &str) -> &[Entry] {
        self.entries.get(group).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total number of entries across all groups.
    pub fn entry_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Check the invariants a loaded document must satisfy.
    ///
    /// Returns a description of the first violation.
    pub fn check_integrity(&self) -> Result<(), String> {
        let mut newest = None::<i64>;
        for (group, entries) in &self.entries {
            for (position, entry) in entries.iter().enumerate() {
                if entry.commit.id.is_empty() {
                    return Err(format!("{}[{}]: empty commit id", group, position));
                }
                let duplicate = entries[..position]
                    .iter()
                    .any(|earlier| earlier.is_identified_by(&entry.commit.id, &entry.tool));
                if duplicate {
                    return Err(format!(
                        "{}[{}]: duplicate entry for commit {} and tool {}",
                        group, position, entry.commit.id, entry.tool
                    ));
                }
                if let Some(bench) = entry.benches.iter().find(|b| !b.value.is_finite()) {
                    return Err(format!(
                        "{}[{}]: non-finite value for '{}'",
                        group, position, bench.name
                    ));
                }
                newest = Some(newest.map_or(entry.date, |d| d.max(entry.date)));
            }
        }
        match newest {
            Some(newest) if self.last_update < newest => Err(format!(
                "lastUpdate {} is older than newest entry date {}",
                self.last_update, newest
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTIFACT_ENTRY: &str = r#"{
        "commit": {
            "author": {"email": "dev@example.com", "name": "Dev", "username": "dev"},
            "committer": {"email": "dev@example.com", "name": "Dev", "username": "dev"},
            "distinct": true,
            "id": "e53b4318f700059faf73151ff0b77467f5983534",
            "message": "add a new workflow for benchmarking",
            "timestamp": "2026-01-04T17:15:21-05:00",
            "tree_id": "a5b06c04d7ba283a502cbee2ac2fe45e23873407",
            "url": "https://example.com/commit/e53b4318"
        },
        "date": 1767565058698,
        "tool": "go",
        "benches": [
            {"name": "BenchmarkThroughput", "value": 528.2,
             "unit": "ns/op\t       0 B/op\t       0 allocs/op",
             "extra": "2294203 times\n4 procs"},
            {"name": "BenchmarkThroughput - B/op", "value": 0, "unit": "B/op",
             "extra": "2294203 times\n4 procs"}
        ]
    }"#;

    #[test]
    fn test_unit_base_strips_composite_suffix() {
        let composite = Unit::new("ns/op\t       0 B/op\t       0 allocs/op").unwrap();
        let plain = Unit::new("ns/op").unwrap();
        assert_eq!(composite.base(), "ns/op");
        assert!(composite.is_compatible(&plain));
        assert!(!plain.is_compatible(&Unit::new("ms/op").unwrap()));
    }

    #[test]
    fn test_blank_unit_rejected() {
        assert_eq!(Unit::new("  "), Err(InvalidUnit));
    }

    #[test]
    fn test_extra_parses_samples() {
        assert_eq!(
            Extra::parse("2294203 times\n4 procs"),
            Extra::Samples {
                iterations: 2294203,
                procs: Some(4)
            }
        );
        assert_eq!(
            Extra::parse("100 times"),
            Extra::Samples {
                iterations: 100,
                procs: None
            }
        );
        assert_eq!(
            Extra::parse("concurrency=8"),
            Extra::Text("concurrency=8".to_string())
        );
    }

    #[test]
    fn test_entry_matches_artifact_layout() {
        let entry: Entry = serde_json::from_str(ARTIFACT_ENTRY).unwrap();
        assert_eq!(entry.tool, "go");
        assert_eq!(entry.commit.tree_id.as_deref(), Some("a5b06c04d7ba283a502cbee2ac2fe45e23873407"));
        assert!(entry.commit.parsed_timestamp().is_ok());

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["benches"][1]["value"], serde_json::json!(0));
        assert_eq!(value["benches"][0]["value"], serde_json::json!(528.2));
        assert_eq!(value["benches"][0]["extra"], "2294203 times\n4 procs");
        assert!(value["benches"][0].get("range").is_none());
    }

    #[test]
    fn test_document_integrity_flags_stale_last_update() {
        let entry: Entry = serde_json::from_str(ARTIFACT_ENTRY).unwrap();
        let mut doc = HistoryDocument::new("https://example.com/repo");
        doc.entries.insert(DEFAULT_GROUP.to_string(), vec![entry.clone()]);
        assert!(doc.check_integrity().is_err());

        doc.last_update = entry.date;
        assert!(doc.check_integrity().is_ok());

        doc.entries.get_mut(DEFAULT_GROUP).unwrap().push(entry);
        let err = doc.check_integrity().unwrap_err();
        assert!(err.contains("duplicate entry"));
    }

    #[test]
    fn test_document_uses_camel_case_keys() {
        let doc = HistoryDocument::new("https://example.com/repo");
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["lastUpdate"], 0);
        assert_eq!(value["repoUrl"], "https://example.com/repo");
        assert!(value["entries"].as_object().unwrap().is_empty());
    }
}
