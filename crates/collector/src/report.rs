// Copyright 2025 LLM Observatory Contributors
// SPDX-License-Identifier: Apache-2.0

//! Ingestion reports.

use bench_history_core::{BenchmarkRecord, Evaluation, UnitMismatchError, Verdict};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What happened to the run as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// A new entry was stored.
    Appended,
    /// The run was already stored; nothing changed.
    Duplicate,
    /// Every record was rejected; nothing was stored.
    Rejected,
}

impl EntryStatus {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Appended => "appended",
            EntryStatus::Duplicate => "duplicate",
            EntryStatus::Rejected => "rejected",
        }
    }
}

/// What happened to one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Stored as part of the new entry.
    Appended,
    /// Already stored by an earlier ingestion of the same run.
    Duplicate,
    /// Dropped from the entry.
    Rejected,
}

/// Outcome for one normalized record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordReport {
    /// Benchmark name.
    pub name: String,
    /// Measured value.
    pub value: f64,
    /// Measured unit.
    pub unit: String,
    /// Whether the record was stored.
    pub disposition: Disposition,
    /// Comparison against history, absent for rejected records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<Evaluation>,
    /// Reason for rejection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RecordReport {
    pub(crate) fn evaluated(
        record: &BenchmarkRecord,
        disposition: Disposition,
        evaluation: Evaluation,
    ) -> Self {
        Self {
            name: record.name.clone(),
            value: record.value,
            unit: record.unit.to_string(),
            disposition,
            evaluation: Some(evaluation),
            error: None,
        }
    }

    pub(crate) fn rejected(record: &BenchmarkRecord, error: &UnitMismatchError) -> Self {
        Self {
            name: record.name.clone(),
            value: record.value,
            unit: record.unit.to_string(),
            disposition: Disposition::Rejected,
            evaluation: None,
            error: Some(error.to_string()),
        }
    }

    /// Verdict, when the record was evaluated.
    pub fn verdict(&self) -> Option<Verdict> {
        self.evaluation.as_ref().map(|e| e.verdict)
    }

    /// Whether the record regressed.
    pub fn is_regression(&self) -> bool {
        self.evaluation.as_ref().is_some_and(Evaluation::is_regression)
    }
}

/// Structured result of one ingestion, for alert routing and rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionReport {
    /// Unique report identifier.
    pub id: Uuid,
    /// Group the run belongs to.
    pub group: String,
    /// Producing harness.
    pub tool: String,
    /// Commit the run was measured at.
    pub commit_id: String,
    /// Entry date in epoch milliseconds.
    pub date: i64,
    /// Position of the entry within its group, when stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
    /// Outcome of the run.
    pub status: EntryStatus,
    /// Per-record outcomes, in harness order.
    pub records: Vec<RecordReport>,
}

impl IngestionReport {
    /// Records whose verdict is REGRESSED.
    pub fn regressions(&self) -> impl Iterator<Item = &RecordReport> + '_ {
        self.records.iter().filter(|r| r.is_regression())
    }

    /// Whether any record regressed.
    pub fn has_regressions(&self) -> bool {
        self.regressions().next().is_some()
    }

    /// Records dropped from the entry.
    pub fn rejected(&self) -> impl Iterator<Item = &RecordReport> + '_ {
        self.records
            .iter()
            .filter(|r| r.disposition == Disposition::Rejected)
    }
}
