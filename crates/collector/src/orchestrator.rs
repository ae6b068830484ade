// Copyright 2025 LLM Observatory Contributors
// SPDX-License-Identifier: Apache-2.0

//! Ingestion orchestrator.
//!
//! One call to [`Ingestor::ingest`] takes a run from raw harness output to a
//! stored entry and an [`IngestionReport`]. The duplicate check, the
//! evaluation and the append all happen while holding the group's writer
//! lock, so concurrent ingestions into one group are serialized and every
//! run is compared against exactly the history it extends.

use crate::report::{Disposition, EntryStatus, IngestionReport, RecordReport};
use bench_history_core::{
    normalize_run, BenchmarkRecord, CommitInfo, Entry, Evaluation, NormalizationError, RawBenchmark,
    RegressionConfig, RegressionEvaluator, ToolKind, UnitMismatchError, UnitMismatchPolicy,
    UnknownToolError,
};
use bench_history_storage::{GroupWriter, HistoryStore, StoreError};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Errors that abort an ingestion.
///
/// When any of these is returned nothing was stored.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The request is missing required identity fields.
    #[error("invalid ingestion request: {0}")]
    InvalidRequest(String),

    /// The tool identifier is not recognized.
    #[error(transparent)]
    UnknownTool(#[from] UnknownToolError),

    /// A raw result could not be normalized.
    #[error("normalization failed: {0}")]
    Normalization(#[from] NormalizationError),

    /// A record's unit differs from its series and the policy rejects the run.
    #[error(transparent)]
    UnitMismatch(#[from] UnitMismatchError),

    /// The store could not persist the entry.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl IngestError {
    /// Whether the same request may succeed when retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            IngestError::Store(err) => err.is_retryable(),
            _ => false,
        }
    }
}

/// One run to ingest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    /// Group the run belongs to.
    pub group: String,
    /// Run provenance.
    pub commit: CommitInfo,
    /// Producing harness identifier.
    pub tool: String,
    /// Raw harness output.
    pub results: Vec<RawBenchmark>,
}

/// Source of entry dates.
pub trait Clock: Send + Sync {
    /// Current time in epoch milliseconds.
    fn now_millis(&self) -> i64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Runs ingestions against a shared store.
#[derive(Clone)]
pub struct Ingestor {
    store: Arc<HistoryStore>,
    evaluator: RegressionEvaluator,
    clock: Arc<dyn Clock>,
}

impl Ingestor {
    /// Create an ingestor using the system clock.
    pub fn new(store: Arc<HistoryStore>, config: RegressionConfig) -> Self {
        Self {
            store,
            evaluator: RegressionEvaluator::new(config),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock used for entry dates.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Underlying store.
    pub fn store(&self) -> &Arc<HistoryStore> {
        &self.store
    }

    /// Active regression configuration.
    pub fn config(&self) -> &RegressionConfig {
        self.evaluator.config()
    }

    /// Ingest one run.
    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestionReport, IngestError> {
        match self.ingest_inner(request).await {
            Ok(report) => {
                counter!("bench_history_ingestions_total", "status" => report.status.as_str())
                    .increment(1);
                let regressions = report.regressions().count() as u64;
                if regressions > 0 {
                    counter!("bench_history_regressions_total").increment(regressions);
                }
                Ok(report)
            }
            Err(err) => {
                counter!("bench_history_ingestions_total", "status" => "failed").increment(1);
                Err(err)
            }
        }
    }

    async fn ingest_inner(&self, request: IngestRequest) -> Result<IngestionReport, IngestError> {
        if request.group.trim().is_empty() {
            return Err(IngestError::InvalidRequest("group must not be empty".to_string()));
        }
        if request.commit.id.trim().is_empty() {
            return Err(IngestError::InvalidRequest("commit id must not be empty".to_string()));
        }

        if let Err(err) = request.commit.parsed_timestamp() {
            warn!(
                commit = %request.commit.id,
                timestamp = %request.commit.timestamp,
                error = %err,
                "Commit timestamp is not RFC 3339"
            );
        }

        let tool: ToolKind = request.tool.parse()?;
        let records = normalize_run(&request.results, tool)?;
        debug!(
            group = %request.group,
            commit = %request.commit.id,
            %tool,
            records = records.len(),
            "Run normalized"
        );

        let writer = self.store.lock_group(&request.group).await;
        if let Some(position) = writer.find(&request.commit.id, tool.as_str()) {
            return Ok(self.report_duplicate(&writer, request, tool, records, position));
        }

        let config = self.evaluator.config();
        let mut kept = Vec::with_capacity(records.len());
        let mut reports = Vec::with_capacity(records.len());
        for record in records {
            match self.evaluate(&writer, tool, &record, None) {
                Ok(evaluation) => {
                    reports.push(RecordReport::evaluated(&record, Disposition::Appended, evaluation));
                    kept.push(record);
                }
                Err(mismatch) => {
                    warn!(
                        group = %request.group,
                        commit = %request.commit.id,
                        benchmark = %mismatch.name,
                        expected = %mismatch.expected,
                        found = %mismatch.found,
                        "Unit mismatch"
                    );
                    match config.unit_mismatch {
                        UnitMismatchPolicy::RejectRun => return Err(mismatch.into()),
                        UnitMismatchPolicy::RejectRecord => {
                            reports.push(RecordReport::rejected(&record, &mismatch));
                        }
                    }
                }
            }
        }

        let date = self.clock.now_millis();
        let commit_id = request.commit.id.clone();

        if kept.is_empty() {
            warn!(group = %request.group, commit = %commit_id, %tool, "Every record rejected, nothing stored");
            return Ok(IngestionReport {
                id: Uuid::new_v4(),
                group: request.group,
                tool: tool.as_str().to_string(),
                commit_id,
                date,
                position: None,
                status: EntryStatus::Rejected,
                records: reports,
            });
        }

        let entry = Entry {
            commit: request.commit,
            date,
            tool: tool.as_str().to_string(),
            benches: kept,
        };
        let appended = writer.commit(entry).await?;

        let report = IngestionReport {
            id: Uuid::new_v4(),
            group: request.group,
            tool: tool.as_str().to_string(),
            commit_id,
            date,
            position: Some(appended.position),
            status: EntryStatus::Appended,
            records: reports,
        };
        for regression in report.regressions() {
            if let Some(evaluation) = &regression.evaluation {
                info!(
                    group = %report.group,
                    commit = %report.commit_id,
                    benchmark = %evaluation.name,
                    current = evaluation.current,
                    baseline = ?evaluation.baseline,
                    ratio = ?evaluation.ratio,
                    "Regression detected"
                );
            }
        }
        Ok(report)
    }

    /// Re-evaluate a stored run against the history that preceded it.
    ///
    /// Records kept by the first call are reported from the stored entry.
    /// Records it dropped are evaluated again, so a unit mismatch is
    /// reported the same way twice.
    fn report_duplicate(
        &self,
        writer: &GroupWriter<'_>,
        request: IngestRequest,
        tool: ToolKind,
        incoming: Vec<BenchmarkRecord>,
        position: usize,
    ) -> IngestionReport {
        let stored = &writer.entries()[position];
        debug!(
            group = %writer.group(),
            commit = %request.commit.id,
            %tool,
            position,
            "Run already ingested"
        );

        // Stored records stand in for their incoming counterparts.
        let mut candidates: Vec<(&BenchmarkRecord, bool)> = incoming
            .iter()
            .map(|record| {
                match stored.benches.iter().find(|kept| kept.name == record.name) {
                    Some(kept) => (kept, true),
                    None => (record, false),
                }
            })
            .collect();
        candidates.extend(
            stored
                .benches
                .iter()
                .filter(|kept| !incoming.iter().any(|record| record.name == kept.name))
                .map(|kept| (kept, true)),
        );

        let records = candidates
            .into_iter()
            .map(|(record, kept)| {
                match self.evaluate(writer, tool, record, Some(position)) {
                    Ok(evaluation) => {
                        RecordReport::evaluated(record, Disposition::Duplicate, evaluation)
                    }
                    Err(mismatch) if !kept => RecordReport::rejected(record, &mismatch),
                    Err(mismatch) => RecordReport {
                        disposition: Disposition::Duplicate,
                        ..RecordReport::rejected(record, &mismatch)
                    },
                }
            })
            .collect();

        IngestionReport {
            id: Uuid::new_v4(),
            group: request.group,
            tool: tool.as_str().to_string(),
            commit_id: request.commit.id,
            date: stored.date,
            position: Some(position),
            status: EntryStatus::Duplicate,
            records,
        }
    }

    fn evaluate(
        &self,
        writer: &GroupWriter<'_>,
        tool: ToolKind,
        record: &BenchmarkRecord,
        before: Option<usize>,
    ) -> Result<Evaluation, UnitMismatchError> {
        let config = self.evaluator.config();
        let history = writer
            .series_before(tool.as_str(), &record.name, before, Some(config.window_size))
            .points();
        self.evaluator
            .evaluate(&history, record, config.direction_for(record, tool))
    }
}
