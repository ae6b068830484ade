// Copyright 2025 LLM Observatory Contributors
// SPDX-License-Identifier: Apache-2.0

//! Benchmark history storage.
//!
//! [`HistoryStore`] keeps the append-only history in memory and persists the
//! whole document through a [`HistoryBackend`] on every append. Benchmark
//! series are derived on read.
//!
//! # Example
//!
//! ```no_run
//! use bench_history_storage::{FileBackend, HistoryStore, StoreOptions};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), bench_history_storage::StoreError> {
//! let backend = Arc::new(FileBackend::new("dev/bench/data.js"));
//! let store = HistoryStore::open(backend, StoreOptions::new("https://github.com/org/repo")).await?;
//!
//! for point in store.query("Benchmark", "go", "BenchmarkThroughput", Some(20)).iter() {
//!     println!("{} {} {}", point.commit_id, point.value, point.unit);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod backend;
pub mod error;
pub mod series;
pub mod store;

pub use backend::{FileBackend, FileFormat, HistoryBackend, MemoryBackend, DATA_JS_PREFIX};
pub use error::{Result, StoreError};
pub use series::Series;
pub use store::{AppendResult, AppendStatus, GroupWriter, HistoryStore, StoreOptions, DEFAULT_IO_TIMEOUT};

use bench_history_core::{
    BenchmarkRecord, Evaluation, RegressionConfig, RegressionEvaluator, ToolKind, UnitMismatchError,
};

/// Evaluate `record` against the stored history of its series.
///
/// The record is not stored. Use this to check a result before deciding
/// whether to append it.
pub fn evaluate(
    store: &HistoryStore,
    group: &str,
    tool: ToolKind,
    record: &BenchmarkRecord,
    config: &RegressionConfig,
) -> std::result::Result<Evaluation, UnitMismatchError> {
    let history = store
        .query(group, tool.as_str(), &record.name, Some(config.window_size))
        .points();
    RegressionEvaluator::new(config.clone()).evaluate(
        &history,
        record,
        config.direction_for(record, tool),
    )
}
