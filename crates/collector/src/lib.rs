// Copyright 2025 LLM Observatory Contributors
// SPDX-License-Identifier: Apache-2.0

//! Benchmark run ingestion.
//!
//! The [`Ingestor`] takes one run's commit metadata and raw harness results,
//! normalizes them, appends them to a [`HistoryStore`](bench_history_storage::HistoryStore)
//! and compares every record against its history. The resulting
//! [`IngestionReport`] can be rendered with [`markdown`] for alert delivery.
//!
//! # Example
//!
//! ```no_run
//! use bench_history_collector::{input, markdown, IngestRequest, Ingestor};
//! use bench_history_core::RegressionConfig;
//! use bench_history_storage::{FileBackend, HistoryStore, StoreOptions};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = HistoryStore::open(
//!     Arc::new(FileBackend::new("dev/bench/data.js")),
//!     StoreOptions::default(),
//! )
//! .await?;
//! let ingestor = Ingestor::new(Arc::new(store), RegressionConfig::default());
//!
//! let report = ingestor
//!     .ingest(IngestRequest {
//!         group: "Benchmark".to_string(),
//!         commit: input::read_commit("commit.json").await?,
//!         tool: "go".to_string(),
//!         results: input::read_results("results.json").await?,
//!     })
//!     .await?;
//!
//! if let Some(alert) = markdown::render_alert(&report, ingestor.config().alert_threshold) {
//!     println!("{}", alert);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod input;
pub mod markdown;
pub mod orchestrator;
pub mod report;

pub use input::{read_commit, read_results, InputError};
pub use orchestrator::{Clock, IngestError, IngestRequest, Ingestor, SystemClock};
pub use report::{Disposition, EntryStatus, IngestionReport, RecordReport};
