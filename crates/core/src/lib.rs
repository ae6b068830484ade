// Copyright 2025 LLM Observatory Contributors
// SPDX-License-Identifier: Apache-2.0

//! Core types for benchmark history tracking.
//!
//! This crate holds everything that does not touch storage or I/O: the
//! persisted data model, normalization of harness output into canonical
//! records, and the regression evaluator.
//!
//! # Modules
//!
//! - [`model`] - `HistoryDocument`, `Entry`, `BenchmarkRecord` and friends
//! - [`tool`] - recognized harnesses and metric directionality
//! - [`normalize`] - harness output to canonical records, with metric fan-out
//! - [`evaluate`] - baseline comparison and verdicts
//! - [`config`] - regression thresholds and windows

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod config;
pub mod evaluate;
pub mod model;
pub mod normalize;
pub mod tool;

pub use config::{BaselineStrategy, ConfigError, RegressionConfig, UnitMismatchPolicy};
pub use evaluate::{Evaluation, RegressionEvaluator, UnitMismatchError, Verdict};
pub use model::{
    BenchmarkRecord, CommitInfo, Entry, Extra, HistoryDocument, Person, SeriesPoint, Unit,
    DEFAULT_GROUP,
};
pub use normalize::{normalize, normalize_run, NormalizationError, RawBenchmark, RawMetric, RawValue};
pub use tool::{Direction, ToolKind, UnknownToolError};
