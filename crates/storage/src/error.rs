// Copyright 2025 LLM Observatory Contributors
// SPDX-License-Identifier: Apache-2.0

//! Storage errors.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while reading or writing benchmark history.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Failure reported by a non-file backend.
    #[error("backend failure: {0}")]
    Backend(String),

    /// The document could not be encoded.
    #[error("failed to serialize history document: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The persisted document is unreadable or violates its invariants.
    #[error("history document is corrupt: {0}")]
    Corrupt(String),

    /// A backend call exceeded its time bound.
    #[error("{operation} did not complete within {after:?}")]
    Timeout {
        /// Operation that timed out.
        operation: &'static str,
        /// Configured bound.
        after: Duration,
    },
}

impl StoreError {
    /// Whether retrying the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::Io { .. } | StoreError::Backend(_) | StoreError::Timeout { .. }
        )
    }
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;
