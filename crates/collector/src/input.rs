// Copyright 2025 LLM Observatory Contributors
// SPDX-License-Identifier: Apache-2.0

//! Loading of run inputs handed over by the CI trigger.
//!
//! The trigger writes two JSON files per run: the commit metadata and the
//! harness results already parsed into [`RawBenchmark`] form.

use bench_history_core::{CommitInfo, RawBenchmark};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while reading run inputs.
#[derive(Debug, Error)]
pub enum InputError {
    /// The file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// File being read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON of the expected shape.
    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        /// File being read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}

/// Read commit metadata.
pub async fn read_commit(path: impl AsRef<Path>) -> Result<CommitInfo, InputError> {
    read_json(path.as_ref()).await
}

/// Read raw harness results.
pub async fn read_results(path: impl AsRef<Path>) -> Result<Vec<RawBenchmark>, InputError> {
    read_json(path.as_ref()).await
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, InputError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| InputError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    serde_json::from_str(&content).map_err(|source| InputError::Json {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn test_read_commit_and_results() {
        let dir = tempfile::tempdir().unwrap();
        let commit_path = dir.path().join("commit.json");
        let results_path = dir.path().join("results.json");
        fs::write(
            &commit_path,
            r#"{
                "author": {"email": "dev@example.com", "name": "Dev", "username": "dev"},
                "committer": {"email": "noreply@github.com", "name": "GitHub", "username": "web-flow"},
                "id": "abc123",
                "message": "tune pool",
                "timestamp": "2026-01-04T17:15:21-05:00",
                "url": "https://github.com/example/repo/commit/abc123"
            }"#,
        )
        .unwrap();
        fs::write(
            &results_path,
            r#"[{"name": "BenchmarkThroughput", "value": 528.2, "unit": "ns/op",
                 "iterations": 2294203, "procs": 4,
                 "metrics": [{"value": 0, "unit": "B/op"}, {"value": 0, "unit": "allocs/op"}]}]"#,
        )
        .unwrap();

        let commit = read_commit(&commit_path).await.unwrap();
        assert_eq!(commit.id, "abc123");
        assert_eq!(commit.distinct, None);

        let results = read_results(&results_path).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].metrics.len(), 2);
        assert_eq!(results[0].iterations, Some(2294203));
    }

    #[tokio::test]
    async fn test_missing_and_malformed_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let missing = read_commit(dir.path().join("nope.json")).await.unwrap_err();
        assert!(matches!(missing, InputError::Io { .. }));

        let bad = dir.path().join("bad.json");
        fs::write(&bad, "{\"name\": ").unwrap();
        let malformed = read_results(&bad).await.unwrap_err();
        assert!(matches!(malformed, InputError::Json { .. }));
    }
}
