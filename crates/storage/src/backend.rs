// Copyright 2025 LLM Observatory Contributors
// SPDX-License-Identifier: Apache-2.0

//! Durability backends for the history document.
//!
//! The whole document is the unit of persistence. Two encodings are
//! supported by [`FileBackend`]:
//!
//! - `*.json` - the bare document
//! - `*.js` - `window.BENCHMARK_DATA = {...}`, loaded directly by the dashboard

use crate::error::{Result, StoreError};
use async_trait::async_trait;
use bench_history_core::HistoryDocument;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Assignment prefix of the dashboard's `data.js`.
pub const DATA_JS_PREFIX: &str = "window.BENCHMARK_DATA = ";

/// Storage for the serialized history document.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HistoryBackend: Send + Sync {
    /// Load the document, `None` when nothing has been persisted yet.
    async fn load(&self) -> Result<Option<HistoryDocument>>;

    /// Replace the persisted document.
    async fn save(&self, document: &HistoryDocument) -> Result<()>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

/// On-disk encoding of the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// Plain JSON.
    Json,
    /// JavaScript assignment consumed by the dashboard.
    DataJs,
}

impl FileFormat {
    /// Pick the format from the file extension.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("js") => FileFormat::DataJs,
            _ => FileFormat::Json,
        }
    }

    /// Encode a document.
    ///
    /// `data.js` is written exactly as the dashboard tooling writes it, with
    /// no trailing newline.
    pub fn encode(&self, document: &HistoryDocument) -> Result<String> {
        let body = serde_json::to_string_pretty(document)?;
        Ok(match self {
            FileFormat::Json => format!("{}\n", body),
            FileFormat::DataJs => format!("{}{}", DATA_JS_PREFIX, body),
        })
    }

    /// Decode a document.
    pub fn decode(&self, text: &str) -> Result<HistoryDocument> {
        let body = match self {
            FileFormat::Json => text.trim(),
            FileFormat::DataJs => text
                .trim()
                .strip_prefix(DATA_JS_PREFIX.trim_end())
                .ok_or_else(|| {
                    StoreError::Corrupt(format!("missing '{}' prefix", DATA_JS_PREFIX.trim_end()))
                })?
                .trim()
                .trim_end_matches(';'),
        };
        serde_json::from_str(body).map_err(|err| StoreError::Corrupt(err.to_string()))
    }
}

/// Document stored in a single file, replaced atomically on save.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
    format: FileFormat,
}

impl FileBackend {
    /// Backend for `path`, format chosen by extension.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = FileFormat::from_path(&path);
        Self { path, format }
    }

    /// Sibling written before the rename, e.g. `data.js.tmp`.
    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(OsString::from).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, path: &Path, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[async_trait]
impl HistoryBackend for FileBackend {
    async fn load(&self) -> Result<Option<HistoryDocument>> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(self.io_error(&self.path, err)),
        };
        self.format.decode(&text).map(Some)
    }

    async fn save(&self, document: &HistoryDocument) -> Result<()> {
        let contents = self.format.encode(document)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| self.io_error(parent, err))?;
        }

        // The rename is the commit point; an interrupted write leaves the old file.
        let temp_path = self.temp_path();
        let mut file = tokio::fs::File::create(&temp_path)
            .await
            .map_err(|err| self.io_error(&temp_path, err))?;
        file.write_all(contents.as_bytes())
            .await
            .map_err(|err| self.io_error(&temp_path, err))?;
        file.sync_all()
            .await
            .map_err(|err| self.io_error(&temp_path, err))?;
        drop(file);
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|err| self.io_error(&self.path, err))?;

        debug!(path = %self.path.display(), bytes = contents.len(), "History document written");
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Process-local backend for tests and embedding.
///
/// Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    document: Arc<Mutex<Option<HistoryDocument>>>,
    saves: Arc<AtomicUsize>,
}

impl MemoryBackend {
    /// Empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend pre-populated with a document.
    pub fn with_document(document: HistoryDocument) -> Self {
        Self {
            document: Arc::new(Mutex::new(Some(document))),
            saves: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Last saved document.
    pub fn stored(&self) -> Option<HistoryDocument> {
        self.document
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HistoryBackend for MemoryBackend {
    async fn load(&self) -> Result<Option<HistoryDocument>> {
        Ok(self.stored())
    }

    async fn save(&self, document: &HistoryDocument) -> Result<()> {
        *self
            .document
            .lock()
            .map_err(|_| StoreError::Backend("memory backend mutex poisoned".to_string()))? =
            Some(document.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
