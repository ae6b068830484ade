// Copyright 2025 LLM Observatory Contributors
// SPDX-License-Identifier: Apache-2.0

//! Append-only history store.
//!
//! Entries are grouped by suite name. Each group has one writer at a time
//! and any number of readers; readers work on immutable snapshots and never
//! observe a partially applied append.
//!
//! An append becomes visible only after the backend has accepted the new
//! document. If the save fails, times out, or the calling future is dropped,
//! the in-memory state is left as it was.

use crate::backend::{HistoryBackend, MemoryBackend};
use crate::error::{Result, StoreError};
use crate::series::Series;
use bench_history_core::{BenchmarkRecord, Entry, HistoryDocument};
use dashmap::DashMap;
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

/// Default bound on a single backend call.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(10);

/// Options for opening a store.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Repository URL written into a new document.
    pub repo_url: String,
    /// Bound on each backend load or save.
    pub io_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            repo_url: String::new(),
            io_timeout: DEFAULT_IO_TIMEOUT,
        }
    }
}

impl StoreOptions {
    /// Options for a repository.
    pub fn new(repo_url: impl Into<String>) -> Self {
        Self {
            repo_url: repo_url.into(),
            ..Self::default()
        }
    }

    /// Set the backend time bound.
    pub fn with_io_timeout(mut self, io_timeout: Duration) -> Self {
        self.io_timeout = io_timeout;
        self
    }
}

/// Outcome of an append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppendStatus {
    /// A new entry was stored.
    Appended,
    /// An entry with the same commit and tool already existed; nothing changed.
    Duplicate,
}

/// Result of [`HistoryStore::append`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AppendResult {
    /// Position of the stored entry within its group.
    pub position: usize,
    /// Whether the entry was new.
    pub status: AppendStatus,
}

struct GroupState {
    writer: Arc<Mutex<()>>,
    snapshot: RwLock<Arc<Vec<Entry>>>,
}

impl GroupState {
    fn new(entries: Vec<Entry>) -> Self {
        Self {
            writer: Arc::new(Mutex::new(())),
            snapshot: RwLock::new(Arc::new(entries)),
        }
    }

    // The lock only guards an Arc swap, so a poisoned lock still holds a
    // consistent snapshot.
    fn snapshot(&self) -> Arc<Vec<Entry>> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn publish(&self, entries: Arc<Vec<Entry>>) {
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = entries;
    }
}

/// Benchmark history, grouped by suite.
pub struct HistoryStore {
    backend: Arc<dyn HistoryBackend>,
    groups: DashMap<String, Arc<GroupState>>,
    /// Last persisted document; its lock serializes saves across groups.
    durable: Mutex<HistoryDocument>,
    last_update: AtomicI64,
    repo_url: String,
    io_timeout: Duration,
}

impl std::fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryStore")
            .field("backend", &self.backend.describe())
            .field("groups", &self.groups.len())
            .field("last_update", &self.last_update())
            .finish()
    }
}

impl HistoryStore {
    /// Open a store, loading any persisted document from `backend`.
    pub async fn open(backend: Arc<dyn HistoryBackend>, options: StoreOptions) -> Result<Self> {
        let loaded = bounded(options.io_timeout, "load", backend.load()).await?;
        let document = match loaded {
            Some(document) => {
                document.check_integrity().map_err(StoreError::Corrupt)?;
                document
            }
            None => {
                debug!(backend = %backend.describe(), "No persisted history, starting empty");
                HistoryDocument::new(options.repo_url.clone())
            }
        };

        if !options.repo_url.is_empty() && document.repo_url != options.repo_url {
            warn!(
                persisted = %document.repo_url,
                configured = %options.repo_url,
                "Persisted repository URL differs from configuration"
            );
        }

        info!(
            backend = %backend.describe(),
            groups = document.entries.len(),
            entries = document.entry_count(),
            "History store opened"
        );
        Ok(Self::from_document(backend, document, options.io_timeout))
    }

    /// Empty store backed by memory.
    pub fn in_memory(repo_url: impl Into<String>) -> Self {
        Self::from_document(
            Arc::new(MemoryBackend::new()),
            HistoryDocument::new(repo_url),
            DEFAULT_IO_TIMEOUT,
        )
    }

    fn from_document(
        backend: Arc<dyn HistoryBackend>,
        document: HistoryDocument,
        io_timeout: Duration,
    ) -> Self {
        let groups = DashMap::new();
        for (name, entries) in &document.entries {
            groups.insert(name.clone(), Arc::new(GroupState::new(entries.clone())));
        }
        Self {
            backend,
            groups,
            last_update: AtomicI64::new(document.last_update),
            repo_url: document.repo_url.clone(),
            durable: Mutex::new(document),
            io_timeout,
        }
    }

    /// Repository the history belongs to.
    pub fn repo_url(&self) -> &str {
        &self.repo_url
    }

    /// Date of the most recent append, epoch milliseconds.
    pub fn last_update(&self) -> i64 {
        self.last_update.load(Ordering::SeqCst)
    }

    /// Names of groups holding at least one entry, sorted.
    pub fn groups(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .groups
            .iter()
            .filter(|group| !group.value().snapshot().is_empty())
            .map(|group| group.key().clone())
            .collect();
        names.sort();
        names
    }

    /// Snapshot of a group's entries in append order.
    pub fn entries(&self, group: &str) -> Arc<Vec<Entry>> {
        self.groups
            .get(group)
            .map(|state| state.snapshot())
            .unwrap_or_default()
    }

    /// Copy of the last persisted document.
    pub async fn document(&self) -> HistoryDocument {
        self.durable.lock().await.clone()
    }

    /// Append an entry, or report the existing one for the same commit and tool.
    pub async fn append(&self, group: &str, entry: Entry) -> Result<AppendResult> {
        let writer = self.lock_group(group).await;
        if let Some(position) = writer.find(&entry.commit.id, &entry.tool) {
            debug!(
                group,
                commit = %entry.commit.id,
                tool = %entry.tool,
                position,
                "Duplicate entry ignored"
            );
            return Ok(AppendResult {
                position,
                status: AppendStatus::Duplicate,
            });
        }
        writer.commit(entry).await
    }

    /// Series of one benchmark, oldest first, limited to the newest `max_points`.
    pub fn query(&self, group: &str, tool: &str, name: &str, max_points: Option<usize>) -> Series {
        Series::build(self.entries(group), tool, name, None, max_points)
    }

    /// Most recent record of one benchmark.
    pub fn latest(&self, group: &str, tool: &str, name: &str) -> Option<BenchmarkRecord> {
        self.query(group, tool, name, Some(1))
            .latest_record()
            .cloned()
    }

    /// Take exclusive write access to a group.
    ///
    /// Reads made through the returned writer see exactly the state its
    /// commit will extend.
    pub async fn lock_group(&self, group: &str) -> GroupWriter<'_> {
        let state = self
            .groups
            .entry(group.to_string())
            .or_insert_with(|| Arc::new(GroupState::new(Vec::new())))
            .value()
            .clone();
        let guard = state.writer.clone().lock_owned().await;
        let entries = state.snapshot();
        GroupWriter {
            store: self,
            group: group.to_string(),
            state,
            entries,
            _guard: guard,
        }
    }
}

/// Exclusive write access to one group.
pub struct GroupWriter<'a> {
    store: &'a HistoryStore,
    group: String,
    state: Arc<GroupState>,
    entries: Arc<Vec<Entry>>,
    _guard: OwnedMutexGuard<()>,
}

impl GroupWriter<'_> {
    /// Group being written.
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Current entries of the group.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Position of the entry for `(commit_id, tool)`, if present.
    pub fn find(&self, commit_id: &str, tool: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.is_identified_by(commit_id, tool))
    }

    /// Series of one benchmark over the entries stored before `position`,
    /// or over all entries when `position` is `None`.
    pub fn series_before(
        &self,
        tool: &str,
        name: &str,
        position: Option<usize>,
        max_points: Option<usize>,
    ) -> Series {
        Series::build(self.entries.clone(), tool, name, position, max_points)
    }

    /// Persist `entry` at the end of the group and publish it.
    pub async fn commit(self, entry: Entry) -> Result<AppendResult> {
        let position = self.entries.len();
        let commit_id = entry.commit.id.clone();
        let tool = entry.tool.clone();
        let mut durable = self.store.durable.lock().await;

        let mut next = durable.clone();
        next.entries
            .entry(self.group.clone())
            .or_default()
            .push(entry.clone());
        next.last_update = next.last_update.max(entry.date);

        let mut published = Vec::with_capacity(position + 1);
        published.extend_from_slice(&self.entries);
        published.push(entry);

        if let Err(err) = bounded(
            self.store.io_timeout,
            "save",
            self.store.backend.save(&next),
        )
        .await
        {
            warn!(group = %self.group, commit = %commit_id, error = %err, "Failed to persist history");
            return Err(err);
        }

        // No await past this point: memory must follow the completed save.
        let last_update = next.last_update;
        *durable = next;
        self.state.publish(Arc::new(published));
        self.store.last_update.store(last_update, Ordering::SeqCst);
        drop(durable);

        info!(
            group = %self.group,
            commit = %commit_id,
            tool = %tool,
            position,
            "Entry appended"
        );
        Ok(AppendResult {
            position,
            status: AppendStatus::Appended,
        })
    }
}

async fn bounded<T, F>(after: Duration, operation: &'static str, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(after, future)
        .await
        .map_err(|_| StoreError::Timeout { operation, after })?
}
