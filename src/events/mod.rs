//! # Event Log
//!
//! Process-wide history of operational events. Every component writes to the same
//! [`EventLog`] (shared behind an `Arc`), and the HTTP layer serves its snapshot.
//!
//! Each [`record`](EventLog::record) does three things:
//!
//! 1. Prepends the entry to an in-memory buffer capped at [`DEFAULT_CAPACITY`] entries.
//!    The oldest entry is evicted first.
//! 2. Appends one JSON line to the audit file. The file is only ever appended to.
//! 3. Mirrors the entry to `tracing` at the matching level.
//!
//! The audit file is observability, not state: a failed append is reported with
//! `tracing::error!` and swallowed, it never reaches the caller.

use crate::model::{EventType, LogEntry};
use chrono::Utc;
use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{error, info, warn};

/// Number of entries kept in memory.
pub const DEFAULT_CAPACITY: usize = 50;

struct LogState {
    entries: VecDeque<LogEntry>,
    last_id: i64,
}

/// Bounded, newest-first event history mirrored to an append-only audit file.
pub struct EventLog {
    state: Mutex<LogState>,
    capacity: usize,
    audit_path: Option<PathBuf>,
}

impl EventLog {
    /// Creates a log that mirrors every entry to `audit_path`.
    pub fn new(audit_path: impl Into<PathBuf>) -> Self {
        Self::build(Some(audit_path.into()), DEFAULT_CAPACITY)
    }

    /// Creates a log without an audit file.
    pub fn in_memory() -> Self {
        Self::build(None, DEFAULT_CAPACITY)
    }

    /// Overrides the in-memory capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    fn build(audit_path: Option<PathBuf>, capacity: usize) -> Self {
        Self {
            state: Mutex::new(LogState {
                entries: VecDeque::with_capacity(capacity),
                last_id: 0,
            }),
            capacity,
            audit_path,
        }
    }

    pub fn audit_path(&self) -> Option<&Path> {
        self.audit_path.as_deref()
    }

    /// Records an event. Never fails.
    pub fn record(&self, kind: EventType, message: impl Into<String>, store_id: Option<&str>) {
        let message = message.into();
        let now = Utc::now();

        let mut state = self.lock();
        // Ids must stay unique even when two events land in the same millisecond.
        let id = now.timestamp_millis().max(state.last_id + 1);
        state.last_id = id;

        let entry = LogEntry {
            id,
            timestamp: now,
            kind,
            message,
            store_id: store_id.map(str::to_owned),
        };

        // Appending under the lock keeps file order identical to buffer order.
        self.append_audit(&entry);
        mirror_to_tracing(&entry);

        state.entries.push_front(entry);
        while state.entries.len() > self.capacity {
            state.entries.pop_back();
        }
    }

    pub fn info(&self, message: impl Into<String>, store_id: Option<&str>) {
        self.record(EventType::Info, message, store_id);
    }

    pub fn success(&self, message: impl Into<String>, store_id: Option<&str>) {
        self.record(EventType::Success, message, store_id);
    }

    pub fn warning(&self, message: impl Into<String>, store_id: Option<&str>) {
        self.record(EventType::Warning, message, store_id);
    }

    pub fn error(&self, message: impl Into<String>, store_id: Option<&str>) {
        self.record(EventType::Error, message, store_id);
    }

    /// Current buffer, newest first.
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.lock().entries.iter().cloned().collect()
    }

    /// Entries recorded for one store, newest first.
    pub fn for_store(&self, store_id: &str) -> Vec<LogEntry> {
        self.lock()
            .entries
            .iter()
            .filter(|e| e.store_id.as_deref() == Some(store_id))
            .cloned()
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, LogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn append_audit(&self, entry: &LogEntry) {
        let Some(path) = &self.audit_path else {
            return;
        };

        let line = match serde_json::to_string(entry) {
            Ok(line) => line,
            Err(e) => {
                error!(error = %e, "Audit serialization failed");
                return;
            }
        };

        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| writeln!(file, "{line}"));

        if let Err(e) = result {
            error!(path = %path.display(), error = %e, "Audit write failed");
        }
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("capacity", &self.capacity)
            .field("audit_path", &self.audit_path)
            .finish_non_exhaustive()
    }
}

fn mirror_to_tracing(entry: &LogEntry) {
    let store_id = entry.store_id.as_deref().unwrap_or("-");
    match entry.kind {
        EventType::Info | EventType::Success => {
            info!(kind = %entry.kind, store_id, "{}", entry.message)
        }
        EventType::Warning => warn!(kind = %entry.kind, store_id, "{}", entry.message),
        EventType::Error => error!(kind = %entry.kind, store_id, "{}", entry.message),
    }
}
