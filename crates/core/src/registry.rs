//! Run registry: the single source of truth for live app runs.
//!
//! Every mutation funnels through the registry's mutex, which is only ever
//! held for map operations, never across a spawn, probe or reap await. A
//! start request first *reserves* its app id (insert-if-absent); the
//! reservation is upgraded to a full record once the spawn succeeds, or
//! released on failure so no partial record survives. Two concurrent
//! starts for one id therefore cannot both succeed: the second observes
//! the first's reservation and is rejected.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::supervisor::ProcessHandle;

/// Live-state entry for a running app instance.
///
/// Created the instant a spawn succeeds; destroyed on observed exit or
/// completed stop. At most one exists per app id at any time.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub app_id: String,
    pub handle: Arc<ProcessHandle>,
    pub port: Option<u16>,
    pub started_at: DateTime<Utc>,
}

impl RunRecord {
    pub fn new(app_id: impl Into<String>, handle: Arc<ProcessHandle>, port: Option<u16>) -> Self {
        Self {
            app_id: app_id.into(),
            handle,
            port,
            started_at: Utc::now(),
        }
    }

    pub fn pid(&self) -> u32 {
        self.handle.pid()
    }
}

/// Cloneable, serializable view of a run record (no process handle).
#[derive(Debug, Clone, Serialize)]
pub struct RunSnapshot {
    pub app_id: String,
    pub pid: u32,
    pub port: Option<u16>,
    pub started_at: DateTime<Utc>,
}

impl From<&RunRecord> for RunSnapshot {
    fn from(record: &RunRecord) -> Self {
        Self {
            app_id: record.app_id.clone(),
            pid: record.pid(),
            port: record.port,
            started_at: record.started_at,
        }
    }
}

/// Internal per-app slot. `Starting` is the reservation held while a start
/// request is in flight; it is not visible as a run record.
#[derive(Debug)]
enum RunEntry {
    Starting,
    Running(RunRecord),
}

/// Serialized map of app id to live run state.
#[derive(Debug, Default)]
pub struct RunRegistry {
    entries: Mutex<HashMap<String, RunEntry>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the app has a live entry (running or mid-start).
    pub async fn has(&self, app_id: &str) -> bool {
        self.entries.lock().await.contains_key(app_id)
    }

    /// Snapshot of one running app, if any.
    pub async fn get(&self, app_id: &str) -> Option<RunSnapshot> {
        match self.entries.lock().await.get(app_id) {
            Some(RunEntry::Running(record)) => Some(RunSnapshot::from(record)),
            _ => None,
        }
    }

    /// Atomically claim an app id for an in-flight start.
    ///
    /// Fails with [`Error::AlreadyRunning`] when any entry exists,
    /// reporting the previously allocated port for a running entry.
    pub async fn reserve(&self, app_id: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        match entries.get(app_id) {
            Some(RunEntry::Running(record)) => Err(Error::AlreadyRunning {
                id: app_id.to_string(),
                port: record.port,
            }),
            Some(RunEntry::Starting) => Err(Error::AlreadyRunning {
                id: app_id.to_string(),
                port: None,
            }),
            None => {
                entries.insert(app_id.to_string(), RunEntry::Starting);
                Ok(())
            }
        }
    }

    /// Upgrade a reservation to a full run record after a successful spawn.
    pub async fn commit(&self, record: RunRecord) {
        let mut entries = self.entries.lock().await;
        entries.insert(record.app_id.clone(), RunEntry::Running(record));
    }

    /// Release a reservation after a failed or recordless start. Only a
    /// `Starting` entry is removed; a committed record is left untouched.
    pub async fn release(&self, app_id: &str) {
        let mut entries = self.entries.lock().await;
        if matches!(entries.get(app_id), Some(RunEntry::Starting)) {
            entries.remove(app_id);
        }
    }

    /// Remove a running app's record, cancelling its scheduled tasks.
    ///
    /// Returns the removed record, or `None` when the app has no committed
    /// record (absent or still starting). The removal is authoritative for
    /// restart eligibility even before the OS process fully exits.
    pub async fn remove(&self, app_id: &str) -> Option<RunRecord> {
        let mut entries = self.entries.lock().await;
        match entries.get(app_id) {
            Some(RunEntry::Running(_)) => match entries.remove(app_id) {
                Some(RunEntry::Running(record)) => {
                    record.handle.cancel_scheduled();
                    Some(record)
                }
                _ => None,
            },
            _ => None,
        }
    }

    /// Snapshot of every running app, ordered by app id.
    pub async fn running(&self) -> Vec<RunSnapshot> {
        let entries = self.entries.lock().await;
        let mut running: Vec<RunSnapshot> = entries
            .values()
            .filter_map(|entry| match entry {
                RunEntry::Running(record) => Some(RunSnapshot::from(record)),
                RunEntry::Starting => None,
            })
            .collect();
        running.sort_by(|a, b| a.app_id.cmp(&b.app_id));
        running
    }

    /// Number of committed run records.
    pub async fn running_count(&self) -> usize {
        let entries = self.entries.lock().await;
        entries
            .values()
            .filter(|entry| matches!(entry, RunEntry::Running(_)))
            .count()
    }
}
