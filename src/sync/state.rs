//! Observable sync state and the per-run report.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Where the sync state machine is: `idle → syncing → success | error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Idle,
    Syncing,
    Success,
    Error,
}

/// Result of the last connectivity probe; independent of `status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    Online,
    #[default]
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SyncProgress {
    pub current: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    pub status: SyncStatus,
    pub mode: SyncMode,
    pub last_sync_time: Option<DateTime<Utc>>,
    /// Message of the last structural failure, cleared when a new run starts.
    pub error: Option<String>,
    pub progress: SyncProgress,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Success => "success",
            SyncStatus::Error => "error",
        })
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SyncMode::Online => "online",
            SyncMode::Offline => "offline",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncKind {
    Full,
    Incremental,
}

impl fmt::Display for SyncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SyncKind::Full => "full",
            SyncKind::Incremental => "incremental",
        })
    }
}

/// A remote secret that could not be written locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub id: String,
    pub message: String,
}

/// What one sync run did.
///
/// The run still ends in [`SyncStatus::Success`] when some items failed;
/// `failed` records which ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub kind: SyncKind,
    /// Remote secrets considered.
    pub total: usize,
    pub added: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: Vec<ItemFailure>,
}

impl SyncReport {
    pub fn new(kind: SyncKind, total: usize) -> Self {
        Self {
            kind,
            total,
            added: 0,
            updated: 0,
            unchanged: 0,
            failed: Vec::new(),
        }
    }

    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Number of local writes performed.
    pub fn written(&self) -> usize {
        self.added + self.updated
    }
}
