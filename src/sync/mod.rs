//! Synchronization between the local vault and the remote store.

pub mod manager;
pub mod state;

pub use manager::{to_local_secret, Subscription, SyncManager, DEFAULT_SYNC_INTERVAL};
pub use state::{ItemFailure, SyncKind, SyncMode, SyncProgress, SyncReport, SyncState, SyncStatus};
