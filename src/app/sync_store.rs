//! Bridge between the [`SyncManager`] and a consuming UI: mirrors the
//! sync state through a subscription and adds store-token introspection.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::errors::Result;
use crate::remote::RemoteStore;
use crate::sync::{Subscription, SyncManager, SyncReport, SyncState};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncStoreSnapshot {
    pub sync_state: SyncState,
    pub token: Option<String>,
    pub token_expiry: Option<DateTime<Utc>>,
    pub is_token_valid: bool,
}

pub struct SyncStore {
    manager: SyncManager,
    remote: Arc<dyn RemoteStore>,
    snapshot: Arc<Mutex<SyncStoreSnapshot>>,
    _subscription: Subscription,
}

impl SyncStore {
    /// Subscribe to `manager` for as long as this store lives.
    pub fn new(manager: SyncManager, remote: Arc<dyn RemoteStore>) -> Self {
        let snapshot = Arc::new(Mutex::new(SyncStoreSnapshot::default()));
        let mirror = Arc::clone(&snapshot);
        let subscription = manager.subscribe(move |state| {
            mirror.lock().sync_state = state.clone();
        });

        let store = Self {
            manager,
            remote,
            snapshot,
            _subscription: subscription,
        };
        store.update_token_info();
        store
    }

    pub fn snapshot(&self) -> SyncStoreSnapshot {
        self.snapshot.lock().clone()
    }

    pub fn sync_state(&self) -> SyncState {
        self.snapshot.lock().sync_state.clone()
    }

    pub fn manager(&self) -> &SyncManager {
        &self.manager
    }

    /// Re-read the store token from the remote client.
    pub fn update_token_info(&self) {
        let info = self.remote.token_info();
        let mut snapshot = self.snapshot.lock();
        snapshot.token = info.token;
        snapshot.token_expiry = info.expiry;
        snapshot.is_token_valid = info.is_valid;
    }

    /// Full or incremental sync, whichever is due.
    pub async fn start_sync(&self, master_password: &str) -> Result<SyncReport> {
        let result = self.manager.auto_sync(master_password).await;
        self.update_token_info();
        result
    }

    pub async fn force_sync(&self, master_password: &str) -> Result<SyncReport> {
        let result = self.manager.force_sync(master_password).await;
        self.update_token_info();
        result
    }

    pub fn start_periodic_sync(&self, master_password: &str) {
        self.manager.start_periodic_sync(master_password);
        self.update_token_info();
    }

    pub fn stop_periodic_sync(&self) {
        self.manager.stop_periodic_sync();
        self.update_token_info();
    }

    pub async fn check_connection(&self) -> bool {
        let online = self.manager.check_connection().await;
        self.update_token_info();
        online
    }
}
