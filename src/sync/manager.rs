//! Reconciles the local vault with the remote secret store.
//!
//! The manager owns the [`SyncState`] (single writer), notifies
//! subscribers on every change, and runs full or incremental pulls either
//! on demand or from a periodic timer.  Runs are serialized: a user
//! triggered sync waits for one in flight, a timer tick that finds a run
//! in flight is skipped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::{Mutex, ReentrantMutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

use super::state::{ItemFailure, SyncKind, SyncMode, SyncReport, SyncState, SyncStatus};
use crate::errors::{Result, VaultSyncError};
use crate::remote::{RemoteSecret, RemoteStore};
use crate::state::{get_millis, KvStore, LAST_SYNC_KEY};
use crate::vault::{Secret, SecretMetadata, SyncStatus as SecretSyncStatus, VaultGateway};

/// Default periodic sync interval.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(10 * 60);

type Listener = Arc<dyn Fn(&SyncState) + Send + Sync>;

struct PeriodicHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

struct Inner {
    remote: Arc<dyn RemoteStore>,
    vault: Arc<dyn VaultGateway>,
    store: Arc<dyn KvStore>,
    interval: Duration,
    state: Mutex<SyncState>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    /// Held from a state change until its listeners have run, so
    /// snapshots reach every listener in the order they were taken.
    notify: ReentrantMutex<()>,
    next_listener_id: AtomicU64,
    run_lock: tokio::sync::Mutex<()>,
    periodic: Mutex<Option<PeriodicHandle>>,
}

/// Cheaply cloneable handle; clones share state, listeners and timer.
#[derive(Clone)]
pub struct SyncManager {
    inner: Arc<Inner>,
}

impl SyncManager {
    /// Create a manager in `idle`/`offline`, restoring the last sync time
    /// from `store`.
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        vault: Arc<dyn VaultGateway>,
        store: Arc<dyn KvStore>,
        interval: Duration,
    ) -> Result<Self> {
        let last_sync_time = get_millis(&*store, LAST_SYNC_KEY)?
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single());

        let state = SyncState {
            last_sync_time,
            ..SyncState::default()
        };

        Ok(Self {
            inner: Arc::new(Inner {
                remote,
                vault,
                store,
                interval,
                state: Mutex::new(state),
                listeners: Mutex::new(Vec::new()),
                notify: ReentrantMutex::new(()),
                next_listener_id: AtomicU64::new(0),
                run_lock: tokio::sync::Mutex::new(()),
                periodic: Mutex::new(None),
            }),
        })
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    pub fn get_state(&self) -> SyncState {
        self.inner.state.lock().clone()
    }

    pub fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        self.inner.state.lock().last_sync_time
    }

    // ------------------------------------------------------------------
    // State and subscribers
    // ------------------------------------------------------------------

    fn update_state(&self, f: impl FnOnce(&mut SyncState)) {
        let _ordered = self.inner.notify.lock();
        let snapshot = {
            let mut state = self.inner.state.lock();
            f(&mut state);
            state.clone()
        };
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .lock()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(&snapshot);
        }
    }

    /// Register `listener` for every state change.  It is called once
    /// immediately with the current state, before any later change.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SyncState) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        let listener: Listener = Arc::new(listener);
        let _ordered = self.inner.notify.lock();
        self.inner
            .listeners
            .lock()
            .push((id, Arc::clone(&listener)));

        let current = self.get_state();
        listener(&current);

        Subscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    // ------------------------------------------------------------------
    // Connectivity
    // ------------------------------------------------------------------

    /// Probe the remote store and record the result as `mode`.
    pub async fn check_connection(&self) -> bool {
        let online = self.inner.remote.health_check().await;
        let mode = if online {
            SyncMode::Online
        } else {
            SyncMode::Offline
        };
        debug!(%mode, "connectivity probe");
        self.update_state(|s| s.mode = mode);
        online
    }

    // ------------------------------------------------------------------
    // Sync entry points
    // ------------------------------------------------------------------

    /// Pull every remote secret into the vault.
    pub async fn full_sync(&self, master_password: &str) -> Result<SyncReport> {
        let _run = self.inner.run_lock.lock().await;
        self.run_full(master_password).await
    }

    /// Pull new or newer remote secrets into the vault.  Local-only
    /// secrets are never touched.
    pub async fn incremental_sync(&self, master_password: &str) -> Result<SyncReport> {
        let _run = self.inner.run_lock.lock().await;
        self.run_incremental(master_password).await
    }

    /// Full sync if this manager has never synced, incremental otherwise.
    pub async fn auto_sync(&self, master_password: &str) -> Result<SyncReport> {
        let _run = self.inner.run_lock.lock().await;
        if self.last_sync_time().is_none() {
            self.run_full(master_password).await
        } else {
            self.run_incremental(master_password).await
        }
    }

    /// User-triggered sync; always incremental.
    pub async fn force_sync(&self, master_password: &str) -> Result<SyncReport> {
        self.incremental_sync(master_password).await
    }

    async fn run_full(&self, master_password: &str) -> Result<SyncReport> {
        self.begin(SyncKind::Full);
        self.ensure_online().await?;

        let remote = self.fetch_remote().await?;
        let mut report = SyncReport::new(SyncKind::Full, remote.len());
        self.update_state(|s| s.progress.total = remote.len());

        let now = Utc::now();
        for item in &remote {
            let secret = to_local_secret(item, now);
            match self.write(&secret, master_password).await {
                Ok(()) => {
                    report.added += 1;
                    self.update_state(|s| s.progress.current += 1);
                }
                Err(e) => record_failure(&mut report, e),
            }
        }

        self.finish(report)
    }

    async fn run_incremental(&self, master_password: &str) -> Result<SyncReport> {
        self.begin(SyncKind::Incremental);
        self.ensure_online().await?;

        let local: HashMap<String, DateTime<Utc>> = match self.inner.vault.list_secrets().await {
            Ok(items) => items.into_iter().map(|i| (i.id, i.created_at)).collect(),
            Err(e) => return self.fail(e),
        };
        let remote = self.fetch_remote().await?;
        let mut report = SyncReport::new(SyncKind::Incremental, remote.len());
        self.update_state(|s| s.progress.total = remote.len());

        let now = Utc::now();
        for item in &remote {
            let outcome = match local.get(&item.id) {
                None => self
                    .write(&to_local_secret(item, now), master_password)
                    .await
                    .map(|()| report.added += 1),
                Some(local_created) if is_newer(item, local_created) => self
                    .write(&to_local_secret(item, now), master_password)
                    .await
                    .map(|()| report.updated += 1),
                Some(_) => {
                    report.unchanged += 1;
                    Ok(())
                }
            };
            match outcome {
                Ok(()) => self.update_state(|s| s.progress.current += 1),
                Err(e) => record_failure(&mut report, e),
            }
        }

        self.finish(report)
    }

    fn begin(&self, kind: SyncKind) {
        debug!(%kind, "sync started");
        self.update_state(|s| {
            s.status = SyncStatus::Syncing;
            s.error = None;
            s.progress = Default::default();
        });
    }

    async fn ensure_online(&self) -> Result<()> {
        if self.check_connection().await {
            Ok(())
        } else {
            self.fail(VaultSyncError::Connectivity(
                "remote secret store did not pass its health check".into(),
            ))
        }
    }

    async fn fetch_remote(&self) -> Result<Vec<RemoteSecret>> {
        match self.inner.remote.get_all_secrets().await {
            Ok(secrets) => Ok(secrets),
            Err(e) => self.fail(e),
        }
    }

    async fn write(&self, secret: &Secret, master_password: &str) -> Result<()> {
        self.inner
            .vault
            .save_secret(secret, master_password)
            .await
            .map_err(|e| VaultSyncError::Write {
                id: secret.id.clone(),
                message: e.to_string(),
            })
    }

    fn finish(&self, report: SyncReport) -> Result<SyncReport> {
        let now = Utc::now();
        if let Err(e) = self
            .inner
            .store
            .set(LAST_SYNC_KEY, &now.timestamp_millis().to_string())
        {
            return self.fail(e);
        }

        self.update_state(|s| {
            s.status = SyncStatus::Success;
            s.last_sync_time = Some(now);
        });

        info!(
            kind = %report.kind,
            total = report.total,
            added = report.added,
            updated = report.updated,
            unchanged = report.unchanged,
            failed = report.failed.len(),
            "sync complete"
        );
        Ok(report)
    }

    fn fail<T>(&self, err: VaultSyncError) -> Result<T> {
        error!(error = %err, "sync failed");
        let message = err.to_string();
        self.update_state(|s| {
            s.status = SyncStatus::Error;
            s.error = Some(message);
        });
        Err(err)
    }

    // ------------------------------------------------------------------
    // Periodic sync
    // ------------------------------------------------------------------

    /// Run an incremental sync every interval until stopped.  Replaces any
    /// timer already running.  Must be called within a tokio runtime.
    pub fn start_periodic_sync(&self, master_password: &str) {
        self.stop_periodic_sync();

        let (stop, mut stopped) = watch::channel(false);
        let weak = Arc::downgrade(&self.inner);
        let password = Zeroizing::new(master_password.to_string());
        let period = self.inner.interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = stopped.changed() => break,
                }
                let Some(inner) = weak.upgrade() else { break };
                SyncManager { inner }.periodic_tick(&password).await;
            }
            debug!("periodic sync stopped");
        });

        info!(interval_secs = period.as_secs(), "periodic sync started");
        *self.inner.periodic.lock() = Some(PeriodicHandle { stop, task });
    }

    async fn periodic_tick(&self, master_password: &str) {
        let Ok(_run) = self.inner.run_lock.try_lock() else {
            debug!("sync already in progress, skipping periodic tick");
            return;
        };
        if let Err(e) = self.run_incremental(master_password).await {
            warn!(error = %e, "periodic sync failed");
        }
    }

    /// Cancel the timer.  A sync already running is left to finish.
    pub fn stop_periodic_sync(&self) {
        if let Some(handle) = self.inner.periodic.lock().take() {
            let _ = handle.stop.send(true);
            drop(handle.task);
        }
    }

    pub fn is_periodic_sync_running(&self) -> bool {
        self.inner
            .periodic
            .lock()
            .as_ref()
            .is_some_and(|h| !h.task.is_finished())
    }

    /// Stop the timer and drop every listener.
    pub fn shutdown(&self) {
        self.stop_periodic_sync();
        self.inner.listeners.lock().clear();
    }

    // ------------------------------------------------------------------
    // Staleness
    // ------------------------------------------------------------------

    /// True if never synced or the last sync is older than the interval.
    pub fn needs_sync(&self) -> bool {
        self.needs_sync_at(Utc::now())
    }

    pub fn needs_sync_at(&self, now: DateTime<Utc>) -> bool {
        match self.last_sync_time() {
            None => true,
            Some(last) => (now - last)
                .to_std()
                .map_or(false, |elapsed| elapsed > self.inner.interval),
        }
    }

    /// Human-readable age of the last sync, `None` before the first one.
    pub fn time_since_last_sync(&self) -> Option<String> {
        self.time_since_last_sync_at(Utc::now())
    }

    pub fn time_since_last_sync_at(&self, now: DateTime<Utc>) -> Option<String> {
        self.last_sync_time().map(|last| format_elapsed(now - last))
    }
}

/// Handle returned by [`SyncManager::subscribe`].  Unsubscribes on drop.
pub struct Subscription {
    id: u64,
    inner: Weak<Inner>,
}

impl Subscription {
    /// Stop receiving updates.  Calling this more than once is harmless.
    pub fn unsubscribe(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.listeners.lock().retain(|(id, _)| *id != self.id);
        }
        self.inner = Weak::new();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// Remote secret in local shape: pulled, synced, stamped with the remote
/// creation time (or `now` when the store did not report one).
pub fn to_local_secret(remote: &RemoteSecret, now: DateTime<Utc>) -> Secret {
    let created_at = remote.metadata.created_at().unwrap_or(now);
    Secret {
        id: remote.id.clone(),
        name: remote.name.clone(),
        secret_type: remote.secret_type,
        data: remote.data.clone(),
        metadata: SecretMetadata {
            created_at,
            updated_at: Some(now),
            tags: Vec::new(),
            description: None,
            expires_at: None,
            resource_name: None,
            is_local: false,
            sync_status: SecretSyncStatus::Synced,
            last_synced_at: Some(now),
        },
        created_at,
    }
}

/// Remote wins only with a strictly newer creation time; a missing or
/// unparsable remote time never overwrites.
fn is_newer(remote: &RemoteSecret, local_created: &DateTime<Utc>) -> bool {
    remote
        .metadata
        .created_at()
        .is_some_and(|remote_created| remote_created > *local_created)
}

fn record_failure(report: &mut SyncReport, err: VaultSyncError) {
    let (id, message) = match err {
        VaultSyncError::Write { id, message } => (id, message),
        other => (String::new(), other.to_string()),
    };
    warn!(%id, error = %message, "skipping remote secret");
    report.failed.push(ItemFailure { id, message });
}

fn format_elapsed(elapsed: chrono::Duration) -> String {
    let minutes = elapsed.num_minutes();
    if minutes < 1 {
        "just now".to_string()
    } else if minutes < 60 {
        format!("{minutes} min ago")
    } else if minutes < 60 * 24 {
        format!("{} h ago", elapsed.num_hours())
    } else {
        format!("{} d ago", elapsed.num_days())
    }
}
