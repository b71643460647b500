//! In-memory doubles for the remote store and the local vault.
#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::Notify;
use vaultsync::errors::{Result, VaultSyncError};
use vaultsync::remote::{RemoteMetadata, RemoteSecret, RemoteStore, TokenInfo};
use vaultsync::vault::{LegacyListItem, LegacySecret, Secret, SecretListItem, SecretType, VaultGateway};

pub const PASSWORD: &str = "correct-horse";

pub fn remote_secret(id: &str, created: &str, value: &str) -> RemoteSecret {
    RemoteSecret {
        id: id.to_string(),
        name: id.to_uppercase(),
        secret_type: SecretType::Generic,
        data: BTreeMap::from([("value".to_string(), value.to_string())]),
        metadata: RemoteMetadata {
            created_time: Some(created.to_string()),
            version: 1,
            destroyed: false,
        },
    }
}

/// Remote store whose contents and reachability tests control directly.
#[derive(Default)]
pub struct FakeRemote {
    pub secrets: Mutex<Vec<RemoteSecret>>,
    pub offline: AtomicBool,
    pub fail_fetch: AtomicBool,
    pub fetches: AtomicUsize,
    /// While set, fetches park until it is notified.
    gate: Mutex<Option<Arc<Notify>>>,
    /// Signalled each time a fetch reaches the gate.
    pub parked: Notify,
}

impl FakeRemote {
    pub fn with(secrets: Vec<RemoteSecret>) -> Self {
        Self {
            secrets: Mutex::new(secrets),
            ..Self::default()
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Park every following fetch until [`FakeRemote::open`].
    pub fn close(&self) {
        *self.gate.lock() = Some(Arc::new(Notify::new()));
    }

    /// Release the parked fetch; later fetches pass straight through.
    pub fn open(&self) {
        if let Some(gate) = self.gate.lock().take() {
            gate.notify_one();
        }
    }
}

#[async_trait]
impl RemoteStore for FakeRemote {
    async fn health_check(&self) -> bool {
        !self.offline.load(Ordering::SeqCst)
    }

    async fn get_all_secrets(&self) -> Result<Vec<RemoteSecret>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            self.parked.notify_one();
            gate.notified().await;
        }
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(VaultSyncError::Fetch("listing failed (HTTP 500)".into()));
        }
        Ok(self.secrets.lock().clone())
    }

    fn token_info(&self) -> TokenInfo {
        TokenInfo {
            token: Some("s.fake".into()),
            expiry: None,
            is_valid: true,
        }
    }
}

/// Vault keeping plaintext in memory, with a fixed password.
#[derive(Default)]
pub struct MemoryVault {
    pub secrets: Mutex<BTreeMap<String, Secret>>,
    pub legacy: Mutex<BTreeMap<String, (serde_json::Value, DateTime<Utc>)>>,
    pub rejected: Mutex<HashSet<String>>,
    pub saves: AtomicUsize,
    pub fail_listing: AtomicBool,
}

impl MemoryVault {
    pub fn reject(&self, id: &str) {
        self.rejected.lock().insert(id.to_string());
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn secret(&self, id: &str) -> Option<Secret> {
        self.secrets.lock().get(id).cloned()
    }

    fn check(password: &str) -> Result<()> {
        if password == PASSWORD {
            Ok(())
        } else {
            Err(VaultSyncError::WrongPassword)
        }
    }
}

#[async_trait]
impl VaultGateway for MemoryVault {
    async fn is_vault_initialized(&self) -> Result<bool> {
        Ok(true)
    }

    async fn initialize_vault(&self, _master_password: &str) -> Result<()> {
        Err(VaultSyncError::VaultAlreadyInitialized)
    }

    async fn verify_vault_password(&self, master_password: &str) -> Result<bool> {
        Ok(master_password == PASSWORD)
    }

    async fn change_master_password(&self, _old: &str, _new: &str) -> Result<()> {
        Err(VaultSyncError::CommandFailed("not supported".into()))
    }

    async fn save_secret(&self, secret: &Secret, master_password: &str) -> Result<()> {
        Self::check(master_password)?;
        if self.rejected.lock().contains(&secret.id) {
            return Err(VaultSyncError::InvalidSecret(format!("{} rejected", secret.id)));
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.secrets.lock().insert(secret.id.clone(), secret.clone());
        Ok(())
    }

    async fn get_secret(&self, id: &str, master_password: &str) -> Result<String> {
        Self::check(master_password)?;
        self.secrets
            .lock()
            .get(id)
            .ok_or_else(|| VaultSyncError::SecretNotFound(id.to_string()))?
            .to_json()
    }

    async fn list_secrets(&self) -> Result<Vec<SecretListItem>> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(VaultSyncError::InvalidVaultFormat("listing unavailable".into()));
        }
        Ok(self.secrets.lock().values().map(Secret::list_item).collect())
    }

    async fn update_secret(&self, secret: &Secret, master_password: &str) -> Result<()> {
        if !self.secrets.lock().contains_key(&secret.id) {
            return Err(VaultSyncError::SecretNotFound(secret.id.clone()));
        }
        self.save_secret(secret, master_password).await
    }

    async fn delete_secret(&self, id: &str) -> Result<()> {
        self.secrets
            .lock()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| VaultSyncError::SecretNotFound(id.to_string()))
    }

    async fn encrypt_item(&self, id: &str, item: &LegacySecret, master_password: &str) -> Result<()> {
        Self::check(master_password)?;
        let value = serde_json::to_value(item)
            .map_err(|e| VaultSyncError::SerializationError(e.to_string()))?;
        self.legacy.lock().insert(id.to_string(), (value, Utc::now()));
        Ok(())
    }

    async fn decrypt_item(&self, id: &str, master_password: &str) -> Result<serde_json::Value> {
        Self::check(master_password)?;
        self.legacy
            .lock()
            .get(id)
            .map(|(value, _)| value.clone())
            .ok_or_else(|| VaultSyncError::SecretNotFound(id.to_string()))
    }

    async fn list_items(&self) -> Result<Vec<LegacyListItem>> {
        Ok(self
            .legacy
            .lock()
            .iter()
            .map(|(id, (_, created_at))| LegacyListItem {
                id: id.clone(),
                created_at: *created_at,
            })
            .collect())
    }

    async fn delete_item(&self, id: &str) -> Result<()> {
        self.legacy
            .lock()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| VaultSyncError::SecretNotFound(id.to_string()))
    }
}
