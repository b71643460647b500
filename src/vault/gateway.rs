//! The local vault as seen by the sync engine and the secrets store.
//!
//! [`VaultGateway`] is the async seam; [`FileVault`] implements it over a
//! [`VaultStore`], moving Argon2id and file I/O onto tokio's blocking pool.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use zeroize::Zeroizing;

use crate::crypto::Argon2Params;
use crate::errors::{Result, VaultSyncError};

use super::secret::{LegacyListItem, LegacySecret, Secret, SecretListItem};
use super::store::VaultStore;

/// Encrypted local secret storage gated by a master password.
#[async_trait]
pub trait VaultGateway: Send + Sync {
    async fn is_vault_initialized(&self) -> Result<bool>;

    async fn initialize_vault(&self, master_password: &str) -> Result<()>;

    async fn verify_vault_password(&self, master_password: &str) -> Result<bool>;

    async fn change_master_password(&self, old_password: &str, new_password: &str) -> Result<()>;

    /// Insert or replace a secret by id.
    async fn save_secret(&self, secret: &Secret, master_password: &str) -> Result<()>;

    /// Decrypt a secret; returns its serialized JSON.
    async fn get_secret(&self, id: &str, master_password: &str) -> Result<String>;

    async fn list_secrets(&self) -> Result<Vec<SecretListItem>>;

    async fn update_secret(&self, secret: &Secret, master_password: &str) -> Result<()>;

    async fn delete_secret(&self, id: &str) -> Result<()>;

    // Legacy login/password/host items.

    async fn encrypt_item(&self, id: &str, item: &LegacySecret, master_password: &str)
        -> Result<()>;

    async fn decrypt_item(&self, id: &str, master_password: &str) -> Result<serde_json::Value>;

    async fn list_items(&self) -> Result<Vec<LegacyListItem>>;

    async fn delete_item(&self, id: &str) -> Result<()>;
}

/// File-backed [`VaultGateway`].
#[derive(Clone)]
pub struct FileVault {
    store: Arc<VaultStore>,
}

impl FileVault {
    pub fn new(path: impl Into<PathBuf>, params: Argon2Params) -> Self {
        Self {
            store: Arc::new(VaultStore::new(path, params)),
        }
    }

    pub fn store(&self) -> &VaultStore {
        &self.store
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&VaultStore) -> Result<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| VaultSyncError::CommandFailed(format!("vault task failed: {e}")))?
    }
}

fn owned(password: &str) -> Zeroizing<String> {
    Zeroizing::new(password.to_string())
}

#[async_trait]
impl VaultGateway for FileVault {
    async fn is_vault_initialized(&self) -> Result<bool> {
        self.blocking(|s| s.is_initialized()).await
    }

    async fn initialize_vault(&self, master_password: &str) -> Result<()> {
        let pw = owned(master_password);
        self.blocking(move |s| s.initialize(&pw)).await
    }

    async fn verify_vault_password(&self, master_password: &str) -> Result<bool> {
        let pw = owned(master_password);
        self.blocking(move |s| s.verify_password(&pw)).await
    }

    async fn change_master_password(&self, old_password: &str, new_password: &str) -> Result<()> {
        let old = owned(old_password);
        let new = owned(new_password);
        self.blocking(move |s| s.change_master_password(&old, &new))
            .await
    }

    async fn save_secret(&self, secret: &Secret, master_password: &str) -> Result<()> {
        let secret = secret.clone();
        let pw = owned(master_password);
        self.blocking(move |s| s.save_secret(&secret, &pw)).await
    }

    async fn get_secret(&self, id: &str, master_password: &str) -> Result<String> {
        let id = id.to_string();
        let pw = owned(master_password);
        self.blocking(move |s| s.get_secret(&id, &pw)).await
    }

    async fn list_secrets(&self) -> Result<Vec<SecretListItem>> {
        self.blocking(|s| s.list_secrets()).await
    }

    async fn update_secret(&self, secret: &Secret, master_password: &str) -> Result<()> {
        let secret = secret.clone();
        let pw = owned(master_password);
        self.blocking(move |s| s.update_secret(&secret, &pw)).await
    }

    async fn delete_secret(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.blocking(move |s| s.delete_secret(&id)).await
    }

    async fn encrypt_item(
        &self,
        id: &str,
        item: &LegacySecret,
        master_password: &str,
    ) -> Result<()> {
        let id = id.to_string();
        let item = item.clone();
        let pw = owned(master_password);
        self.blocking(move |s| s.encrypt_item(&id, &item, &pw)).await
    }

    async fn decrypt_item(&self, id: &str, master_password: &str) -> Result<serde_json::Value> {
        let id = id.to_string();
        let pw = owned(master_password);
        self.blocking(move |s| s.decrypt_item(&id, &pw)).await
    }

    async fn list_items(&self) -> Result<Vec<LegacyListItem>> {
        self.blocking(|s| s.list_items()).await
    }

    async fn delete_item(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.blocking(move |s| s.delete_item(&id)).await
    }
}
