//! CRUD façade over the local vault with fallbacks to the legacy
//! login/password/host item format.
//!
//! Every successful mutation reloads the full listing from the vault so
//! the cached `secrets` always matches what is persisted.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::errors::{Result, VaultSyncError};
use crate::vault::{
    is_legacy_secret, migrate_legacy_secret, LegacySecret, Secret, SecretListItem, SecretType,
    VaultGateway,
};

/// Placeholder name for legacy items, whose names are encrypted.
pub const LEGACY_PLACEHOLDER_NAME: &str = "Database secret";

pub const LOAD_FAILED: &str = "could not load secrets";
pub const SAVE_FAILED: &str = "could not save secret";
pub const RETRIEVE_FAILED: &str = "could not retrieve secret";
pub const UPDATE_FAILED: &str = "could not update secret";
pub const DELETE_FAILED: &str = "could not delete secret";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SecretsSnapshot {
    pub secrets: Vec<SecretListItem>,
    pub loading: bool,
    pub error: Option<String>,
}

pub struct SecretsStore {
    vault: Arc<dyn VaultGateway>,
    state: Mutex<SecretsSnapshot>,
}

impl SecretsStore {
    pub fn new(vault: Arc<dyn VaultGateway>) -> Self {
        Self {
            vault,
            state: Mutex::new(SecretsSnapshot::default()),
        }
    }

    pub fn snapshot(&self) -> SecretsSnapshot {
        self.state.lock().clone()
    }

    pub fn secrets(&self) -> Vec<SecretListItem> {
        self.state.lock().secrets.clone()
    }

    pub fn error(&self) -> Option<String> {
        self.state.lock().error.clone()
    }

    fn start(&self, loading: bool) {
        let mut state = self.state.lock();
        state.loading = loading;
        state.error = None;
    }

    fn set_error(&self, message: &str) {
        self.state.lock().error = Some(message.to_string());
    }

    fn done(&self) {
        self.state.lock().loading = false;
    }

    /// Reload the listing, falling back to legacy items when the current
    /// listing is unavailable.
    pub async fn load_secrets(&self) -> Result<Vec<SecretListItem>> {
        self.start(true);
        let result = self.fetch_listing().await;
        match &result {
            Ok(items) => self.state.lock().secrets = items.clone(),
            Err(e) => {
                error!(error = %e, "failed to load secrets");
                self.set_error(LOAD_FAILED);
            }
        }
        self.done();
        result
    }

    async fn fetch_listing(&self) -> Result<Vec<SecretListItem>> {
        match self.vault.list_secrets().await {
            Ok(items) => {
                debug!(count = items.len(), "loaded secrets");
                Ok(items)
            }
            Err(e) => {
                warn!(error = %e, "listing failed, trying legacy items");
                let legacy = self.vault.list_items().await?;
                Ok(legacy
                    .into_iter()
                    .map(|item| SecretListItem {
                        id: item.id,
                        name: LEGACY_PLACEHOLDER_NAME.to_string(),
                        secret_type: SecretType::Database,
                        created_at: item.created_at,
                        tags: Vec::new(),
                        resource_name: None,
                        expires_at: None,
                    })
                    .collect())
            }
        }
    }

    /// Pick up changes made behind this store's back, such as a sync.
    pub async fn refresh_secrets(&self) -> Result<Vec<SecretListItem>> {
        self.load_secrets().await
    }

    pub async fn add_secret(&self, secret: &Secret, master_password: &str) -> Result<()> {
        self.mutate(SAVE_FAILED, self.vault.save_secret(secret, master_password))
            .await
    }

    pub async fn update_secret_by_id(&self, secret: &Secret, master_password: &str) -> Result<()> {
        self.mutate(UPDATE_FAILED, self.vault.update_secret(secret, master_password))
            .await
    }

    /// Delete a secret, or the legacy item with that id.
    pub async fn delete_secret(&self, id: &str) -> Result<()> {
        let op = async {
            match self.vault.delete_secret(id).await {
                Ok(()) => Ok(()),
                Err(e) => {
                    debug!(%id, error = %e, "delete failed, trying legacy item");
                    self.vault.delete_item(id).await
                }
            }
        };
        self.mutate(DELETE_FAILED, op).await
    }

    /// Store a secret in the legacy format.
    pub async fn add_legacy_secret(
        &self,
        id: &str,
        item: &LegacySecret,
        master_password: &str,
    ) -> Result<()> {
        self.mutate(SAVE_FAILED, self.vault.encrypt_item(id, item, master_password))
            .await
    }

    async fn mutate<F>(&self, failure: &str, op: F) -> Result<()>
    where
        F: std::future::Future<Output = Result<()>>,
    {
        self.start(true);
        let result = match op.await {
            Ok(()) => self.fetch_listing().await.map(|items| {
                self.state.lock().secrets = items;
            }),
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            error!(error = %e, "{failure}");
            self.set_error(failure);
        }
        self.done();
        result
    }

    /// Decrypt a secret; a legacy item with the same id is migrated to the
    /// typed shape on the fly (not persisted).
    pub async fn get_secret_by_id(&self, id: &str, master_password: &str) -> Result<Secret> {
        self.start(false);
        let result = match self.vault.get_secret(id, master_password).await {
            Ok(json) => Secret::from_json(&json),
            Err(primary) => {
                debug!(%id, error = %primary, "trying legacy item");
                match self.get_migrated_legacy(id, master_password).await {
                    Ok(secret) => Ok(secret),
                    Err(VaultSyncError::SecretNotFound(_)) => Err(primary),
                    Err(e) => Err(e),
                }
            }
        };
        if let Err(e) = &result {
            error!(%id, error = %e, "{RETRIEVE_FAILED}");
            self.set_error(RETRIEVE_FAILED);
        }
        result
    }

    async fn get_migrated_legacy(&self, id: &str, master_password: &str) -> Result<Secret> {
        let value = self.vault.decrypt_item(id, master_password).await?;
        if !is_legacy_secret(&value) {
            return Err(VaultSyncError::LegacyFormat(format!(
                "item '{id}' has an unrecognized shape"
            )));
        }
        let legacy: LegacySecret = serde_json::from_value(value)
            .map_err(|e| VaultSyncError::LegacyFormat(format!("item '{id}': {e}")))?;
        Ok(migrate_legacy_secret(id, &legacy, Utc::now()))
    }

    /// Decrypt a legacy item as-is.
    pub async fn get_legacy_secret(&self, id: &str, master_password: &str) -> Result<LegacySecret> {
        self.start(false);
        let result = async {
            let value = self.vault.decrypt_item(id, master_password).await?;
            serde_json::from_value(value)
                .map_err(|e| VaultSyncError::LegacyFormat(format!("item '{id}': {e}")))
        }
        .await;
        if result.is_err() {
            self.set_error(RETRIEVE_FAILED);
        }
        result
    }
}
