//! OS keyring backend for the durable key/value state.
//!
//! Keeps the store token (and anything else written through [`KvStore`])
//! in the operating system's credential store instead of a plain file:
//! - macOS: Keychain
//! - Windows: Credential Manager
//! - Linux: Secret Service (GNOME Keyring / KDE Wallet)

use crate::errors::{Result, VaultSyncError};
use crate::state::KvStore;

/// Service name used in the OS keyring.
const SERVICE_NAME: &str = "vaultsync";

/// Keyring-backed [`KvStore`], namespaced by a profile (usually the vault path).
pub struct KeyringStore {
    profile: String,
}

impl KeyringStore {
    pub fn new(profile: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry> {
        keyring::Entry::new(SERVICE_NAME, &format!("{}:{key}", self.profile)).map_err(|e| {
            VaultSyncError::KeyringError(format!("failed to create keyring entry: {e}"))
        })
    }
}

impl KvStore for KeyringStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(VaultSyncError::KeyringError(format!(
                "failed to read from keyring: {e}"
            ))),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entry(key)?.set_password(value).map_err(|e| {
            VaultSyncError::KeyringError(format!("failed to store value in keyring: {e}"))
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(VaultSyncError::KeyringError(format!(
                "failed to delete from keyring: {e}"
            ))),
        }
    }
}
