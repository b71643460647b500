//! Synchronous vault operations over a single vault file.
//!
//! `VaultStore` is stateless apart from its path and KDF settings: every
//! call reads the file, and every mutation rewrites it atomically while
//! holding an in-process write lock.  Calls that touch ciphertext take the
//! master password and verify it against the header before doing anything.

use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::Mutex;
use tracing::debug;
use zeroize::{Zeroize, Zeroizing};

use crate::crypto::encryption::{decrypt, encrypt};
use crate::crypto::kdf::{derive_master_key_with_params, generate_salt, Argon2Params};
use crate::crypto::keys::MasterKey;
use crate::errors::{Result, VaultSyncError};

use super::format::{
    self, check_verifier, compute_verifier, LegacyEntry, VaultBody, VaultEntry, VaultFile,
    VaultHeader, CURRENT_VERSION,
};
use super::secret::{validate_id, LegacyListItem, LegacySecret, Secret, SecretListItem};

/// Minimum master password length.
pub const MIN_PASSWORD_LEN: usize = 8;

pub struct VaultStore {
    path: PathBuf,
    params: Argon2Params,
    write_lock: Mutex<()>,
}

impl VaultStore {
    /// `params` are used when the vault is initialized or re-keyed;
    /// unlocking always uses the params stored in the header.
    pub fn new(path: impl Into<PathBuf>, params: Argon2Params) -> Self {
        Self {
            path: path.into(),
            params,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    pub fn is_initialized(&self) -> Result<bool> {
        match format::read_vault(&self.path) {
            Ok(_) => Ok(true),
            Err(VaultSyncError::VaultNotInitialized) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Create an empty vault protected by `master_password`.
    pub fn initialize(&self, master_password: &str) -> Result<()> {
        check_password_strength(master_password)?;

        let _guard = self.write_lock.lock();
        if self.path.exists() {
            return Err(VaultSyncError::VaultAlreadyInitialized);
        }

        let (header, _key) = self.new_header(master_password, Utc::now())?;
        format::write_vault(
            &self.path,
            &VaultFile {
                header,
                body: VaultBody::default(),
            },
        )?;
        debug!(path = %self.path.display(), "vault initialized");
        Ok(())
    }

    /// `Ok(false)` for a wrong password, `Err` if the vault is unreadable.
    pub fn verify_password(&self, master_password: &str) -> Result<bool> {
        let file = format::read_vault(&self.path)?;
        match unlock(&file.header, master_password) {
            Ok(_) => Ok(true),
            Err(VaultSyncError::WrongPassword) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Re-encrypt every entry under `new_password` with a fresh salt.
    pub fn change_master_password(&self, old_password: &str, new_password: &str) -> Result<()> {
        check_password_strength(new_password)?;

        let _guard = self.write_lock.lock();
        let mut file = format::read_vault(&self.path)?;
        let old_key = unlock(&file.header, old_password)?;
        let (new_header, new_key) = self.new_header(new_password, file.header.created_at)?;

        for entry in &mut file.body.entries {
            let mut plain = open_entry(&old_key, entry)?;
            entry.ciphertext = seal_secret(&new_key, &entry.id, &plain)?;
            plain.zeroize();
        }
        for item in &mut file.body.legacy_items {
            let mut plain = open_legacy(&old_key, item)?;
            item.ciphertext = seal_legacy(&new_key, &item.id, &plain)?;
            plain.zeroize();
        }

        file.header = new_header;
        format::write_vault(&self.path, &file)?;
        debug!(
            entries = file.body.entries.len(),
            legacy = file.body.legacy_items.len(),
            "master password changed"
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Secrets
    // ------------------------------------------------------------------

    /// Insert or replace the secret with `secret.id`.
    pub fn save_secret(&self, secret: &Secret, master_password: &str) -> Result<()> {
        self.write_secret(secret, master_password, false)
    }

    /// Replace an existing secret; fails with `SecretNotFound` otherwise.
    pub fn update_secret(&self, secret: &Secret, master_password: &str) -> Result<()> {
        self.write_secret(secret, master_password, true)
    }

    /// Decrypt a secret and return its serialized JSON.
    pub fn get_secret(&self, id: &str, master_password: &str) -> Result<String> {
        let file = format::read_vault(&self.path)?;
        let key = unlock(&file.header, master_password)?;
        let entry = file
            .body
            .entries
            .iter()
            .find(|e| e.id == id)
            .ok_or_else(|| VaultSyncError::SecretNotFound(id.to_string()))?;

        let plain = open_entry(&key, entry)?;
        String::from_utf8(plain).map_err(|e| {
            let mut bad = e.into_bytes();
            bad.zeroize();
            VaultSyncError::SerializationError("secret is not valid UTF-8".into())
        })
    }

    /// Listing of every secret, sorted by name.  No password required.
    pub fn list_secrets(&self) -> Result<Vec<SecretListItem>> {
        let file = format::read_vault(&self.path)?;
        let mut items: Vec<SecretListItem> =
            file.body.entries.iter().map(VaultEntry::list_item).collect();
        items.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(items)
    }

    pub fn delete_secret(&self, id: &str) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut file = format::read_vault(&self.path)?;
        let before = file.body.entries.len();
        file.body.entries.retain(|e| e.id != id);
        if file.body.entries.len() == before {
            return Err(VaultSyncError::SecretNotFound(id.to_string()));
        }
        format::write_vault(&self.path, &file)
    }

    // ------------------------------------------------------------------
    // Legacy items
    // ------------------------------------------------------------------

    pub fn encrypt_item(&self, id: &str, item: &LegacySecret, master_password: &str) -> Result<()> {
        validate_id(id)?;
        let plain = Zeroizing::new(
            serde_json::to_vec(item)
                .map_err(|e| VaultSyncError::SerializationError(format!("legacy item: {e}")))?,
        );

        let _guard = self.write_lock.lock();
        let mut file = format::read_vault(&self.path)?;
        let key = unlock(&file.header, master_password)?;
        let ciphertext = seal_legacy(&key, id, &plain)?;

        let created_at = file
            .body
            .legacy_items
            .iter()
            .find(|i| i.id == id)
            .map_or_else(Utc::now, |i| i.created_at);
        file.body.legacy_items.retain(|i| i.id != id);
        file.body.legacy_items.push(LegacyEntry {
            id: id.to_string(),
            created_at,
            ciphertext,
        });
        format::write_vault(&self.path, &file)
    }

    /// Decrypt a legacy item into raw JSON; shape checks are the caller's.
    pub fn decrypt_item(&self, id: &str, master_password: &str) -> Result<serde_json::Value> {
        let file = format::read_vault(&self.path)?;
        let key = unlock(&file.header, master_password)?;
        let item = file
            .body
            .legacy_items
            .iter()
            .find(|i| i.id == id)
            .ok_or_else(|| VaultSyncError::SecretNotFound(id.to_string()))?;

        let plain = Zeroizing::new(open_legacy(&key, item)?);
        serde_json::from_slice(&plain)
            .map_err(|e| VaultSyncError::LegacyFormat(format!("legacy item '{id}': {e}")))
    }

    pub fn list_items(&self) -> Result<Vec<LegacyListItem>> {
        let file = format::read_vault(&self.path)?;
        Ok(file
            .body
            .legacy_items
            .iter()
            .map(LegacyEntry::list_item)
            .collect())
    }

    pub fn delete_item(&self, id: &str) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut file = format::read_vault(&self.path)?;
        let before = file.body.legacy_items.len();
        file.body.legacy_items.retain(|i| i.id != id);
        if file.body.legacy_items.len() == before {
            return Err(VaultSyncError::SecretNotFound(id.to_string()));
        }
        format::write_vault(&self.path, &file)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn write_secret(&self, secret: &Secret, master_password: &str, must_exist: bool) -> Result<()> {
        secret.validate()?;
        let plain = Zeroizing::new(secret.to_json()?.into_bytes());

        let _guard = self.write_lock.lock();
        let mut file = format::read_vault(&self.path)?;
        let key = unlock(&file.header, master_password)?;

        let exists = file.body.entries.iter().any(|e| e.id == secret.id);
        if must_exist && !exists {
            return Err(VaultSyncError::SecretNotFound(secret.id.clone()));
        }

        let item = secret.list_item();
        let entry = VaultEntry {
            id: item.id,
            name: item.name,
            secret_type: item.secret_type,
            created_at: item.created_at,
            tags: item.tags,
            resource_name: item.resource_name,
            expires_at: item.expires_at,
            stored_at: Utc::now(),
            ciphertext: seal_secret(&key, &secret.id, &plain)?,
        };

        match file.body.entries.iter_mut().find(|e| e.id == entry.id) {
            Some(slot) => *slot = entry,
            None => file.body.entries.push(entry),
        }
        format::write_vault(&self.path, &file)?;
        debug!(id = %secret.id, replaced = exists, "secret stored");
        Ok(())
    }

    fn new_header(
        &self,
        master_password: &str,
        created_at: chrono::DateTime<Utc>,
    ) -> Result<(VaultHeader, MasterKey)> {
        let salt = generate_salt();
        let key = derive_key(master_password, &salt, &self.params)?;
        let mut verifier_key = key.derive_verifier_key()?;
        let verifier = compute_verifier(&verifier_key);
        verifier_key.zeroize();

        Ok((
            VaultHeader {
                version: CURRENT_VERSION,
                salt: salt.to_vec(),
                created_at,
                argon2_params: self.params.into(),
                verifier: verifier?,
            },
            key,
        ))
    }
}

/// Minimum length in characters, not bytes.
pub fn check_password_strength(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(VaultSyncError::CommandFailed(format!(
            "master password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn derive_key(password: &str, salt: &[u8], params: &Argon2Params) -> Result<MasterKey> {
    let mut bytes = derive_master_key_with_params(password.as_bytes(), salt, params)?;
    let key = MasterKey::new(bytes);
    bytes.zeroize();
    Ok(key)
}

/// Derive the master key from the header and check the verifier.
fn unlock(header: &VaultHeader, master_password: &str) -> Result<MasterKey> {
    let key = derive_key(master_password, &header.salt, &header.argon2_params.into())?;
    let mut verifier_key = key.derive_verifier_key()?;
    let ok = check_verifier(&verifier_key, &header.verifier);
    verifier_key.zeroize();
    if ok? {
        Ok(key)
    } else {
        Err(VaultSyncError::WrongPassword)
    }
}

fn seal_secret(key: &MasterKey, id: &str, plain: &[u8]) -> Result<Vec<u8>> {
    let mut k = key.derive_secret_key(id)?;
    let sealed = encrypt(&k, plain, id.as_bytes());
    k.zeroize();
    sealed
}

fn open_entry(key: &MasterKey, entry: &VaultEntry) -> Result<Vec<u8>> {
    let mut k = key.derive_secret_key(&entry.id)?;
    let plain = decrypt(&k, &entry.ciphertext, entry.id.as_bytes());
    k.zeroize();
    plain
}

fn seal_legacy(key: &MasterKey, id: &str, plain: &[u8]) -> Result<Vec<u8>> {
    let mut k = key.derive_legacy_key(id)?;
    let sealed = encrypt(&k, plain, id.as_bytes());
    k.zeroize();
    sealed
}

fn open_legacy(key: &MasterKey, item: &LegacyEntry) -> Result<Vec<u8>> {
    let mut k = key.derive_legacy_key(&item.id)?;
    let plain = decrypt(&k, &item.ciphertext, item.id.as_bytes());
    k.zeroize();
    plain
}
