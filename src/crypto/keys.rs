//! Sub-key derivation with HKDF-SHA256.
//!
//! The Argon2id output is never used directly.  From it we expand:
//! - one AES key per secret id (`vaultsync-secret:<id>`), and one per
//!   legacy item id (`vaultsync-legacy:<id>`);
//! - a verifier key used to check the master password without
//!   decrypting any entry.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::errors::{Result, VaultSyncError};

const KEY_LEN: usize = 32;

/// Derive the encryption key for the secret with the given id.
pub fn derive_secret_key(master_key: &[u8], secret_id: &str) -> Result<[u8; KEY_LEN]> {
    let info = format!("vaultsync-secret:{secret_id}");
    hkdf_derive(master_key, info.as_bytes())
}

/// Derive the encryption key for a legacy (login/password/host) item.
pub fn derive_legacy_key(master_key: &[u8], item_id: &str) -> Result<[u8; KEY_LEN]> {
    let info = format!("vaultsync-legacy:{item_id}");
    hkdf_derive(master_key, info.as_bytes())
}

/// Derive the key the password verifier is computed with.
pub fn derive_verifier_key(master_key: &[u8]) -> Result<[u8; KEY_LEN]> {
    hkdf_derive(master_key, b"vaultsync-verifier")
}

// The master key already carries Argon2id entropy, so only `expand` runs.
fn hkdf_derive(ikm: &[u8], info: &[u8]) -> Result<[u8; KEY_LEN]> {
    let hk = Hkdf::<Sha256>::new(None, ikm);

    let mut okm = [0u8; KEY_LEN];
    hk.expand(info, &mut okm)
        .map_err(|e| VaultSyncError::KeyDerivationFailed(format!("HKDF expand failed: {e}")))?;

    Ok(okm)
}

/// A 32-byte master key that zeroes its memory when dropped.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct MasterKey {
    bytes: [u8; KEY_LEN],
}

impl MasterKey {
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    pub fn derive_secret_key(&self, secret_id: &str) -> Result<[u8; KEY_LEN]> {
        derive_secret_key(&self.bytes, secret_id)
    }

    pub fn derive_legacy_key(&self, item_id: &str) -> Result<[u8; KEY_LEN]> {
        derive_legacy_key(&self.bytes, item_id)
    }

    pub fn derive_verifier_key(&self) -> Result<[u8; KEY_LEN]> {
        derive_verifier_key(&self.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_and_legacy_keys_differ_for_same_id() {
        let master = [3u8; KEY_LEN];
        let a = derive_secret_key(&master, "db").unwrap();
        let b = derive_legacy_key(&master, "db").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn per_id_keys_are_distinct() {
        let master = MasterKey::new([9u8; KEY_LEN]);
        assert_ne!(
            master.derive_secret_key("a").unwrap(),
            master.derive_secret_key("b").unwrap()
        );
    }
}
