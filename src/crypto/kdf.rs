//! Master key derivation from the vault password (Argon2id).
//!
//! The cost parameters travel with the vault header, so a vault created
//! with one `.vaultsync.toml` stays readable after the config changes.

use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;

use crate::errors::{Result, VaultSyncError};

/// Salt length in bytes.
pub const SALT_LEN: usize = 32;

/// Derived key length in bytes (AES-256).
const KEY_LEN: usize = 32;

/// Lowest memory cost a vault may be created or opened with (8 MiB).
pub const MIN_MEMORY_KIB: u32 = 8_192;

/// Argon2id cost parameters, mirrored by the `argon2_*` settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argon2Params {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    pub iterations: u32,
    /// Parallelism lanes.
    pub parallelism: u32,
}

impl Default for Argon2Params {
    /// 64 MiB, 3 passes, 4 lanes.
    fn default() -> Self {
        Self {
            memory_kib: 65_536,
            iterations: 3,
            parallelism: 4,
        }
    }
}

impl Argon2Params {
    /// The cheapest accepted parameters. Only meant for tests and
    /// throwaway vaults.
    pub fn minimal() -> Self {
        Self {
            memory_kib: MIN_MEMORY_KIB,
            iterations: 1,
            parallelism: 1,
        }
    }

    fn check(&self) -> Result<Params> {
        if self.memory_kib < MIN_MEMORY_KIB {
            return Err(VaultSyncError::KeyDerivationFailed(format!(
                "argon2 memory cost must be at least {MIN_MEMORY_KIB} KiB (got {})",
                self.memory_kib
            )));
        }
        if self.iterations == 0 || self.parallelism == 0 {
            return Err(VaultSyncError::KeyDerivationFailed(
                "argon2 iterations and parallelism must be non-zero".into(),
            ));
        }
        Params::new(self.memory_kib, self.iterations, self.parallelism, Some(KEY_LEN))
            .map_err(|e| VaultSyncError::KeyDerivationFailed(format!("argon2 parameters: {e}")))
    }
}

/// Derive the 32-byte vault master key.  Deterministic in
/// `(password, salt, params)`.
pub fn derive_master_key_with_params(
    password: &[u8],
    salt: &[u8],
    params: &Argon2Params,
) -> Result<[u8; KEY_LEN]> {
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params.check()?);

    let mut key = [0u8; KEY_LEN];
    argon2
        .hash_password_into(password, salt, &mut key)
        .map_err(|e| VaultSyncError::KeyDerivationFailed(format!("argon2id: {e}")))?;
    Ok(key)
}

/// Fresh random salt for a new vault or a password change.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    salt
}
