//! Binary vault file format.
//!
//! A vault file has this layout:
//!
//! ```text
//! [VSYN: 4 bytes][version: 1 byte][header_len: 4 bytes LE][header JSON][body JSON]
//! ```
//!
//! - **Magic** (`VSYN`): identifies the file as a VaultSync vault.
//! - **Version**: format version (currently `1`).
//! - **Header length**: little-endian u32 telling us where the header
//!   JSON ends and the body JSON begins.
//! - **Header JSON**: serialized [`VaultHeader`] (KDF salt and params,
//!   password verifier).
//! - **Body JSON**: serialized [`VaultBody`].  Listing fields are plaintext,
//!   secret contents are AES-256-GCM ciphertexts bound to their id.
//!
//! There is no whole-file MAC: listing and deleting work without the
//! master password, so integrity is enforced per entry by the AEAD tag.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use super::secret::{LegacyListItem, SecretListItem, SecretType};
use crate::crypto::Argon2Params;
use crate::errors::{Result, VaultSyncError};

/// Magic bytes at the start of every vault file.
const MAGIC: &[u8; 4] = b"VSYN";

/// Current binary format version.
pub const CURRENT_VERSION: u8 = 1;

/// Fixed-size prefix: 4 (magic) + 1 (version) + 4 (header_len).
const PREFIX_LEN: usize = 9;

/// Message the password verifier MACs.
const VERIFIER_MESSAGE: &[u8] = b"vaultsync-master-password";

/// Argon2 parameters stored in the header so the exact same KDF
/// settings are used on every unlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredArgon2Params {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl From<Argon2Params> for StoredArgon2Params {
    fn from(p: Argon2Params) -> Self {
        Self {
            memory_kib: p.memory_kib,
            iterations: p.iterations,
            parallelism: p.parallelism,
        }
    }
}

impl From<StoredArgon2Params> for Argon2Params {
    fn from(p: StoredArgon2Params) -> Self {
        Self {
            memory_kib: p.memory_kib,
            iterations: p.iterations,
            parallelism: p.parallelism,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultHeader {
    pub version: u8,

    /// Argon2id salt (base64 in JSON).
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub salt: Vec<u8>,

    pub created_at: DateTime<Utc>,

    pub argon2_params: StoredArgon2Params,

    /// HMAC-SHA256 of a fixed message under the verifier key.
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub verifier: Vec<u8>,
}

/// One encrypted secret plus the fields needed to list it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultEntry {
    pub id: String,
    pub name: String,

    #[serde(rename = "type")]
    pub secret_type: SecretType,

    /// The secret's own `metadata.created_at`.
    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    /// When this entry was last written to disk.
    pub stored_at: DateTime<Utc>,

    /// nonce || ciphertext of the full secret JSON.
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub ciphertext: Vec<u8>,
}

impl VaultEntry {
    pub fn list_item(&self) -> SecretListItem {
        SecretListItem {
            id: self.id.clone(),
            name: self.name.clone(),
            secret_type: self.secret_type,
            created_at: self.created_at,
            tags: self.tags.clone(),
            resource_name: self.resource_name.clone(),
            expires_at: self.expires_at,
        }
    }
}

/// An encrypted legacy (login/password/host) item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyEntry {
    pub id: String,
    pub created_at: DateTime<Utc>,

    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub ciphertext: Vec<u8>,
}

impl LegacyEntry {
    pub fn list_item(&self) -> LegacyListItem {
        LegacyListItem {
            id: self.id.clone(),
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VaultBody {
    #[serde(default)]
    pub entries: Vec<VaultEntry>,

    #[serde(default)]
    pub legacy_items: Vec<LegacyEntry>,
}

/// A fully parsed vault file.
#[derive(Debug, Clone)]
pub struct VaultFile {
    pub header: VaultHeader,
    pub body: VaultBody,
}

/// Write a vault file to disk **atomically** (temp file + rename in the
/// same directory), owner-only on Unix.
pub fn write_vault(path: &Path, file: &VaultFile) -> Result<()> {
    let header_bytes = serde_json::to_vec(&file.header)
        .map_err(|e| VaultSyncError::SerializationError(format!("header: {e}")))?;
    let body_bytes = serde_json::to_vec(&file.body)
        .map_err(|e| VaultSyncError::SerializationError(format!("body: {e}")))?;

    let header_len = u32::try_from(header_bytes.len()).map_err(|_| {
        VaultSyncError::SerializationError(format!(
            "header length {} exceeds u32::MAX",
            header_bytes.len()
        ))
    })?;

    let mut buf = Vec::with_capacity(PREFIX_LEN + header_bytes.len() + body_bytes.len());
    buf.extend_from_slice(MAGIC);
    buf.push(CURRENT_VERSION);
    buf.extend_from_slice(&header_len.to_le_bytes());
    buf.extend_from_slice(&header_bytes);
    buf.extend_from_slice(&body_bytes);

    let parent = path.parent().unwrap_or(Path::new("."));
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = parent.join(format!(
        ".{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy()
    ));

    // A leftover temp file may carry looser permissions; start fresh so
    // the mode below applies from creation.
    match fs::remove_file(&tmp_path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut out = options.open(&tmp_path)?;
    out.write_all(&buf)?;
    out.sync_all()?;
    drop(out);

    fs::rename(&tmp_path, path)?;

    Ok(())
}

/// Read and parse a vault file.
///
/// A missing file means the vault was never initialized.
pub fn read_vault(path: &Path) -> Result<VaultFile> {
    if !path.exists() {
        return Err(VaultSyncError::VaultNotInitialized);
    }

    let data = fs::read(path)?;
    parse_vault(&data)
}

/// Parse vault bytes (split out of `read_vault` for testing).
pub fn parse_vault(data: &[u8]) -> Result<VaultFile> {
    if data.len() < PREFIX_LEN {
        return Err(VaultSyncError::InvalidVaultFormat(
            "file too small to be a valid vault".into(),
        ));
    }

    if &data[0..4] != MAGIC {
        return Err(VaultSyncError::InvalidVaultFormat(
            "missing VSYN magic bytes".into(),
        ));
    }

    let version = data[4];
    if version != CURRENT_VERSION {
        return Err(VaultSyncError::InvalidVaultFormat(format!(
            "unsupported version {version}, expected {CURRENT_VERSION}"
        )));
    }

    let header_len_u32 = u32::from_le_bytes(
        data[5..9]
            .try_into()
            .map_err(|_| VaultSyncError::InvalidVaultFormat("bad header length".into()))?,
    );
    let header_len = usize::try_from(header_len_u32).map_err(|_| {
        VaultSyncError::InvalidVaultFormat(format!(
            "header length {header_len_u32} exceeds platform address space"
        ))
    })?;

    let header_end = PREFIX_LEN + header_len;
    if header_end > data.len() {
        return Err(VaultSyncError::InvalidVaultFormat(
            "header length exceeds file size".into(),
        ));
    }

    let header: VaultHeader = serde_json::from_slice(&data[PREFIX_LEN..header_end])
        .map_err(|e| VaultSyncError::InvalidVaultFormat(format!("header JSON: {e}")))?;

    let body: VaultBody = serde_json::from_slice(&data[header_end..])
        .map_err(|e| VaultSyncError::InvalidVaultFormat(format!("body JSON: {e}")))?;

    Ok(VaultFile { header, body })
}

/// Compute the password verifier for a verifier key.
pub fn compute_verifier(verifier_key: &[u8]) -> Result<Vec<u8>> {
    let mut mac = Hmac::<Sha256>::new_from_slice(verifier_key)
        .map_err(|e| VaultSyncError::KeyDerivationFailed(format!("invalid HMAC key: {e}")))?;
    mac.update(VERIFIER_MESSAGE);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Check a verifier in constant time.  `Ok(false)` means wrong password.
pub fn check_verifier(verifier_key: &[u8], expected: &[u8]) -> Result<bool> {
    let mut mac = Hmac::<Sha256>::new_from_slice(verifier_key)
        .map_err(|e| VaultSyncError::KeyDerivationFailed(format!("invalid HMAC key: {e}")))?;
    mac.update(VERIFIER_MESSAGE);
    Ok(mac.verify_slice(expected).is_ok())
}

// ---------------------------------------------------------------------------
// Serde helpers for base64-encoded Vec<u8> fields
// ---------------------------------------------------------------------------

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

pub(crate) fn base64_encode<S>(data: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&BASE64.encode(data))
}

pub(crate) fn base64_decode<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    BASE64.decode(&s).map_err(serde::de::Error::custom)
}
