//! Secret types shared by the vault, the remote client and the sync engine.
//!
//! A [`Secret`] is the unit of storage: an id, a display name, a closed
//! [`SecretType`], a free-form string map of fields, and [`SecretMetadata`]
//! recording where the secret came from and how it relates to the remote
//! store.  [`SecretListItem`] is the plaintext projection the vault keeps
//! next to each ciphertext so listings never need the master password.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, VaultSyncError};

/// Maximum accepted length of a secret id.
const MAX_ID_LEN: usize = 256;

/// Kind of secret.  Unknown kinds coming from the remote store collapse
/// to `Generic` (see [`SecretType::from_str_lossy`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretType {
    Database,
    ApiKey,
    Certificate,
    SshKey,
    #[default]
    Generic,
}

impl SecretType {
    pub const ALL: [SecretType; 5] = [
        SecretType::Database,
        SecretType::ApiKey,
        SecretType::Certificate,
        SecretType::SshKey,
        SecretType::Generic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SecretType::Database => "database",
            SecretType::ApiKey => "api_key",
            SecretType::Certificate => "certificate",
            SecretType::SshKey => "ssh_key",
            SecretType::Generic => "generic",
        }
    }

    /// Parse a type tag, falling back to `Generic` for anything unknown.
    pub fn from_str_lossy(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl fmt::Display for SecretType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SecretType {
    type Err = VaultSyncError;

    fn from_str(s: &str) -> Result<Self> {
        SecretType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                VaultSyncError::InvalidSecret(format!(
                    "unknown secret type '{s}' (expected one of: database, api_key, certificate, ssh_key, generic)"
                ))
            })
    }
}

/// Per-secret synchronization marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Synced,
    #[default]
    Pending,
    Conflict,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretMetadata {
    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    /// Name of the resource this secret grants access to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,

    /// `true` when the secret was authored on this device, `false` when it
    /// was pulled from the remote store.
    #[serde(default)]
    pub is_local: bool,

    #[serde(default)]
    pub sync_status: SyncStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl SecretMetadata {
    /// Metadata for a secret created locally at `now`.
    pub fn local(now: DateTime<Utc>) -> Self {
        Self {
            created_at: now,
            updated_at: None,
            tags: Vec::new(),
            description: None,
            expires_at: None,
            resource_name: None,
            is_local: true,
            sync_status: SyncStatus::Pending,
            last_synced_at: None,
        }
    }
}

/// A decrypted secret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Secret {
    pub id: String,
    pub name: String,

    #[serde(rename = "type")]
    pub secret_type: SecretType,

    pub data: BTreeMap<String, String>,

    pub metadata: SecretMetadata,

    /// Duplicate of `metadata.created_at` kept for older readers.
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Secret {
    /// Build a locally authored secret.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        secret_type: SecretType,
        data: BTreeMap<String, String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            secret_type,
            data,
            metadata: SecretMetadata::local(now),
            created_at: now,
        }
    }

    /// Parse a serialized secret as returned by the vault.
    ///
    /// Field values must be strings; anything else is rejected.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| VaultSyncError::InvalidSecret(format!("not valid JSON: {e}")))?;

        if let Some(data) = value.get("data").and_then(|d| d.as_object()) {
            if let Some((key, _)) = data.iter().find(|(_, v)| !v.is_string()) {
                return Err(VaultSyncError::InvalidSecret(format!(
                    "field '{key}' must be a string"
                )));
            }
        }

        serde_json::from_value(value)
            .map_err(|e| VaultSyncError::InvalidSecret(format!("unexpected shape: {e}")))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| VaultSyncError::SerializationError(format!("secret: {e}")))
    }

    /// Check the structural invariants the vault relies on.
    pub fn validate(&self) -> Result<()> {
        validate_id(&self.id)?;
        if self.name.trim().is_empty() {
            return Err(VaultSyncError::InvalidSecret(
                "secret name cannot be empty".into(),
            ));
        }
        Ok(())
    }

    /// The plaintext listing projection of this secret.
    pub fn list_item(&self) -> SecretListItem {
        SecretListItem {
            id: self.id.clone(),
            name: self.name.clone(),
            secret_type: self.secret_type,
            created_at: self.metadata.created_at,
            tags: self.metadata.tags.clone(),
            resource_name: self.metadata.resource_name.clone(),
            expires_at: self.metadata.expires_at,
        }
    }
}

/// Validate a secret or legacy item id.
///
/// Ids are opaque (remote ids are path leaves), so only emptiness,
/// length, and control characters are rejected.
pub fn validate_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(VaultSyncError::InvalidSecret(
            "secret id cannot be empty".into(),
        ));
    }
    if id.len() > MAX_ID_LEN {
        return Err(VaultSyncError::InvalidSecret(format!(
            "secret id cannot exceed {MAX_ID_LEN} characters"
        )));
    }
    if id.chars().any(char::is_control) {
        return Err(VaultSyncError::InvalidSecret(
            "secret id cannot contain control characters".into(),
        ));
    }
    Ok(())
}

/// Listing entry: everything about a secret except its fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretListItem {
    pub id: String,
    pub name: String,

    #[serde(rename = "type")]
    pub secret_type: SecretType,

    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// The pre-typed secret shape: a database login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacySecret {
    pub name: String,
    pub login: String,
    pub password: String,
    pub host: String,
}

/// Listing entry for a legacy item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyListItem {
    pub id: String,
    pub created_at: DateTime<Utc>,
}

/// Detect the legacy shape: `name`, `login`, `password` and `host` present,
/// `type` and `metadata` absent.
pub fn is_legacy_secret(value: &serde_json::Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };
    ["name", "login", "password", "host"]
        .iter()
        .all(|k| obj.contains_key(*k))
        && !obj.contains_key("type")
        && !obj.contains_key("metadata")
}

/// Convert a legacy item into a typed database secret.
pub fn migrate_legacy_secret(id: &str, legacy: &LegacySecret, now: DateTime<Utc>) -> Secret {
    let data = BTreeMap::from([
        ("host".to_string(), legacy.host.clone()),
        ("username".to_string(), legacy.login.clone()),
        ("password".to_string(), legacy.password.clone()),
        ("database".to_string(), legacy.name.clone()),
    ]);
    let mut secret = Secret::new(id, legacy.name.clone(), SecretType::Database, data, now);
    secret.metadata.description = Some("Migrated from legacy format".to_string());
    secret
}
