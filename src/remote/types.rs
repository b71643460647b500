//! Wire types of the KV-v2 secret store API and the secret shape the
//! client hands to the sync engine.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::vault::SecretType;

/// `POST auth/jwt/login` request body.
#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub jwt: &'a str,
    pub role: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    pub auth: LoginAuth,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginAuth {
    pub client_token: String,
    /// Seconds.
    #[serde(default)]
    pub lease_duration: i64,
}

/// `GET <mount>/metadata/<path>?list=true`
#[derive(Debug, Deserialize)]
pub(crate) struct ListResponse {
    pub data: ListData,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListData {
    #[serde(default)]
    pub keys: Vec<String>,
}

/// `GET <mount>/data/<path>`
#[derive(Debug, Deserialize)]
pub(crate) struct SecretResponse {
    pub data: SecretEnvelope,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SecretEnvelope {
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub metadata: RemoteMetadata,
}

/// Version metadata the store keeps per secret.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteMetadata {
    /// RFC 3339; kept raw so an odd value never fails the whole fetch.
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub destroyed: bool,
}

impl RemoteMetadata {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_time
            .as_deref()
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc))
    }
}

/// A secret as read from the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteSecret {
    /// Last segment of the storage path.
    pub id: String,
    pub name: String,
    pub secret_type: SecretType,
    pub data: BTreeMap<String, String>,
    pub metadata: RemoteMetadata,
}

impl RemoteSecret {
    /// Build from a stored KV payload at `path`.
    ///
    /// `name` and `type` are read from the payload when they are strings;
    /// non-string scalars are stringified and nulls dropped.
    pub fn from_kv(
        path: &str,
        data: &serde_json::Map<String, serde_json::Value>,
        metadata: RemoteMetadata,
    ) -> Self {
        let id = path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(path)
            .to_string();
        let name = data
            .get("name")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| id.clone());
        let secret_type = data
            .get("type")
            .and_then(|v| v.as_str())
            .map(SecretType::from_str_lossy)
            .unwrap_or_default();

        let data = data
            .iter()
            .filter_map(|(k, v)| {
                let value = match v {
                    serde_json::Value::Null => return None,
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Some((k.clone(), value))
            })
            .collect();

        Self {
            id,
            name,
            secret_type,
            data,
            metadata,
        }
    }
}

/// Snapshot of the cached store token, for status displays.
#[derive(Clone, Default, PartialEq)]
pub struct TokenInfo {
    pub token: Option<String>,
    pub expiry: Option<DateTime<Utc>>,
    pub is_valid: bool,
}

impl fmt::Debug for TokenInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenInfo")
            .field("token", &self.token.as_deref().map(token_prefix))
            .field("expiry", &self.expiry)
            .field("is_valid", &self.is_valid)
            .finish()
    }
}

/// First few characters of a token, safe to log.
pub fn token_prefix(token: &str) -> String {
    let prefix: String = token.chars().take(6).collect();
    format!("{prefix}…")
}
