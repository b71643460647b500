//! Durable key/value storage for small scalars that must survive a
//! restart: the cached store token and its expiry, the last sync time,
//! and the identity token.
//!
//! Values are plain strings; no versioning.

mod file;

pub use file::JsonFileStore;

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::errors::Result;

/// Store-scoped token issued by the remote secret store.
pub const REMOTE_TOKEN_KEY: &str = "token_ob";
/// Epoch milliseconds at which the remote token expires.
pub const REMOTE_TOKEN_EXPIRY_KEY: &str = "token_ob_expiry";
/// Epoch milliseconds of the last successful sync.
pub const LAST_SYNC_KEY: &str = "last_sync_time";
/// Identity (OIDC) token supplied by the login flow.
pub const IDENTITY_TOKEN_KEY: &str = "token";
/// Identity refresh token; only ever removed here.
pub const IDENTITY_REFRESH_KEY: &str = "refresh";

/// Keyed storage with get/set/remove semantics.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// Process-local store, used in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.values.lock().remove(key);
        Ok(())
    }
}

/// Read an epoch-milliseconds value; unparsable values read as absent.
pub fn get_millis(store: &dyn KvStore, key: &str) -> Result<Option<i64>> {
    Ok(store.get(key)?.and_then(|v| v.trim().parse().ok()))
}
