//! The externally issued identity token that gets exchanged for a
//! store-scoped token.

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

use crate::errors::Result;
use crate::state::{KvStore, IDENTITY_REFRESH_KEY, IDENTITY_TOKEN_KEY};

/// Where the identity (OIDC) token comes from.
pub trait IdentitySource: Send + Sync {
    fn identity_token(&self) -> Result<Option<String>>;
}

/// A fixed token, e.g. from `VAULTSYNC_IDENTITY_TOKEN`.
#[derive(Clone, Default)]
pub struct StaticIdentity {
    token: Option<String>,
}

impl StaticIdentity {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    pub fn none() -> Self {
        Self { token: None }
    }
}

impl IdentitySource for StaticIdentity {
    fn identity_token(&self) -> Result<Option<String>> {
        Ok(self.token.clone())
    }
}

/// Identity token persisted by `vaultsync login`.
#[derive(Clone)]
pub struct StoredIdentity {
    store: Arc<dyn KvStore>,
}

impl StoredIdentity {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub fn save(&self, token: &str) -> Result<()> {
        self.store.set(IDENTITY_TOKEN_KEY, token.trim())
    }

    /// Forget the identity token and its refresh token.
    pub fn clear(&self) -> Result<()> {
        self.store.remove(IDENTITY_TOKEN_KEY)?;
        self.store.remove(IDENTITY_REFRESH_KEY)
    }
}

impl IdentitySource for StoredIdentity {
    fn identity_token(&self) -> Result<Option<String>> {
        self.store.get(IDENTITY_TOKEN_KEY)
    }
}

/// Structural JWT check: three dot-separated parts, a base64url payload
/// that decodes to a JSON object, and an `exp` claim (seconds) that has
/// not passed at `now_ms`.  The signature is not verified; the remote
/// store does that during the exchange.
pub fn is_valid_identity_token(token: &str, now_ms: i64) -> bool {
    let parts: Vec<&str> = token.trim().split('.').collect();
    if parts.len() != 3 {
        return false;
    }
    let Ok(payload) = URL_SAFE_NO_PAD.decode(parts[1].trim_end_matches('=')) else {
        return false;
    };
    let Ok(serde_json::Value::Object(claims)) = serde_json::from_slice(&payload) else {
        return false;
    };
    match claims.get("exp") {
        None => true,
        Some(exp) => match exp.as_f64() {
            Some(exp) => exp * 1000.0 >= now_ms as f64,
            None => false,
        },
    }
}
