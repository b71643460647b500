//! HTTP client for a KV-v2 secret store (OpenBao / Vault).
//!
//! Authenticates by exchanging the user's identity token at
//! `auth/jwt/login`, caches the resulting store token (in memory and in the
//! durable [`KvStore`]), and performs read-only listing and retrieval.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, info, warn};

use super::identity::{is_valid_identity_token, IdentitySource};
use super::types::{
    token_prefix, ListResponse, LoginRequest, LoginResponse, RemoteSecret, SecretResponse,
    TokenInfo,
};
use crate::config::Settings;
use crate::errors::{Result, VaultSyncError};
use crate::state::{get_millis, KvStore, REMOTE_TOKEN_EXPIRY_KEY, REMOTE_TOKEN_KEY};

/// Header carrying the store token on authenticated requests.
pub const TOKEN_HEADER: &str = "X-Vault-Token";

/// The remote operations the sync engine depends on.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Unauthenticated liveness probe.
    async fn health_check(&self) -> bool;

    /// Every readable secret; individual fetch failures are skipped.
    async fn get_all_secrets(&self) -> Result<Vec<RemoteSecret>>;

    fn token_info(&self) -> TokenInfo;
}

/// Connection settings for [`RemoteClient`].
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URL including the API version, e.g. `http://127.0.0.1:8200/v1`.
    pub base_url: String,
    pub mount: String,
    pub role: String,
    pub request_timeout: Duration,
    /// A token is treated as expired this long before its recorded expiry.
    pub refresh_margin: Duration,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8200/v1".to_string(),
            mount: "kv".to_string(),
            role: "default".to_string(),
            request_timeout: Duration::from_secs(30),
            refresh_margin: Duration::from_secs(5 * 60),
        }
    }
}

impl From<&Settings> for RemoteConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            base_url: settings.remote_url.clone(),
            mount: settings.kv_mount.clone(),
            role: settings.auth_role.clone(),
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
            refresh_margin: Duration::from_secs(settings.token_refresh_margin_secs),
        }
    }
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    /// Epoch milliseconds.
    expiry_ms: i64,
}

pub struct RemoteClient {
    http: Client,
    config: RemoteConfig,
    identity: Arc<dyn IdentitySource>,
    state: Arc<dyn KvStore>,
    token: Mutex<Option<CachedToken>>,
}

impl RemoteClient {
    /// Build a client, restoring a persisted store token if one exists.
    ///
    /// A persisted token whose expiry has already passed is removed.
    pub fn new(
        config: RemoteConfig,
        identity: Arc<dyn IdentitySource>,
        state: Arc<dyn KvStore>,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| VaultSyncError::ConfigError(format!("failed to build HTTP client: {e}")))?;

        let client = Self {
            http,
            config,
            identity,
            state,
            token: Mutex::new(None),
        };
        client.restore_token(now_ms())?;
        Ok(client)
    }

    fn restore_token(&self, now_ms: i64) -> Result<()> {
        let token = self.state.get(REMOTE_TOKEN_KEY)?;
        let expiry = get_millis(&*self.state, REMOTE_TOKEN_EXPIRY_KEY)?;
        match (token, expiry) {
            (Some(token), Some(expiry_ms)) if expiry_ms > now_ms => {
                debug!(token = %token_prefix(&token), "restored store token");
                *self.token.lock() = Some(CachedToken { token, expiry_ms });
            }
            (None, None) => {}
            _ => {
                debug!("discarding expired store token");
                self.clear_token()?;
            }
        }
        Ok(())
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    /// Return a usable store token, exchanging the identity token when the
    /// cache is empty, near expiry, or `force_refresh` is set.
    pub async fn get_token(&self, force_refresh: bool) -> Result<String> {
        if !force_refresh {
            if let Some(cached) = self.valid_cached_token(now_ms()) {
                return Ok(cached);
            }
        }

        let jwt = self
            .identity
            .identity_token()?
            .filter(|t| is_valid_identity_token(t, now_ms()))
            .ok_or_else(|| {
                VaultSyncError::Auth(
                    "no valid identity token (missing or expired); run `vaultsync login`".into(),
                )
            })?;

        match self.exchange(&jwt).await {
            Ok(token) => Ok(token),
            Err(e) => {
                self.clear_token()?;
                Err(e)
            }
        }
    }

    async fn exchange(&self, jwt: &str) -> Result<String> {
        let url = format!("{}/auth/jwt/login", self.base());
        debug!(%url, "exchanging identity token");

        let response = self
            .http
            .post(&url)
            .json(&LoginRequest {
                jwt,
                role: &self.config.role,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(VaultSyncError::Auth(format!(
                "token exchange rejected (HTTP {status})"
            )));
        }

        let login: LoginResponse = response
            .json()
            .await
            .map_err(|e| VaultSyncError::Auth(format!("malformed login response: {e}")))?;

        let lease_ms = login.auth.lease_duration.max(0).saturating_mul(1000);
        let expiry_ms = now_ms().saturating_add(lease_ms);
        let token = login.auth.client_token;

        self.state.set(REMOTE_TOKEN_KEY, &token)?;
        self.state
            .set(REMOTE_TOKEN_EXPIRY_KEY, &expiry_ms.to_string())?;
        *self.token.lock() = Some(CachedToken {
            token: token.clone(),
            expiry_ms,
        });

        info!(
            token = %token_prefix(&token),
            lease_secs = login.auth.lease_duration,
            "obtained store token"
        );
        Ok(token)
    }

    fn valid_cached_token(&self, now_ms: i64) -> Option<String> {
        let guard = self.token.lock();
        let cached = guard.as_ref()?;
        self.is_fresh(cached, now_ms).then(|| cached.token.clone())
    }

    fn is_fresh(&self, cached: &CachedToken, now_ms: i64) -> bool {
        let margin = self.config.refresh_margin.as_millis() as i64;
        now_ms < cached.expiry_ms.saturating_sub(margin)
    }

    /// True iff a token is cached and `now` is before `expiry - margin`.
    pub fn is_token_valid(&self) -> bool {
        self.is_token_valid_at(Utc::now())
    }

    pub fn is_token_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.valid_cached_token(now.timestamp_millis()).is_some()
    }

    pub fn current_token(&self) -> Option<String> {
        self.token.lock().as_ref().map(|c| c.token.clone())
    }

    pub fn token_expiry(&self) -> Option<DateTime<Utc>> {
        let expiry_ms = self.token.lock().as_ref()?.expiry_ms;
        Utc.timestamp_millis_opt(expiry_ms).single()
    }

    /// Drop the cached store token from memory and durable state.
    pub fn clear_token(&self) -> Result<()> {
        *self.token.lock() = None;
        self.state.remove(REMOTE_TOKEN_KEY)?;
        self.state.remove(REMOTE_TOKEN_EXPIRY_KEY)
    }

    /// GET with the store token; a 403 refreshes the token and retries once.
    async fn get_authenticated(&self, url: &str) -> Result<Response> {
        let token = self.get_token(false).await?;
        let response = self.http.get(url).header(TOKEN_HEADER, &token).send().await?;
        if response.status() != StatusCode::FORBIDDEN {
            return Ok(response);
        }

        debug!(%url, "store token rejected, refreshing");
        let token = self.get_token(true).await?;
        Ok(self.http.get(url).header(TOKEN_HEADER, &token).send().await?)
    }

    /// Leaf paths under `path`, depth first in listing order.
    ///
    /// Keys ending in `/` are sub-collections and are expanded; a 404 means
    /// the collection does not exist yet and yields nothing.
    pub fn list_secrets<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Vec<String>>> {
        async move {
            let prefix = path.trim_matches('/');
            let url = if prefix.is_empty() {
                format!("{}/{}/metadata?list=true", self.base(), self.config.mount)
            } else {
                format!("{}/{}/metadata/{prefix}?list=true", self.base(), self.config.mount)
            };

            let response = self.get_authenticated(&url).await?;
            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                debug!(path = prefix, "collection not found");
                return Ok(Vec::new());
            }
            if !status.is_success() {
                return Err(VaultSyncError::Fetch(format!(
                    "listing '{prefix}' failed (HTTP {status})"
                )));
            }

            let listing: ListResponse = response.json().await?;
            let mut leaves = Vec::with_capacity(listing.data.keys.len());
            for key in listing.data.keys {
                let full = if prefix.is_empty() {
                    key
                } else {
                    format!("{prefix}/{key}")
                };
                match full.strip_suffix('/') {
                    Some(dir) => leaves.extend(self.list_secrets(dir).await?),
                    None => leaves.push(full),
                }
            }
            Ok(leaves)
        }
        .boxed()
    }

    /// Read one secret.
    pub async fn get_secret(&self, path: &str) -> Result<RemoteSecret> {
        let path = path.trim_matches('/');
        let url = format!("{}/{}/data/{path}", self.base(), self.config.mount);

        let response = self.get_authenticated(&url).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(VaultSyncError::Fetch(format!(
                "reading '{path}' failed (HTTP {status})"
            )));
        }

        let body: SecretResponse = response.json().await?;
        Ok(RemoteSecret::from_kv(
            path,
            &body.data.data,
            body.data.metadata,
        ))
    }

    /// List everything, then read each leaf in order, skipping failures.
    pub async fn get_all_secrets(&self) -> Result<Vec<RemoteSecret>> {
        let paths = self.list_secrets("").await?;
        let mut secrets = Vec::with_capacity(paths.len());
        for path in &paths {
            match self.get_secret(path).await {
                Ok(secret) => secrets.push(secret),
                Err(e) => warn!(%path, error = %e, "skipping unreadable remote secret"),
            }
        }
        debug!(listed = paths.len(), fetched = secrets.len(), "fetched remote secrets");
        Ok(secrets)
    }

    /// True iff `sys/health` answers with a success status.
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/sys/health", self.base());
        match self.http.get(&url).send().await {
            Ok(response) => {
                debug!(status = %response.status(), "health check");
                response.status().is_success()
            }
            Err(e) => {
                debug!(error = %e, "health check failed");
                false
            }
        }
    }

    pub fn token_info(&self) -> TokenInfo {
        TokenInfo {
            token: self.current_token(),
            expiry: self.token_expiry(),
            is_valid: self.is_token_valid(),
        }
    }

    fn base(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }
}

#[async_trait]
impl RemoteStore for RemoteClient {
    async fn health_check(&self) -> bool {
        RemoteClient::health_check(self).await
    }

    async fn get_all_secrets(&self) -> Result<Vec<RemoteSecret>> {
        RemoteClient::get_all_secrets(self).await
    }

    fn token_info(&self) -> TokenInfo {
        RemoteClient::token_info(self)
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
