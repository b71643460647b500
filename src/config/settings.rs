use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::crypto::Argon2Params;
use crate::errors::{Result, VaultSyncError};

/// Project-level configuration, loaded from `.vaultsync.toml`.
///
/// Every field has a default so VaultSync works without a config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Base URL of the remote KV store, including the API version.
    #[serde(default = "default_remote_url")]
    pub remote_url: String,

    /// Role sent with the JWT login.
    #[serde(default = "default_auth_role")]
    pub auth_role: String,

    /// Mount name of the KV-v2 engine.
    #[serde(default = "default_kv_mount")]
    pub kv_mount: String,

    /// Periodic sync interval; also the staleness threshold for `needs_sync`.
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Store tokens are refreshed this long before they expire.
    #[serde(default = "default_token_refresh_margin_secs")]
    pub token_refresh_margin_secs: u64,

    /// Directory (relative to project root) holding the vault and state files.
    #[serde(default = "default_vault_dir")]
    pub vault_dir: String,

    /// Argon2 memory cost in KiB (default: 64 MB).
    #[serde(default = "default_argon2_memory_kib")]
    pub argon2_memory_kib: u32,

    #[serde(default = "default_argon2_iterations")]
    pub argon2_iterations: u32,

    #[serde(default = "default_argon2_parallelism")]
    pub argon2_parallelism: u32,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_remote_url() -> String {
    "http://127.0.0.1:8200/v1".to_string()
}

fn default_auth_role() -> String {
    "default".to_string()
}

fn default_kv_mount() -> String {
    "kv".to_string()
}

fn default_sync_interval_secs() -> u64 {
    600
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_token_refresh_margin_secs() -> u64 {
    300
}

fn default_vault_dir() -> String {
    ".vaultsync".to_string()
}

fn default_argon2_memory_kib() -> u32 {
    65_536 // 64 MB
}

fn default_argon2_iterations() -> u32 {
    3
}

fn default_argon2_parallelism() -> u32 {
    4
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            remote_url: default_remote_url(),
            auth_role: default_auth_role(),
            kv_mount: default_kv_mount(),
            sync_interval_secs: default_sync_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            token_refresh_margin_secs: default_token_refresh_margin_secs(),
            vault_dir: default_vault_dir(),
            argon2_memory_kib: default_argon2_memory_kib(),
            argon2_iterations: default_argon2_iterations(),
            argon2_parallelism: default_argon2_parallelism(),
        }
    }
}

impl Settings {
    /// Name of the config file we look for in the project root.
    pub const FILE_NAME: &'static str = ".vaultsync.toml";

    /// Load settings from `<project_dir>/.vaultsync.toml`.
    ///
    /// A missing file yields defaults; an unparsable one is an error.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let config_path = project_dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            VaultSyncError::ConfigError(format!("Failed to parse {}: {e}", config_path.display()))
        })?;

        if settings.sync_interval_secs == 0 {
            return Err(VaultSyncError::ConfigError(
                "sync_interval_secs must be greater than zero".into(),
            ));
        }

        Ok(settings)
    }

    /// `project_dir/<vault_dir>`
    pub fn vault_dir_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.vault_dir)
    }

    /// `project_dir/<vault_dir>/vault.bin`
    pub fn vault_path(&self, project_dir: &Path) -> PathBuf {
        self.vault_dir_path(project_dir).join("vault.bin")
    }

    /// `project_dir/<vault_dir>/state.json`
    pub fn state_path(&self, project_dir: &Path) -> PathBuf {
        self.vault_dir_path(project_dir).join("state.json")
    }

    /// Convert the Argon2 settings into crypto-layer params.
    pub fn argon2_params(&self) -> Argon2Params {
        Argon2Params {
            memory_kib: self.argon2_memory_kib,
            iterations: self.argon2_iterations,
            parallelism: self.argon2_parallelism,
        }
    }

    pub fn sync_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sync_interval_secs)
    }
}

// ── Tests ────────────────────────────────────────────────────────────
