//! CLI module — Clap argument parser, output helpers, and command implementations.

pub mod commands;
pub mod output;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use zeroize::Zeroizing;

use crate::config::Settings;
use crate::errors::{Result, VaultSyncError};
use crate::remote::{IdentitySource, RemoteClient, RemoteConfig, StaticIdentity, StoredIdentity};
use crate::state::KvStore;
use crate::sync::SyncManager;
use crate::vault::store::check_password_strength;
use crate::vault::{FileVault, VaultGateway};

/// VaultSync CLI: local encrypted secret vault synced from OpenBao/Vault.
#[derive(Parser)]
#[command(
    name = "vaultsync",
    about = "Local encrypted secret vault with pull sync from an OpenBao/Vault KV store",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Vault directory (default: from .vaultsync.toml, else .vaultsync)
    #[arg(long, global = true)]
    pub vault_dir: Option<String>,

    /// Base URL of the remote store, including /v1
    #[arg(long, env = "VAULTSYNC_REMOTE_URL", global = true)]
    pub remote_url: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Initialize a new vault
    Init,

    /// Add a secret to the local vault
    Add {
        /// Secret id (unique within the vault)
        id: String,
        /// Display name (default: the id)
        #[arg(long)]
        name: Option<String>,
        /// database, api_key, certificate, ssh_key or generic
        #[arg(long = "type", default_value = "generic")]
        secret_type: String,
        /// Field as key=value (repeatable)
        #[arg(short, long = "field", value_name = "KEY=VALUE")]
        fields: Vec<String>,
        /// Tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        description: Option<String>,
    },

    /// Decrypt and print a secret
    Get {
        id: String,
        /// Print the full secret as JSON
        #[arg(long)]
        json: bool,
    },

    /// List all secrets
    List,

    /// Delete a secret
    Delete {
        id: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Change the vault's master password
    ChangePassword,

    /// Store the identity token used to authenticate to the remote store
    Login {
        /// Identity (OIDC) JWT; read from stdin when omitted
        #[arg(long)]
        token: Option<String>,
    },

    /// Forget the identity token and the cached store token
    Logout,

    /// Pull secrets from the remote store
    Sync {
        /// Always run an incremental sync
        #[arg(long)]
        force: bool,
    },

    /// Sync now, then periodically until interrupted
    Watch,

    /// Show sync status
    Status {
        #[arg(long)]
        json: bool,
    },

    /// Check whether the remote store is reachable
    Check,
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Everything a command needs, built from the CLI flags and `.vaultsync.toml`.
pub struct Context {
    pub project_dir: PathBuf,
    pub settings: Settings,
    pub state: Arc<dyn KvStore>,
    pub vault: Arc<FileVault>,
}

impl Context {
    pub fn load(cli: &Cli) -> Result<Self> {
        let project_dir = std::env::current_dir()?;
        let mut settings = Settings::load(&project_dir)?;
        if let Some(dir) = &cli.vault_dir {
            settings.vault_dir = dir.clone();
        }
        if let Some(url) = &cli.remote_url {
            settings.remote_url = url.clone();
        }

        let vault = Arc::new(FileVault::new(
            settings.vault_path(&project_dir),
            settings.argon2_params(),
        ));
        let state = open_state(&settings, &project_dir);

        Ok(Self {
            project_dir,
            settings,
            state,
            vault,
        })
    }

    pub fn gateway(&self) -> Arc<dyn VaultGateway> {
        self.vault.clone()
    }

    pub fn stored_identity(&self) -> StoredIdentity {
        StoredIdentity::new(Arc::clone(&self.state))
    }

    /// `VAULTSYNC_IDENTITY_TOKEN` wins over a token saved by `login`.
    pub fn identity(&self) -> Arc<dyn IdentitySource> {
        match std::env::var("VAULTSYNC_IDENTITY_TOKEN") {
            Ok(token) if !token.trim().is_empty() => Arc::new(StaticIdentity::new(token.trim())),
            _ => Arc::new(self.stored_identity()),
        }
    }

    pub fn remote_client(&self) -> Result<Arc<RemoteClient>> {
        Ok(Arc::new(RemoteClient::new(
            RemoteConfig::from(&self.settings),
            self.identity(),
            Arc::clone(&self.state),
        )?))
    }

    pub fn sync_manager(&self, remote: Arc<RemoteClient>) -> Result<SyncManager> {
        SyncManager::new(
            remote,
            self.gateway(),
            Arc::clone(&self.state),
            self.settings.sync_interval(),
        )
    }

    /// Prompt for the master password and check it against the vault.
    pub async fn unlock(&self) -> Result<Zeroizing<String>> {
        if !self.vault.is_vault_initialized().await? {
            return Err(VaultSyncError::VaultNotInitialized);
        }
        let password = prompt_password()?;
        if !self.vault.verify_vault_password(&password).await? {
            return Err(VaultSyncError::WrongPassword);
        }
        Ok(password)
    }
}

#[cfg(feature = "keyring-store")]
fn open_state(settings: &Settings, project_dir: &std::path::Path) -> Arc<dyn KvStore> {
    let profile = settings.vault_path(project_dir).to_string_lossy().to_string();
    Arc::new(crate::keyring::KeyringStore::new(profile))
}

#[cfg(not(feature = "keyring-store"))]
fn open_state(settings: &Settings, project_dir: &std::path::Path) -> Arc<dyn KvStore> {
    Arc::new(crate::state::JsonFileStore::new(
        settings.state_path(project_dir),
    ))
}

/// Get the master password, trying in order:
/// 1. `VAULTSYNC_PASSWORD` env var (CI/CD)
/// 2. Interactive prompt
///
/// Returns `Zeroizing<String>` so the password is wiped from memory on drop.
pub fn prompt_password() -> Result<Zeroizing<String>> {
    if let Ok(pw) = std::env::var("VAULTSYNC_PASSWORD") {
        if !pw.is_empty() {
            return Ok(Zeroizing::new(pw));
        }
    }

    let pw = dialoguer::Password::new()
        .with_prompt("Enter master password")
        .interact()
        .map_err(|e| VaultSyncError::CommandFailed(format!("password prompt: {e}")))?;
    Ok(Zeroizing::new(pw))
}

/// Prompt for a new password with confirmation.
///
/// `VAULTSYNC_NEW_PASSWORD` (then `VAULTSYNC_PASSWORD`, for `init`) is
/// honored for scripted usage.  Enforces a minimum password length.
pub fn prompt_new_password(env_var: &str) -> Result<Zeroizing<String>> {
    if let Ok(pw) = std::env::var(env_var) {
        if !pw.is_empty() {
            check_password_strength(&pw)?;
            return Ok(Zeroizing::new(pw));
        }
    }

    loop {
        let password = dialoguer::Password::new()
            .with_prompt("Choose master password")
            .with_confirmation(
                "Confirm master password",
                "Passwords do not match, try again",
            )
            .interact()
            .map_err(|e| VaultSyncError::CommandFailed(format!("password prompt: {e}")))?;

        if let Err(e) = check_password_strength(&password) {
            output::warning(&format!("{e}. Try again."));
            continue;
        }

        return Ok(Zeroizing::new(password));
    }
}

/// Parse `KEY=VALUE` field arguments.  The value may itself contain `=`.
pub fn parse_fields(fields: &[String]) -> Result<std::collections::BTreeMap<String, String>> {
    let mut data = std::collections::BTreeMap::new();
    for field in fields {
        let (key, value) = field.split_once('=').ok_or_else(|| {
            VaultSyncError::InvalidSecret(format!("field '{field}' must look like KEY=VALUE"))
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(VaultSyncError::InvalidSecret(format!(
                "field '{field}' has an empty key"
            )));
        }
        data.insert(key.to_string(), value.to_string());
    }
    Ok(data)
}
