//! `vaultsync init` — create a new local vault.

use crate::cli::output;
use crate::cli::{prompt_new_password, Cli, Context};
use crate::errors::{Result, VaultSyncError};
use crate::vault::VaultGateway;

/// Execute the `init` command.
pub async fn execute(cli: &Cli) -> Result<()> {
    let ctx = Context::load(cli)?;

    if ctx.vault.is_vault_initialized().await? {
        output::tip("Use `vaultsync add` or `vaultsync sync` to fill the existing vault.");
        return Err(VaultSyncError::VaultAlreadyInitialized);
    }

    let password = prompt_new_password("VAULTSYNC_PASSWORD")?;
    ctx.vault.initialize_vault(&password).await?;

    output::success(&format!(
        "Vault created at {}",
        ctx.settings.vault_path(&ctx.project_dir).display()
    ));
    output::tip("Run `vaultsync login --token <JWT>` to connect to the remote store.");
    output::tip("Run `vaultsync sync` to pull remote secrets.");

    Ok(())
}
