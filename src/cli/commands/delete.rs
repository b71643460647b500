//! `vaultsync delete` — remove a secret from the vault.

use dialoguer::Confirm;

use crate::app::SecretsStore;
use crate::cli::output;
use crate::cli::{Cli, Context};
use crate::errors::{Result, VaultSyncError};
use crate::vault::VaultGateway;

/// Execute the `delete` command.
pub async fn execute(cli: &Cli, id: &str, force: bool) -> Result<()> {
    let ctx = Context::load(cli)?;
    if !ctx.vault.is_vault_initialized().await? {
        return Err(VaultSyncError::VaultNotInitialized);
    }

    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete secret '{id}'?"))
            .default(false)
            .interact()
            .map_err(|e| VaultSyncError::CommandFailed(format!("confirm prompt: {e}")))?;

        if !confirmed {
            output::info("Cancelled.");
            return Ok(());
        }
    }

    let store = SecretsStore::new(ctx.gateway());
    store.delete_secret(id).await?;

    output::success(&format!("Deleted secret '{id}'"));
    Ok(())
}
