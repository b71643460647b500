//! `vaultsync list` — display all secrets in a table.

use crate::app::SecretsStore;
use crate::cli::output;
use crate::cli::{Cli, Context};
use crate::errors::{Result, VaultSyncError};
use crate::vault::VaultGateway;

/// Execute the `list` command.  No password needed.
pub async fn execute(cli: &Cli) -> Result<()> {
    let ctx = Context::load(cli)?;
    if !ctx.vault.is_vault_initialized().await? {
        return Err(VaultSyncError::VaultNotInitialized);
    }

    let store = SecretsStore::new(ctx.gateway());
    let secrets = store.refresh_secrets().await?;

    output::info(&format!("{} secret(s)", secrets.len()));
    output::print_secrets_table(&secrets);
    Ok(())
}
