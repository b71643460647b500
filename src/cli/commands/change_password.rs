//! `vaultsync change-password` — re-encrypt the vault under a new master
//! password (fresh salt, every entry re-sealed, written atomically).

use crate::cli::output;
use crate::cli::{prompt_new_password, Cli, Context};
use crate::errors::Result;
use crate::vault::VaultGateway;

/// Execute the `change-password` command.
pub async fn execute(cli: &Cli) -> Result<()> {
    let ctx = Context::load(cli)?;

    output::info("Enter your current master password.");
    let old_password = ctx.unlock().await?;

    output::info("Choose your new master password.");
    let new_password = prompt_new_password("VAULTSYNC_NEW_PASSWORD")?;

    ctx.vault
        .change_master_password(&old_password, &new_password)
        .await?;

    let count = ctx.vault.list_secrets().await?.len() + ctx.vault.list_items().await?.len();
    output::success(&format!(
        "Master password changed ({count} item(s) re-encrypted)"
    ));
    Ok(())
}
