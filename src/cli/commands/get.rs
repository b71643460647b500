//! `vaultsync get` — decrypt and print a secret.

use crate::app::SecretsStore;
use crate::cli::output;
use crate::cli::{Cli, Context};
use crate::errors::{Result, VaultSyncError};

/// Execute the `get` command.
pub async fn execute(cli: &Cli, id: &str, json: bool) -> Result<()> {
    let ctx = Context::load(cli)?;
    let password = ctx.unlock().await?;

    let store = SecretsStore::new(ctx.gateway());
    let secret = store.get_secret_by_id(id, &password).await?;

    if json {
        let pretty = serde_json::to_string_pretty(&secret)
            .map_err(|e| VaultSyncError::SerializationError(e.to_string()))?;
        println!("{pretty}");
    } else {
        output::print_secret(&secret);
    }
    Ok(())
}
