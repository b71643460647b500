//! `vaultsync sync` — pull secrets from the remote store.

use crate::app::SyncStore;
use crate::cli::output;
use crate::cli::{Cli, Context};
use crate::errors::Result;

/// Execute the `sync` command.
pub async fn execute(cli: &Cli, force: bool) -> Result<()> {
    let ctx = Context::load(cli)?;
    let password = ctx.unlock().await?;

    let remote = ctx.remote_client()?;
    let store = SyncStore::new(ctx.sync_manager(remote.clone())?, remote);

    let report = if force {
        store.force_sync(&password).await?
    } else {
        store.start_sync(&password).await?
    };

    output::print_sync_report(&report);
    Ok(())
}
