//! `vaultsync check` — probe the remote store.

use crate::cli::output;
use crate::cli::{Cli, Context};
use crate::errors::{Result, VaultSyncError};

/// Execute the `check` command.  Fails when the store is unreachable.
pub async fn execute(cli: &Cli) -> Result<()> {
    let ctx = Context::load(cli)?;
    let remote = ctx.remote_client()?;
    let manager = ctx.sync_manager(remote)?;

    if manager.check_connection().await {
        output::success(&format!("online: {}", ctx.settings.remote_url));
        Ok(())
    } else {
        Err(VaultSyncError::Connectivity(format!(
            "offline: {} did not pass its health check",
            ctx.settings.remote_url
        )))
    }
}
