//! `vaultsync watch` — sync now, then keep syncing on the configured
//! interval until Ctrl-C.

use crate::app::SyncStore;
use crate::cli::output;
use crate::cli::{Cli, Context};
use crate::errors::{Result, VaultSyncError};
use crate::sync::SyncStatus;

/// Execute the `watch` command.
pub async fn execute(cli: &Cli) -> Result<()> {
    let ctx = Context::load(cli)?;
    let password = ctx.unlock().await?;

    let remote = ctx.remote_client()?;
    let manager = ctx.sync_manager(remote.clone())?;
    let store = SyncStore::new(manager.clone(), remote);

    let _progress = manager.subscribe(|state| match state.status {
        SyncStatus::Error => {
            if let Some(message) = &state.error {
                output::warning(&format!("sync failed: {message}"));
            }
        }
        SyncStatus::Success if state.progress.current < state.progress.total => {
            output::warning(&format!(
                "sync finished with {} of {} secret(s) written",
                state.progress.current, state.progress.total
            ));
        }
        _ => {}
    });

    // A failed first run was already reported by the subscriber; the
    // timer retries.
    if let Ok(report) = store.start_sync(&password).await {
        output::print_sync_report(&report);
    }

    store.start_periodic_sync(&password);
    output::info(&format!(
        "Syncing every {}s. Press Ctrl-C to stop.",
        manager.interval().as_secs()
    ));

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| VaultSyncError::CommandFailed(format!("signal handler: {e}")))?;

    manager.shutdown();
    output::info("Stopped.");
    Ok(())
}
