//! `vaultsync status` — last sync, token state, and whether a sync is due.

use serde_json::json;

use crate::app::SyncStore;
use crate::cli::output;
use crate::cli::{Cli, Context};
use crate::errors::{Result, VaultSyncError};

/// Execute the `status` command.  No password needed.
pub async fn execute(cli: &Cli, as_json: bool) -> Result<()> {
    let ctx = Context::load(cli)?;
    let remote = ctx.remote_client()?;
    let manager = ctx.sync_manager(remote.clone())?;
    let store = SyncStore::new(manager.clone(), remote);
    let snapshot = store.snapshot();
    let state = &snapshot.sync_state;

    if as_json {
        let value = json!({
            "state": state,
            "lastSync": manager.time_since_last_sync(),
            "needsSync": manager.needs_sync(),
            "remoteUrl": ctx.settings.remote_url,
            "tokenValid": snapshot.is_token_valid,
            "tokenExpiry": snapshot.token_expiry,
        });
        let pretty = serde_json::to_string_pretty(&value)
            .map_err(|e| VaultSyncError::SerializationError(e.to_string()))?;
        println!("{pretty}");
        return Ok(());
    }

    output::info(&format!("Remote: {}", ctx.settings.remote_url));
    output::info(&format!("Status: {}", output::styled_status(state.status)));
    match manager.time_since_last_sync() {
        Some(age) => output::info(&format!("Last sync: {age}")),
        None => output::info("Last sync: never"),
    }
    match (snapshot.is_token_valid, snapshot.token_expiry) {
        (true, Some(expiry)) => output::info(&format!(
            "Store token: valid until {}",
            expiry.format("%Y-%m-%d %H:%M:%S UTC")
        )),
        _ => output::info("Store token: none (a new one is requested on the next sync)"),
    }
    if manager.needs_sync() {
        output::tip("A sync is due. Run `vaultsync sync`.");
    }
    Ok(())
}
