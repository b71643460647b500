//! `vaultsync login` / `vaultsync logout` — manage the identity token.
//!
//! The identity token is exchanged for a store token on the next sync;
//! logging out also drops the cached store token.

use std::io::Read;

use chrono::Utc;

use crate::cli::output;
use crate::cli::{Cli, Context};
use crate::errors::{Result, VaultSyncError};
use crate::remote::is_valid_identity_token;

/// Execute `vaultsync login`.
pub fn execute_login(cli: &Cli, token: Option<&str>) -> Result<()> {
    let token = match token {
        Some(t) => t.trim().to_string(),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf.trim().to_string()
        }
    };

    if !is_valid_identity_token(&token, Utc::now().timestamp_millis()) {
        return Err(VaultSyncError::Auth(
            "identity token is malformed or expired".into(),
        ));
    }

    let ctx = Context::load(cli)?;
    ctx.stored_identity().save(&token)?;
    // A store token issued for a previous identity must not be reused.
    ctx.remote_client()?.clear_token()?;

    output::success("Identity token saved.");
    output::tip("Run `vaultsync sync` to pull remote secrets.");
    Ok(())
}

/// Execute `vaultsync logout`.
pub fn execute_logout(cli: &Cli) -> Result<()> {
    let ctx = Context::load(cli)?;
    ctx.stored_identity().clear()?;
    ctx.remote_client()?.clear_token()?;

    output::success("Logged out.");
    Ok(())
}
