//! Colored terminal output helpers.
//!
//! All user-facing output goes through these functions so we get
//! consistent styling across every command.

use comfy_table::{ContentArrangement, Table};
use console::style;

use crate::sync::{SyncReport, SyncStatus};
use crate::vault::{Secret, SecretListItem};

/// Print a green success message: "check_mark {msg}"
pub fn success(msg: &str) {
    println!("{} {}", style("\u{2713}").green().bold(), msg);
}

/// Print a red error message: "x_mark {msg}"
pub fn error(msg: &str) {
    eprintln!("{} {}", style("\u{2717}").red().bold(), msg);
}

/// Print a yellow warning: "warning_sign {msg}"
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("\u{26a0}").yellow().bold(), msg);
}

/// Print a blue info message: "info_sign {msg}"
pub fn info(msg: &str) {
    println!("{} {}", style("\u{2139}").blue().bold(), msg);
}

/// Print a dim tip/hint: "arrow {msg}"
pub fn tip(msg: &str) {
    println!("{} {}", style("\u{2192}").dim(), style(msg).dim());
}

/// Print the secret listing (Id, Name, Type, Created).
pub fn print_secrets_table(secrets: &[SecretListItem]) {
    if secrets.is_empty() {
        info("No secrets in this vault yet.");
        tip("Run `vaultsync add <ID> -f KEY=VALUE` or `vaultsync sync` to add some.");
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Id", "Name", "Type", "Created", "Tags"]);

    for s in secrets {
        table.add_row(vec![
            s.id.clone(),
            s.name.clone(),
            s.secret_type.to_string(),
            s.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            s.tags.join(", "),
        ]);
    }

    println!("{table}");
}

/// Print one decrypted secret as a field table.
pub fn print_secret(secret: &Secret) {
    println!(
        "{} {}",
        style(&secret.name).bold(),
        style(format!("({}, {})", secret.id, secret.secret_type)).dim()
    );

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Field", "Value"]);
    for (key, value) in &secret.data {
        table.add_row(vec![key.clone(), value.clone()]);
    }
    println!("{table}");

    let origin = if secret.metadata.is_local {
        "local"
    } else {
        "remote"
    };
    tip(&format!(
        "origin: {origin}, sync status: {:?}",
        secret.metadata.sync_status
    ));
    if let Some(description) = &secret.metadata.description {
        tip(description);
    }
}

/// Summarize a finished sync run.
pub fn print_sync_report(report: &SyncReport) {
    let summary = format!(
        "{} sync: {} remote secret(s), {} added, {} updated, {} unchanged",
        report.kind, report.total, report.added, report.updated, report.unchanged
    );
    if report.is_partial() {
        warning(&format!("{summary}, {} failed", report.failed.len()));
        for failure in &report.failed {
            warning(&format!("  {}: {}", failure.id, failure.message));
        }
    } else {
        success(&summary);
    }
}

pub fn styled_status(status: SyncStatus) -> String {
    let text = status.to_string();
    match status {
        SyncStatus::Success => style(text).green().to_string(),
        SyncStatus::Error => style(text).red().to_string(),
        SyncStatus::Syncing => style(text).yellow().to_string(),
        SyncStatus::Idle => style(text).dim().to_string(),
    }
}
