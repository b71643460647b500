//! `vaultsync add` — create a local secret.

use chrono::Utc;

use crate::app::SecretsStore;
use crate::cli::output;
use crate::cli::{parse_fields, Cli, Context};
use crate::errors::Result;
use crate::vault::{Secret, SecretType};

pub struct AddArgs<'a> {
    pub id: &'a str,
    pub name: Option<&'a str>,
    pub secret_type: &'a str,
    pub fields: &'a [String],
    pub tags: &'a [String],
    pub description: Option<&'a str>,
}

/// Execute the `add` command.
pub async fn execute(cli: &Cli, args: AddArgs<'_>) -> Result<()> {
    let secret_type: SecretType = args.secret_type.parse()?;
    let data = parse_fields(args.fields)?;

    let mut secret = Secret::new(
        args.id,
        args.name.unwrap_or(args.id),
        secret_type,
        data,
        Utc::now(),
    );
    secret.metadata.tags = args.tags.to_vec();
    secret.metadata.description = args.description.map(str::to_string);
    secret.validate()?;

    let ctx = Context::load(cli)?;
    let password = ctx.unlock().await?;

    let store = SecretsStore::new(ctx.gateway());
    store.add_secret(&secret, &password).await?;

    output::success(&format!(
        "Saved secret '{}' ({} field(s), {} in vault)",
        secret.id,
        secret.data.len(),
        store.secrets().len()
    ));
    Ok(())
}
