use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vaultsync::cli::{commands, Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Init => commands::init::execute(&cli).await,
        Commands::Add {
            ref id,
            ref name,
            ref secret_type,
            ref fields,
            ref tags,
            ref description,
        } => {
            let args = commands::add::AddArgs {
                id,
                name: name.as_deref(),
                secret_type,
                fields,
                tags,
                description: description.as_deref(),
            };
            commands::add::execute(&cli, args).await
        }
        Commands::Get { ref id, json } => commands::get::execute(&cli, id, json).await,
        Commands::List => commands::list::execute(&cli).await,
        Commands::Delete { ref id, force } => commands::delete::execute(&cli, id, force).await,
        Commands::ChangePassword => commands::change_password::execute(&cli).await,
        Commands::Login { ref token } => commands::auth::execute_login(&cli, token.as_deref()),
        Commands::Logout => commands::auth::execute_logout(&cli),
        Commands::Sync { force } => commands::sync::execute(&cli, force).await,
        Commands::Watch => commands::watch::execute(&cli).await,
        Commands::Status { json } => commands::status::execute(&cli, json).await,
        Commands::Check => commands::check::execute(&cli).await,
    };

    if let Err(e) = result {
        vaultsync::cli::output::error(&e.to_string());
        std::process::exit(1);
    }
}

/// Log to stderr so stdout stays clean for `--json` output.
fn init_tracing(verbose: bool) {
    let default = if verbose {
        "vaultsync=debug"
    } else {
        "vaultsync=info"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}
