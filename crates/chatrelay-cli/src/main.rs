//! CLI entry point.
//!
//! Loads the environment, initializes logging, builds the relay
//! configuration once and dispatches to a handler.

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use chatrelay_cli::{Cli, CliError, Commands, handlers};
use chatrelay_core::RelayConfig;

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .init();
}

fn load_env(env_file: Option<&Path>) -> Result<(), CliError> {
    match env_file {
        Some(path) => {
            dotenvy::from_path(path)
                .map_err(|e| CliError::Io(format!("{}: {e}", path.display())))?;
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<(), CliError> {
    load_env(cli.env_file.as_deref())?;

    match cli.into_command() {
        Commands::Serve(args) => {
            let config = RelayConfig::from_env()?;
            handlers::serve::execute(&args, config).await
        }
        Commands::HashCode { codes } => handlers::hash_code::execute(&codes, &mut std::io::stdout()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}
