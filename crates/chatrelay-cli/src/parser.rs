//! Main CLI parser and top-level argument handling.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::{Commands, ServeArgs};

/// Access-gated proxy for OpenAI and Midjourney APIs.
///
/// Running without a subcommand starts the server.
#[derive(Parser)]
#[command(name = "chatrelay")]
#[command(about = "Access-gated proxy for OpenAI and Midjourney APIs")]
#[command(version)]
pub struct Cli {
    /// Load environment variables from this file instead of `.env`
    #[arg(long = "env-file", global = true)]
    pub env_file: Option<PathBuf>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    /// Server options used when no subcommand is given
    #[command(flatten)]
    pub serve: ServeArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// The command to run, defaulting to `serve`.
    pub fn into_command(self) -> Commands {
        self.command.unwrap_or(Commands::Serve(self.serve))
    }
}
