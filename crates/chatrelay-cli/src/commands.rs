//! Subcommands.

use clap::{Args, Subcommand};

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run the proxy server
    Serve(ServeArgs),

    /// Print the hashed form of access codes, as matched against `CODE`
    HashCode {
        /// Plaintext access codes
        #[arg(required = true)]
        codes: Vec<String>,
    },
}

/// Listener options.
///
/// Unset values fall back to the `HOST` and `PORT` environment variables,
/// read after the env file is loaded.
#[derive(Debug, Clone, Default, Args)]
pub struct ServeArgs {
    /// Address to bind [env: HOST] [default: 0.0.0.0]
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind [env: PORT] [default: 3000]
    #[arg(short, long)]
    pub port: Option<u16>,
}
