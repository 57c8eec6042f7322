//! Serve command handler.

use std::sync::Arc;

use chatrelay_core::RelayConfig;
use chatrelay_proxy::{HttpUpstream, ProxyContext, serve};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::commands::ServeArgs;
use crate::error::CliError;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;

/// Resolve the listen address from flags, then `HOST`/`PORT`, then defaults.
pub fn resolve_addr<F>(args: &ServeArgs, lookup: F) -> Result<(String, u16), CliError>
where
    F: Fn(&str) -> Option<String>,
{
    let host = args
        .host
        .clone()
        .or_else(|| lookup("HOST").filter(|h| !h.trim().is_empty()))
        .unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = match args.port {
        Some(port) => port,
        None => match lookup("PORT").filter(|p| !p.trim().is_empty()) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| CliError::Arguments(format!("invalid PORT '{raw}'")))?,
            None => DEFAULT_PORT,
        },
    };

    Ok((host, port))
}

/// Execute the serve command.
///
/// Binds the listener and serves until Ctrl-C.
pub async fn execute(args: &ServeArgs, config: RelayConfig) -> Result<(), CliError> {
    let (host, port) = resolve_addr(args, |key| std::env::var(key).ok())?;

    if config.system_api_key().is_none() {
        if config.hide_user_api_key() {
            warn!("HIDE_USER_API_KEY is set but no system API key is configured");
        } else {
            info!("No system API key configured; callers must supply their own");
        }
    }

    let upstream = HttpUpstream::new().map_err(|e| CliError::Server(e.to_string()))?;
    let state = Arc::new(ProxyContext::new(config, Arc::new(upstream)));

    let listener = TcpListener::bind((host.as_str(), port)).await?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Shutdown requested");
                    cancel.cancel();
                }
                Err(e) => warn!("Failed to listen for Ctrl-C: {e}"),
            }
        }
    });

    serve(listener, state, cancel)
        .await
        .map_err(|e| CliError::Server(e.to_string()))
}
