//! Router construction and the serve loop.
//!
//! The server runs on a pre-bound `TcpListener` until the cancellation token
//! fires, then drains in-flight requests.

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::handlers;
use crate::state::AppState;

/// Build the proxy router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/api/config",
            get(handlers::client_config).post(handlers::client_config),
        )
        .route(
            "/api/openai/{*path}",
            get(handlers::openai_proxy).post(handlers::openai_proxy),
        )
        .route(
            "/api/midjourney/{*path}",
            get(handlers::midjourney_proxy).post(handlers::midjourney_proxy),
        )
        // Chat bodies are replayed upstream whole, whatever their size.
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve until `cancel` is triggered.
///
/// Returns `Ok(())` on clean shutdown, or an error if the server fails.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    info!(
        need_code = state.config.needs_code(),
        api_keys = state.config.api_key_pool_size(),
        upstream = %state.config.chat_base_url(),
        "Proxy server starting on {addr}"
    );

    let app = create_router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await?;

    info!("Proxy server shut down");
    Ok(())
}
