//! Route handlers.

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, Method, Uri, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use chatrelay_core::{AccessDecision, ClientConfig, UpstreamService};
use tracing::{debug, info, warn};

use crate::error::ProxyError;
use crate::forward::{chat_request, image_request, upstream_path};
use crate::response::relay_response;
use crate::state::AppState;

// ── Client address ─────────────────────────────────────────────────────

/// Client address as reported by a fronting proxy.
///
/// `x-real-ip` wins; otherwise the first `x-forwarded-for` entry.
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = real_ip {
        return Some(ip.to_string());
    }

    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

fn header_str<'a>(headers: &'a HeaderMap, name: impl header::AsHeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

// ── /api/openai/{*path} ────────────────────────────────────────────────

/// Chat proxy: gate, policy check, forward, then stream or normalize.
pub async fn openai_proxy(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ProxyError> {
    let service = UpstreamService::Chat;
    let relative = upstream_path(uri.path(), service);
    let ip = client_ip(&headers);
    info!(
        ip = ip.as_deref().unwrap_or("unknown"),
        method = %method,
        path = %relative,
        "Chat proxy request"
    );

    let credential = match state.gate.authorize(header_str(&headers, header::AUTHORIZATION)) {
        AccessDecision::Allowed(credential) => credential,
        AccessDecision::Rejected(reason) => {
            warn!(ip = ip.as_deref().unwrap_or("unknown"), reason = %reason, "Chat request rejected");
            return Err(ProxyError::Unauthorized(reason));
        }
    };
    debug!(source = ?credential.source(), "Chat request allowed");

    if let Some(model) = state.policy.denied_model(&body) {
        warn!(model = %model, "Restricted model requested");
        return Err(ProxyError::ModelNotAllowed { model });
    }

    let request = chat_request(&state.config, method, relative, uri.query(), &credential, body)
        .map_err(|e| ProxyError::upstream(service, e))?;
    let response = state
        .upstream
        .send(request)
        .await
        .map_err(|e| ProxyError::upstream(service, e))?;

    Ok(relay_response(service, response).await)
}

// ── /api/midjourney/{*path} ────────────────────────────────────────────

/// Image proxy: token gate, forward, then normalize.
pub async fn midjourney_proxy(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ProxyError> {
    let service = UpstreamService::Image;
    let relative = upstream_path(uri.path(), service);
    let ip = client_ip(&headers);
    info!(
        ip = ip.as_deref().unwrap_or("unknown"),
        method = %method,
        path = %relative,
        "Image proxy request"
    );

    let credential = match state.image_gate.authorize(header_str(&headers, "token")) {
        AccessDecision::Allowed(credential) => credential,
        AccessDecision::Rejected(reason) => {
            warn!(ip = ip.as_deref().unwrap_or("unknown"), reason = %reason, "Image request rejected");
            return Err(ProxyError::Unauthorized(reason));
        }
    };

    let request = image_request(&state.config, method, relative, &credential, body)
        .map_err(|e| ProxyError::upstream(service, e))?;
    let response = state
        .upstream
        .send(request)
        .await
        .map_err(|e| ProxyError::upstream(service, e))?;

    Ok(relay_response(service, response).await)
}

// ── /api/config ────────────────────────────────────────────────────────

/// Feature flags for the browser client.
pub async fn client_config(State(state): State<AppState>) -> Json<ClientConfig> {
    Json(state.config.client_config())
}

// ── /health ────────────────────────────────────────────────────────────

pub async fn health_check() -> impl IntoResponse {
    "OK"
}
