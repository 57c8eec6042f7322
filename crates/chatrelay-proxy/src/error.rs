//! Proxy error types and their HTTP mappings.
//!
//! Rejections from the access gate and the model policy become JSON error
//! bodies with a 4xx status. Forwarding failures are rendered as a fenced
//! diagnostic with a success status so the chat client shows them inline.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chatrelay_core::{RejectReason, UpstreamService, transport_diagnostic};
use serde::Serialize;
use thiserror::Error;

use crate::response::normalized_response;

/// Errors raised while building or sending an upstream request.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// The upstream base URL was never configured.
    #[error("{0} API URL is not configured")]
    MissingBaseUrl(UpstreamService),

    /// A credential or header could not be encoded as a header value.
    #[error("Invalid value for header {0}")]
    InvalidHeader(&'static str),

    /// Connecting to or reading from the upstream failed.
    #[error("{0}")]
    Transport(String),
}

impl From<reqwest::Error> for ForwardError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Errors returned by the proxy handlers.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The access gate refused the request.
    #[error("{0}")]
    Unauthorized(RejectReason),

    /// The requested model is disabled.
    #[error("you are not allowed to use {model} model")]
    ModelNotAllowed { model: String },

    /// The upstream could not be reached.
    #[error("Upstream {service} failed: {source}")]
    Upstream {
        service: UpstreamService,
        #[source]
        source: ForwardError,
    },
}

impl ProxyError {
    pub const fn upstream(service: UpstreamService, source: ForwardError) -> Self {
        Self::Upstream { service, source }
    }
}

/// JSON error response body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: bool,
    msg: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    need_access_code: bool,
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::Unauthorized(reason) => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    error: true,
                    msg: reason.message().to_string(),
                    need_access_code: reason.needs_access_code(),
                },
            ),
            // The restricted tier is reported by family, not by exact model.
            Self::ModelNotAllowed { .. } => (
                StatusCode::FORBIDDEN,
                ErrorBody {
                    error: true,
                    msg: "you are not allowed to use gpt-4 model".to_string(),
                    need_access_code: false,
                },
            ),
            Self::Upstream { service, source } => {
                return normalized_response(transport_diagnostic(*service, source));
            }
        };

        (status, Json(body)).into_response()
    }
}
