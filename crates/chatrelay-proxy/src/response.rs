//! Turning upstream responses into client responses.
//!
//! Event-stream responses go through the delta relay; everything else is
//! buffered and normalized.

use axum::body::Body;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::BytesMut;
use chatrelay_core::{Normalized, UpstreamService, normalize_body, transport_diagnostic};
use futures_util::StreamExt;
use tracing::{debug, warn};

use crate::forward::{ByteStream, UpstreamResponse};
use crate::stream::relay_deltas;

const JSON_CONTENT_TYPE: &str = "application/json";
const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Whether an upstream response should be relayed as a stream.
///
/// Any content type mentioning `stream` counts, which covers
/// `text/event-stream` with or without parameters.
pub fn is_event_stream(response: &UpstreamResponse) -> bool {
    response
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("stream"))
}

/// Render an upstream response for the client.
pub async fn relay_response(service: UpstreamService, upstream: UpstreamResponse) -> Response {
    if is_event_stream(&upstream) {
        debug!(service = %service, status = %upstream.status, "Relaying event stream");
        return stream_response(upstream);
    }

    if !upstream.status.is_success() {
        warn!(service = %service, status = %upstream.status, "Upstream returned an error status");
    }

    match read_body(upstream.body).await {
        Ok(body) => normalized_response(normalize_body(&body, service)),
        Err(e) => {
            warn!(service = %service, error = %e, "Failed to read upstream body");
            normalized_response(transport_diagnostic(service, &e))
        }
    }
}

/// Stream text deltas back with the upstream status and content type.
pub fn stream_response(upstream: UpstreamResponse) -> Response {
    let UpstreamResponse {
        status,
        headers,
        body,
    } = upstream;

    let mut builder = Response::builder()
        .status(status)
        .header(header::CACHE_CONTROL, "no-cache")
        .header("x-accel-buffering", "no"); // Disable nginx buffering
    if let Some(content_type) = headers.get(header::CONTENT_TYPE) {
        builder = builder.header(header::CONTENT_TYPE, content_type.clone());
    }

    builder
        .body(Body::from_stream(relay_deltas(body)))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Serve a normalized body. Both shapes go back with status 200.
pub fn normalized_response(normalized: Normalized) -> Response {
    match normalized {
        Normalized::Json(body) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE))
            .header(header::CACHE_CONTROL, "no-cache")
            .body(Body::from(body))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()),
        Normalized::Diagnostic(body) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, HeaderValue::from_static(TEXT_CONTENT_TYPE))
            .body(Body::from(body))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()),
    }
}

async fn read_body(mut body: ByteStream) -> Result<BytesMut, std::io::Error> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = body.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(buf)
}
