//! Rendering of non-streaming upstream responses.
//!
//! A buffered upstream body is decoded as JSON and sorted into one of three
//! outcomes: a success payload re-serialized compactly, an upstream-reported
//! error (any object with a truthy `error` field), or an undecodable body.
//! The latter two are rendered as a fenced ```` ```json ```` block so the chat
//! client can show them inline.
//!
//! Upstream error statuses are not carried over: the rendered error goes back
//! with the default success status and the client reads the fenced body.

use std::fmt;

use serde::Deserialize;
use serde_json::{Value, json};

use crate::service::UpstreamService;

/// A decoded upstream body.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamPayload {
    /// The upstream reported an application error.
    Error(Value),
    /// Anything else that decoded as JSON.
    Success(Value),
}

/// Shape probed first when classifying a payload.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Value,
}

/// The common OpenAI error object, used for logging.
#[derive(Debug, Default, Deserialize)]
pub struct UpstreamErrorDetail {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<Value>,
}

impl UpstreamPayload {
    /// Decode raw bytes, failing only on invalid JSON.
    pub fn decode(body: &[u8]) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_slice(body)?;
        Ok(Self::classify(value))
    }

    /// Sort an already-decoded value.
    pub fn classify(value: Value) -> Self {
        // Sequences would otherwise decode positionally into the envelope.
        if !value.is_object() {
            return Self::Success(value);
        }
        match ErrorEnvelope::deserialize(&value) {
            Ok(envelope) if is_truthy(&envelope.error) => Self::Error(value),
            _ => Self::Success(value),
        }
    }

    /// Typed view of the `error` object, when it has the usual shape.
    pub fn error_detail(&self) -> Option<UpstreamErrorDetail> {
        match self {
            Self::Error(value) => detail_of(value),
            Self::Success(_) => None,
        }
    }
}

fn detail_of(value: &Value) -> Option<UpstreamErrorDetail> {
    value
        .get("error")
        .and_then(|e| UpstreamErrorDetail::deserialize(e).ok())
}

// Mirrors how the browser client tests the field: null, false, 0 and "" do
// not count as an error.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// What to send back for a non-streaming upstream response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    /// Compact JSON, served as `application/json` with `no-cache`.
    Json(String),
    /// Fenced code block, served as plain text.
    Diagnostic(String),
}

impl Normalized {
    pub fn body(&self) -> &str {
        match self {
            Self::Json(body) | Self::Diagnostic(body) => body,
        }
    }

    pub const fn is_diagnostic(&self) -> bool {
        matches!(self, Self::Diagnostic(_))
    }
}

/// Render `value` as a fenced JSON block with two-space indentation.
pub fn fenced_json(value: &Value) -> String {
    let pretty = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    format!("```json\n{pretty}\n```")
}

/// Normalize a buffered upstream body.
pub fn normalize_body(body: &[u8], service: UpstreamService) -> Normalized {
    match UpstreamPayload::decode(body) {
        Ok(UpstreamPayload::Success(value)) => Normalized::Json(value.to_string()),
        Ok(UpstreamPayload::Error(value)) => {
            let detail = detail_of(&value).unwrap_or_default();
            tracing::warn!(
                service = %service,
                error_type = detail.kind.as_deref().unwrap_or("unknown"),
                message = detail.message.as_deref().unwrap_or(""),
                "Upstream reported an error"
            );
            Normalized::Diagnostic(fenced_json(&value))
        }
        Err(e) => {
            tracing::error!(service = %service, error = %e, "Upstream response is not JSON");
            Normalized::Diagnostic(fenced_json(&json!({
                "msg": format!("invalid response from {service} server"),
                "error": e.to_string(),
            })))
        }
    }
}

/// Diagnostic for a request that never got a usable response.
pub fn transport_diagnostic(service: UpstreamService, err: &dyn fmt::Display) -> Normalized {
    Normalized::Diagnostic(fenced_json(&json!({
        "msg": format!("failed to reach {service} server"),
        "error": err.to_string(),
    })))
}
