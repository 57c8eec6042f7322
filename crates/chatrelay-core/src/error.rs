//! Core error types.
//!
//! These errors are transport-agnostic; the proxy crate maps them to HTTP
//! responses at its boundary.

use thiserror::Error;

/// Errors raised while building the relay configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable held a value outside its accepted set.
    #[error("Invalid value for {key}: {reason}")]
    InvalidValue {
        /// Environment variable name
        key: &'static str,
        /// Why the value was rejected
        reason: String,
    },
}

/// Errors raised while relaying an upstream event stream.
#[derive(Debug, Error)]
pub enum RelayError {
    /// An event's data was not a decodable completion chunk.
    #[error("Malformed upstream event: {0}")]
    MalformedEvent(#[from] serde_json::Error),

    /// Reading the upstream body failed mid-stream.
    #[error("Upstream stream error: {0}")]
    Upstream(String),
}
