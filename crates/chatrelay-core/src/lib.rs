#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

pub mod access;
pub mod config;
pub mod delta;
pub mod error;
pub mod keys;
pub mod normalize;
pub mod policy;
pub mod service;
pub mod sse;

// Re-export commonly used types for convenience
pub use access::{
    ACCESS_CODE_PREFIX, AccessCodeSet, AccessDecision, AccessGate, Credential, CredentialSource,
    ImageAccessGate, RejectReason, ResolvedCredential, hash_access_code,
};
pub use config::{ClientConfig, RelayConfig};
pub use delta::{ChatCompletionChunk, decode_delta};
pub use error::{ConfigError, RelayError};
pub use keys::{FirstKeySelector, KeySelector, RandomKeySelector};
pub use normalize::{Normalized, UpstreamPayload, normalize_body, transport_diagnostic};
pub use policy::ModelPolicy;
pub use service::UpstreamService;
pub use sse::{DONE_SENTINEL, SseEvent, SseParser};
