//! Shared application state.

use std::sync::Arc;

use chatrelay_core::{AccessGate, ImageAccessGate, ModelPolicy, RelayConfig};

use crate::forward::Upstream;

/// Everything the handlers need, built once at startup.
pub struct ProxyContext {
    pub config: RelayConfig,
    pub gate: AccessGate,
    pub image_gate: ImageAccessGate,
    pub policy: ModelPolicy,
    pub upstream: Arc<dyn Upstream>,
}

impl ProxyContext {
    /// Derive the gates and policy from `config`.
    pub fn new(config: RelayConfig, upstream: Arc<dyn Upstream>) -> Self {
        Self {
            gate: config.access_gate(),
            image_gate: config.image_gate(),
            policy: config.model_policy(),
            config,
            upstream,
        }
    }
}

/// Application state shared across all handlers.
pub type AppState = Arc<ProxyContext>;
