//! Model access policy for chat requests.

use serde::Deserialize;

/// Substring identifying the restricted model tier.
pub const RESTRICTED_MODEL_MARKER: &str = "gpt-4";

#[derive(Debug, Deserialize)]
struct RequestedModel {
    #[serde(default)]
    model: Option<String>,
}

/// Decides whether a chat request may use the model it names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelPolicy {
    allow_restricted: bool,
}

impl Default for ModelPolicy {
    fn default() -> Self {
        Self {
            allow_restricted: true,
        }
    }
}

impl ModelPolicy {
    pub const fn new(allow_restricted: bool) -> Self {
        Self { allow_restricted }
    }

    /// Whether the check does anything (bodies only need buffering then).
    pub const fn is_restrictive(&self) -> bool {
        !self.allow_restricted
    }

    pub fn allows(&self, model: &str) -> bool {
        self.allow_restricted || !model.contains(RESTRICTED_MODEL_MARKER)
    }

    /// Return the model named in a JSON request body if it is not allowed.
    ///
    /// Bodies that are empty or not JSON pass; the upstream judges those.
    pub fn denied_model(&self, body: &[u8]) -> Option<String> {
        if self.allow_restricted || body.is_empty() {
            return None;
        }
        let requested: RequestedModel = serde_json::from_slice(body).ok()?;
        requested.model.filter(|model| !self.allows(model))
    }
}
