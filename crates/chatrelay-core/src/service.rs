//! The upstream services the relay fronts.

use std::fmt;

/// Which upstream a request is bound for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpstreamService {
    /// OpenAI-compatible chat completions API.
    Chat,
    /// Midjourney-compatible image generation API.
    Image,
}

impl UpstreamService {
    /// Inbound route prefix whose remainder is the upstream-relative path.
    pub const fn route_prefix(self) -> &'static str {
        match self {
            Self::Chat => "/api/openai/",
            Self::Image => "/api/midjourney/",
        }
    }

    /// Name used in user-facing diagnostics.
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Chat => "OpenAI",
            Self::Image => "Midjourney",
        }
    }
}

impl fmt::Display for UpstreamService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
