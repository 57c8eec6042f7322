//! Relay configuration.
//!
//! [`RelayConfig`] is built once at startup, from the process environment or
//! from any key→value lookup, and shared read-only afterwards. Components get
//! what they need from it through constructors; nothing reads the environment
//! at request time.
//!
//! # Example
//!
//! ```
//! use chatrelay_core::config::RelayConfig;
//!
//! let config = RelayConfig::new()
//!     .with_base_url("my-gateway.internal:8443")
//!     .with_api_key("sk-system")
//!     .with_access_codes("alpha,bravo");
//!
//! assert_eq!(config.chat_base_url(), "https://my-gateway.internal:8443");
//! assert!(config.needs_code());
//! ```

use std::fmt;

use serde::Serialize;

use crate::access::{AccessCodeSet, AccessGate, ImageAccessGate};
use crate::error::ConfigError;
use crate::keys::{KeySelector, RandomKeySelector, parse_key_pool, pick_key};
use crate::policy::ModelPolicy;

/// Comma-separated pool of system API keys.
pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
/// Comma-separated plaintext access codes.
pub const ENV_CODE: &str = "CODE";
/// Chat upstream host or URL.
pub const ENV_BASE_URL: &str = "BASE_URL";
/// Scheme prepended when `BASE_URL` has none.
pub const ENV_PROTOCOL: &str = "PROTOCOL";
/// Optional `OpenAI-Organization` header value.
pub const ENV_ORG_ID: &str = "OPENAI_ORG_ID";
/// Image upstream base URL.
pub const ENV_IMAGE_URL: &str = "MIDJOURNEY_API_URL";
/// Image upstream system key.
pub const ENV_IMAGE_KEY: &str = "MIDJOURNEY_API_KEY";
/// When set, the client hides its API key input.
pub const ENV_HIDE_USER_API_KEY: &str = "HIDE_USER_API_KEY";
/// When set, gpt-4 models are refused.
pub const ENV_DISABLE_GPT4: &str = "DISABLE_GPT4";

pub const DEFAULT_BASE_URL: &str = "api.openai.com";
pub const DEFAULT_PROTOCOL: &str = "https";

/// Flags exposed to the browser client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    pub need_code: bool,
    pub hide_user_api_key: bool,
    #[serde(rename = "enableGPT4")]
    pub enable_gpt4: bool,
}

/// Immutable relay configuration.
#[derive(Clone)]
pub struct RelayConfig {
    base_url: String,
    protocol: String,
    org_id: Option<String>,
    api_key_pool: Vec<String>,
    api_key: Option<String>,
    access_codes: AccessCodeSet,
    image_base_url: Option<String>,
    image_api_key: Option<String>,
    hide_user_api_key: bool,
    enable_gpt4: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            protocol: DEFAULT_PROTOCOL.to_string(),
            org_id: None,
            api_key_pool: Vec::new(),
            api_key: None,
            access_codes: AccessCodeSet::default(),
            image_base_url: None,
            image_api_key: None,
            hide_user_api_key: false,
            enable_gpt4: true,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_protocol(protocol: &str) -> Result<String, ConfigError> {
    let normalized = protocol.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "http" | "https" => Ok(normalized),
        _ => Err(ConfigError::InvalidValue {
            key: ENV_PROTOCOL,
            reason: format!("expected http or https, got '{protocol}'"),
        }),
    }
}

impl RelayConfig {
    /// Configuration with defaults and no keys.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from the process environment, picking a pooled key at random.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok(), &RandomKeySelector)
    }

    /// Load from an arbitrary lookup.
    ///
    /// Flags count as set for any non-empty value. Blank values are treated
    /// as unset.
    pub fn from_lookup<F>(lookup: F, selector: &dyn KeySelector) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let protocol = match non_empty(lookup(ENV_PROTOCOL)) {
            Some(p) => validate_protocol(&p)?,
            None => DEFAULT_PROTOCOL.to_string(),
        };

        let pool = lookup(ENV_API_KEY)
            .map(|raw| parse_key_pool(&raw))
            .unwrap_or_default();
        let api_key = pick_key(&pool, selector);

        let config = Self {
            base_url: non_empty(lookup(ENV_BASE_URL)).unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            protocol,
            org_id: non_empty(lookup(ENV_ORG_ID)),
            api_key_pool: pool,
            api_key,
            access_codes: lookup(ENV_CODE)
                .map(|raw| AccessCodeSet::from_csv(&raw))
                .unwrap_or_default(),
            image_base_url: non_empty(lookup(ENV_IMAGE_URL)),
            image_api_key: non_empty(lookup(ENV_IMAGE_KEY)),
            hide_user_api_key: non_empty(lookup(ENV_HIDE_USER_API_KEY)).is_some(),
            enable_gpt4: non_empty(lookup(ENV_DISABLE_GPT4)).is_none(),
        };

        tracing::debug!(config = ?config, "Loaded relay configuration");
        Ok(config)
    }

    /// Set the chat upstream host or URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the scheme used when the base URL has none.
    pub fn with_protocol(mut self, protocol: &str) -> Result<Self, ConfigError> {
        self.protocol = validate_protocol(protocol)?;
        Ok(self)
    }

    #[must_use]
    pub fn with_org_id(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = Some(org_id.into());
        self
    }

    /// Use a single system API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.api_key_pool = vec![key.clone()];
        self.api_key = Some(key);
        self
    }

    /// Use a comma-separated key pool, choosing with `selector`.
    #[must_use]
    pub fn with_api_key_pool(mut self, raw: &str, selector: &dyn KeySelector) -> Self {
        self.api_key_pool = parse_key_pool(raw);
        self.api_key = pick_key(&self.api_key_pool, selector);
        self
    }

    /// Require access codes from a comma-separated list.
    #[must_use]
    pub fn with_access_codes(mut self, raw: &str) -> Self {
        self.access_codes = AccessCodeSet::from_csv(raw);
        self
    }

    /// Configure the image upstream.
    #[must_use]
    pub fn with_image_service(mut self, base_url: impl Into<String>, key: Option<String>) -> Self {
        self.image_base_url = Some(base_url.into());
        self.image_api_key = non_empty(key);
        self
    }

    #[must_use]
    pub const fn with_hide_user_api_key(mut self, hide: bool) -> Self {
        self.hide_user_api_key = hide;
        self
    }

    #[must_use]
    pub const fn with_gpt4_enabled(mut self, enabled: bool) -> Self {
        self.enable_gpt4 = enabled;
        self
    }

    /// Chat upstream base URL with a scheme and without a trailing slash.
    pub fn chat_base_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.starts_with("http") {
            base.to_string()
        } else {
            format!("{}://{base}", self.protocol)
        }
    }

    pub fn org_id(&self) -> Option<&str> {
        self.org_id.as_deref()
    }

    /// The system key chosen for this process.
    pub fn system_api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    /// Number of keys in the configured pool.
    pub fn api_key_pool_size(&self) -> usize {
        self.api_key_pool.len()
    }

    pub const fn access_codes(&self) -> &AccessCodeSet {
        &self.access_codes
    }

    /// Image upstream base URL without a trailing slash.
    pub fn image_base_url(&self) -> Option<&str> {
        self.image_base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/'))
    }

    pub fn image_api_key(&self) -> Option<&str> {
        self.image_api_key.as_deref()
    }

    pub fn needs_code(&self) -> bool {
        self.access_codes.is_enabled()
    }

    pub const fn hide_user_api_key(&self) -> bool {
        self.hide_user_api_key
    }

    pub const fn enable_gpt4(&self) -> bool {
        self.enable_gpt4
    }

    /// Gate for the chat proxy.
    pub fn access_gate(&self) -> AccessGate {
        AccessGate::new(self.access_codes.clone(), self.api_key.clone())
    }

    /// Gate for the image proxy.
    pub fn image_gate(&self) -> ImageAccessGate {
        ImageAccessGate::new(self.image_api_key.clone())
    }

    pub const fn model_policy(&self) -> ModelPolicy {
        ModelPolicy::new(self.enable_gpt4)
    }

    /// Flags for the browser client.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            need_code: self.needs_code(),
            hide_user_api_key: self.hide_user_api_key,
            enable_gpt4: self.enable_gpt4,
        }
    }
}

// Keys are reported by count only.
impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("chat_base_url", &self.chat_base_url())
            .field("org_id", &self.org_id)
            .field("api_keys", &self.api_key_pool.len())
            .field("has_system_key", &self.api_key.is_some())
            .field("access_codes", &self.access_codes.len())
            .field("image_base_url", &self.image_base_url)
            .field("has_image_key", &self.image_api_key.is_some())
            .field("hide_user_api_key", &self.hide_user_api_key)
            .field("enable_gpt4", &self.enable_gpt4)
            .finish()
    }
}
