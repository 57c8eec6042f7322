//! Access control for the proxy routes.
//!
//! Two gates live here:
//!
//! - [`AccessGate`] guards the chat proxy. Callers present either their own
//!   upstream API key or an access code (`ak-<code>`) checked against a hashed
//!   allow-list. Access codes are never forwarded upstream: a request that
//!   passes with a code is switched over to the system key.
//! - [`ImageAccessGate`] guards the image proxy with a plain token that falls
//!   back to a configured service key.

use std::collections::HashSet;
use std::fmt;

use sha2::{Digest, Sha256};

/// Prefix that marks a bearer token as an access code rather than an API key.
pub const ACCESS_CODE_PREFIX: &str = "ak-";

/// Hash an access code the way the allow-list stores it (SHA-256, lowercase hex).
pub fn hash_access_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// The hashed access-code allow-list.
///
/// Built once from the comma-separated `CODE` value and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessCodeSet {
    hashes: HashSet<String>,
}

impl AccessCodeSet {
    /// Parse a comma-separated list of plaintext codes.
    ///
    /// Entries are trimmed and blank entries dropped before hashing.
    pub fn from_csv(raw: &str) -> Self {
        raw.split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect()
    }

    /// Whether the allow-list has any entries (i.e. access codes are required).
    pub fn is_enabled(&self) -> bool {
        !self.hashes.is_empty()
    }

    /// Number of configured codes.
    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    /// Whether no codes are configured.
    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Membership test for an already-hashed code.
    pub fn contains_hash(&self, hashed: &str) -> bool {
        self.hashes.contains(hashed)
    }

    /// Membership test for a plaintext code.
    pub fn contains_code(&self, code: &str) -> bool {
        self.contains_hash(&hash_access_code(code))
    }

    /// Iterate over the stored hashes (for diagnostics).
    pub fn hashes(&self) -> impl Iterator<Item = &str> {
        self.hashes.iter().map(String::as_str)
    }
}

impl<'a> FromIterator<&'a str> for AccessCodeSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self {
            hashes: iter.into_iter().map(hash_access_code).collect(),
        }
    }
}

/// A bearer credential split by kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// `ak-` prefixed token; holds the code without the prefix.
    AccessCode(String),
    /// Anything else; holds the raw upstream key (possibly empty).
    ApiKey(String),
}

impl Credential {
    /// Classify the value of an `Authorization` header.
    ///
    /// The header is trimmed, the `Bearer ` scheme stripped and the remainder
    /// trimmed again. A missing header classifies as an empty API key.
    pub fn from_authorization(header: Option<&str>) -> Self {
        let raw = header.unwrap_or_default().trim();
        let token = raw.strip_prefix("Bearer ").unwrap_or(raw).trim();

        match token.strip_prefix(ACCESS_CODE_PREFIX) {
            Some(code) => Self::AccessCode(code.to_string()),
            None => Self::ApiKey(token.to_string()),
        }
    }

    /// The user-supplied upstream key, if one was given.
    pub fn api_key(&self) -> Option<&str> {
        match self {
            Self::ApiKey(key) if !key.is_empty() => Some(key),
            _ => None,
        }
    }

    /// The supplied access code, or the empty string for API keys.
    pub fn access_code(&self) -> &str {
        match self {
            Self::AccessCode(code) => code,
            Self::ApiKey(_) => "",
        }
    }
}

/// Where an allowed credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Supplied by the caller.
    User,
    /// Injected from the server configuration.
    System,
}

/// A credential cleared for forwarding upstream.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedCredential {
    key: String,
    source: CredentialSource,
}

impl ResolvedCredential {
    /// The key to send upstream.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }

    /// Value for the outbound `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.key)
    }
}

// Keys stay out of logs and panic messages.
impl fmt::Debug for ResolvedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedCredential")
            .field("key", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

/// Why a request was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Access codes are required and none matched.
    InvalidAccessCode,
    /// Nobody supplied a chat API key.
    MissingApiKey,
    /// Nobody supplied an image-service key.
    MissingImageServiceKey,
}

impl RejectReason {
    /// User-facing message.
    pub const fn message(self) -> &'static str {
        match self {
            Self::InvalidAccessCode => "missing or invalid access code",
            Self::MissingApiKey => "no API key available",
            Self::MissingImageServiceKey => "no image service API key available",
        }
    }

    /// Whether the client should prompt for an access code.
    pub const fn needs_access_code(self) -> bool {
        matches!(self, Self::InvalidAccessCode)
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Outcome of a gate check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Allowed(ResolvedCredential),
    Rejected(RejectReason),
}

impl AccessDecision {
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed(_))
    }
}

/// Gate for the chat proxy.
#[derive(Debug, Clone, Default)]
pub struct AccessGate {
    codes: AccessCodeSet,
    system_key: Option<String>,
}

impl AccessGate {
    pub fn new(codes: AccessCodeSet, system_key: Option<String>) -> Self {
        Self {
            codes,
            system_key: system_key.filter(|k| !k.is_empty()),
        }
    }

    /// Whether callers must present an access code (or their own key).
    pub fn requires_code(&self) -> bool {
        self.codes.is_enabled()
    }

    /// Decide on an inbound `Authorization` header value.
    pub fn authorize(&self, authorization: Option<&str>) -> AccessDecision {
        let credential = Credential::from_authorization(authorization);
        let user_key = credential.api_key();

        if self.codes.is_enabled() && user_key.is_none() {
            let hashed = hash_access_code(credential.access_code());
            tracing::debug!(hashed_code = %hashed, "Checking access code");
            if !self.codes.contains_hash(&hashed) {
                return AccessDecision::Rejected(RejectReason::InvalidAccessCode);
            }
        }

        if let Some(key) = user_key {
            tracing::debug!("Using caller-supplied API key");
            return AccessDecision::Allowed(ResolvedCredential {
                key: key.to_string(),
                source: CredentialSource::User,
            });
        }

        match &self.system_key {
            Some(key) => {
                tracing::debug!("Using system API key");
                AccessDecision::Allowed(ResolvedCredential {
                    key: key.clone(),
                    source: CredentialSource::System,
                })
            }
            None => {
                tracing::warn!("No system API key configured and caller supplied none");
                AccessDecision::Rejected(RejectReason::MissingApiKey)
            }
        }
    }
}

/// Gate for the image proxy.
#[derive(Debug, Clone, Default)]
pub struct ImageAccessGate {
    system_key: Option<String>,
}

impl ImageAccessGate {
    pub fn new(system_key: Option<String>) -> Self {
        Self {
            system_key: system_key.filter(|k| !k.is_empty()),
        }
    }

    /// Decide on an inbound `token` header value.
    pub fn authorize(&self, token: Option<&str>) -> AccessDecision {
        let supplied = token.map(str::trim).filter(|t| !t.is_empty());

        let (key, source) = match (supplied, &self.system_key) {
            (Some(token), _) => (token.to_string(), CredentialSource::User),
            (None, Some(key)) => (key.clone(), CredentialSource::System),
            (None, None) => return AccessDecision::Rejected(RejectReason::MissingImageServiceKey),
        };

        AccessDecision::Allowed(ResolvedCredential { key, source })
    }
}
