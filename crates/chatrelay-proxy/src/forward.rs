//! Request forwarding to the chat and image upstreams.
//!
//! Building the outbound request is kept apart from sending it: the builders
//! here are pure functions of the configuration and the resolved credential,
//! and sending goes through the [`Upstream`] trait so handlers can be tested
//! without a network.

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header};
use bytes::Bytes;
use chatrelay_core::{RelayConfig, ResolvedCredential, UpstreamService};
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use reqwest::Client;
use tracing::{debug, error, warn};

use crate::error::ForwardError;

/// Upstream response body as delivered by the network.
pub type ByteStream = BoxStream<'static, Result<Bytes, std::io::Error>>;

static ORGANIZATION_HEADER: HeaderName = HeaderName::from_static("openai-organization");
static TOKEN_HEADER: HeaderName = HeaderName::from_static("token");

/// Prefix upstream API keys carry.
const API_KEY_PREFIX: &str = "sk-";

/// A fully built outbound request.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    /// Replayed as-is; an empty body is not sent.
    pub body: Bytes,
}

/// Raw upstream response, not yet interpreted.
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ByteStream,
}

/// Sends built requests upstream.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, ForwardError>;
}

/// [`Upstream`] backed by a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: Client,
}

impl HttpUpstream {
    /// Build with a fresh client.
    pub fn new() -> Result<Self, ForwardError> {
        let client = Client::builder().pool_max_idle_per_host(10).build()?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub const fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, ForwardError> {
        debug!(method = %request.method, url = %request.url, "Forwarding upstream");

        let mut builder = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers);
        if !request.body.is_empty() {
            builder = builder.body(request.body);
        }

        let response = builder.send().await.map_err(|e| {
            error!(url = %request.url, "Failed to reach upstream: {e}");
            ForwardError::from(e)
        })?;

        Ok(UpstreamResponse {
            status: response.status(),
            headers: response.headers().clone(),
            body: response.bytes_stream().map_err(std::io::Error::other).boxed(),
        })
    }
}

/// Upstream-relative part of an inbound path.
///
/// Paths outside the service's route prefix are returned unchanged, minus any
/// leading slash.
pub fn upstream_path(path: &str, service: UpstreamService) -> &str {
    path.strip_prefix(service.route_prefix())
        .unwrap_or(path)
        .trim_start_matches('/')
}

/// Join a base URL and a relative path with exactly one slash.
pub fn join_url(base: &str, relative: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        relative.trim_start_matches('/')
    )
}

fn header_value(name: &'static str, value: &str) -> Result<HeaderValue, ForwardError> {
    HeaderValue::from_str(value).map_err(|_| ForwardError::InvalidHeader(name))
}

/// Build the request for the chat upstream.
///
/// The inbound query string, if any, is carried over.
pub fn chat_request(
    config: &RelayConfig,
    method: Method,
    relative: &str,
    query: Option<&str>,
    credential: &ResolvedCredential,
    body: Bytes,
) -> Result<UpstreamRequest, ForwardError> {
    let mut url = join_url(&config.chat_base_url(), relative);
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        url.push('?');
        url.push_str(query);
    }

    if !credential.key().starts_with(API_KEY_PREFIX) {
        warn!(
            source = ?credential.source(),
            "Chat credential does not look like an API key"
        );
    }

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        header::AUTHORIZATION,
        header_value("authorization", &credential.bearer())?,
    );
    if let Some(org) = config.org_id() {
        headers.insert(ORGANIZATION_HEADER.clone(), header_value("openai-organization", org)?);
    }

    Ok(UpstreamRequest {
        method,
        url,
        headers,
        body,
    })
}

/// Build the request for the image upstream.
///
/// Only the path is forwarded; the inbound query string is dropped.
pub fn image_request(
    config: &RelayConfig,
    method: Method,
    relative: &str,
    credential: &ResolvedCredential,
    body: Bytes,
) -> Result<UpstreamRequest, ForwardError> {
    let base = config
        .image_base_url()
        .ok_or(ForwardError::MissingBaseUrl(UpstreamService::Image))?;

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(TOKEN_HEADER.clone(), header_value("token", credential.key())?);

    Ok(UpstreamRequest {
        method,
        url: join_url(base, relative),
        headers,
        body,
    })
}
