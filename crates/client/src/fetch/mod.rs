//! Upstream HTTP fetch.
//!
//! The controller only talks to the network through [`Upstream`], so tests
//! can substitute a stub. [`FetchClient`] is the reqwest-backed implementation.
//!
//! ### Semantics
//! - Any HTTP status is a response, including 4xx/5xx.
//! - Only transport failures (DNS, connect, timeout, oversize body) are errors.
//! - Responses from the page origin are `basic`, everything else `cors`.

pub mod url;

use reqwest::Client;
use std::time::{Duration, Instant};

pub use self::url::{UrlError, canonicalize, resolve};

use harbor_core::{Error, RequestDescriptor, ResponseKind, ResponseSnapshot};

/// Source of network responses.
#[async_trait::async_trait]
pub trait Upstream: Send + Sync {
    /// Perform the request. `Err` means no response was produced.
    async fn fetch(&self, request: &RequestDescriptor) -> Result<ResponseSnapshot, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "harbor/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 10MB)
    pub max_bytes: usize,

    /// Request timeout (default: 30s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 20)
    pub max_redirects: usize,

    /// Origin of the controlled page; same-origin responses are `basic`.
    pub page_origin: Option<::url::Origin>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "harbor/0.1".to_string(),
            max_bytes: 10 * 1024 * 1024,
            timeout: Duration::from_millis(30_000),
            max_redirects: 20,
            page_origin: None,
        }
    }
}

/// HTTP fetch client.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    fn kind_for(&self, url: &::url::Url) -> ResponseKind {
        match &self.config.page_origin {
            Some(origin) if *origin == url.origin() => ResponseKind::Basic,
            Some(_) => ResponseKind::Cors,
            None => ResponseKind::Basic,
        }
    }

    fn check_size(&self, len: usize) -> Result<(), Error> {
        if len > self.config.max_bytes {
            return Err(Error::Network(format!("{len} bytes exceeds {}", self.config.max_bytes)));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Upstream for FetchClient {
    async fn fetch(&self, request: &RequestDescriptor) -> Result<ResponseSnapshot, Error> {
        let start = Instant::now();
        let method = reqwest::Method::from_bytes(request.method().as_bytes())
            .map_err(|e| Error::InvalidInput(format!("invalid method {}: {e}", request.method())))?;

        let response = self
            .http
            .request(method, request.url().as_str())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Network(format!("timed out: {}", request.url()))
                } else {
                    Error::Network(format!("{}: {e}", request.url()))
                }
            })?;

        if let Some(len) = response.content_length() {
            self.check_size(len as usize)?;
        }

        let status = response.status();
        let final_url = response.url().clone();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.to_string(), v.to_string())))
            .collect::<Vec<_>>();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response: {e}")))?;
        self.check_size(bytes.len())?;

        tracing::debug!(
            "fetched {} {} -> {} in {}ms ({} bytes)",
            request.method(),
            request.url(),
            status.as_u16(),
            start.elapsed().as_millis(),
            bytes.len()
        );

        Ok(ResponseSnapshot {
            kind: self.kind_for(&final_url),
            url: final_url.into(),
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body: bytes.to_vec(),
        })
    }
}
