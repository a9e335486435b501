//! HTTP fetcher backed by reqwest.
//!
//! Any HTTP status is a response; only transport failures are errors:
//! - timeout → `Error::FetchTimeout`
//! - body larger than `max_bytes` → `Error::FetchTooLarge`
//! - everything else (DNS, connect, reset, redirect loop) → `Error::Network`

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::{Client, Method, header};

use swcache_core::{AppConfig, Error, Fetcher, Request, RequestMode, Response};

/// Configuration for the HTTP fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "swcache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "swcache/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Self::default()
        }
    }
}

/// Network access for the worker.
pub struct HttpFetcher {
    http: Client,
    config: FetchConfig,
}

impl HttpFetcher {
    /// Create a new fetcher with the given configuration.
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

    fn transport_error(&self, err: reqwest::Error, request: &Request) -> Error {
        if err.is_timeout() {
            Error::FetchTimeout(format!("{} after {:?}", request.url(), self.config.timeout))
        } else {
            Error::Network(format!("{}: {err}", request.url()))
        }
    }

    fn too_large(&self, len: usize) -> Error {
        Error::FetchTooLarge(format!("{len} bytes exceeds {}", self.config.max_bytes))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();
        let method = Method::from_bytes(request.method().as_bytes())
            .map_err(|_| Error::InvalidInput(format!("invalid method: {}", request.method())))?;

        let accept = match request.mode() {
            RequestMode::Navigate => "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            _ => "*/*",
        };
        let mut response = self
            .http
            .request(method, request.url().as_str())
            .header(header::ACCEPT, accept)
            .send()
            .await
            .map_err(|e| self.transport_error(e, request))?;

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(self.too_large(len as usize));
        }

        let status = response.status();
        let final_url = response.url().to_string();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();

        // Stream the body so an oversized response without content-length is cut off early.
        let mut body = BytesMut::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| self.transport_error(e, request))? {
            if body.len() + chunk.len() > self.config.max_bytes {
                return Err(self.too_large(body.len() + chunk.len()));
            }
            body.extend_from_slice(&chunk);
        }
        let body: Bytes = body.freeze();

        tracing::debug!(
            "fetched {} -> {} {} in {}ms ({} bytes)",
            request.url(),
            final_url,
            status.as_u16(),
            start.elapsed().as_millis(),
            body.len()
        );

        let mut snapshot = Response::new(status.as_u16(), body).with_url(final_url);
        if let Some(reason) = status.canonical_reason() {
            snapshot.status_text = reason.to_string();
        }
        snapshot.headers = headers;
        Ok(snapshot)
    }
}
