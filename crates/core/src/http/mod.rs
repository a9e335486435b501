//! Request and response snapshots passed between the router, caches and network.
//!
//! Both types are plain owned values: a `Response` is an immutable copy of
//! status, headers and body, so cloning one for write-through never touches
//! the network stream.

pub mod url;

use bytes::Bytes;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub use self::url::{UrlError, canonicalize};

use crate::cache::hash::compute_cache_key;

/// How the browser issued a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    /// Top-level page navigation.
    Navigate,
    SameOrigin,
    #[default]
    NoCors,
    Cors,
}

impl RequestMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestMode::Navigate => "navigate",
            RequestMode::SameOrigin => "same-origin",
            RequestMode::NoCors => "no-cors",
            RequestMode::Cors => "cors",
        }
    }
}

/// An intercepted outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: String,
    url: ::url::Url,
    mode: RequestMode,
}

impl Request {
    pub fn new(method: &str, url: ::url::Url, mode: RequestMode) -> Self {
        Self { method: method.to_ascii_uppercase(), url, mode }
    }

    /// A plain subresource GET.
    pub fn get(url: ::url::Url) -> Self {
        Self::new("GET", url, RequestMode::NoCors)
    }

    /// A top-level navigation GET.
    pub fn navigate(url: ::url::Url) -> Self {
        Self::new("GET", url, RequestMode::Navigate)
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &::url::Url {
        &self.url
    }

    pub fn mode(&self) -> RequestMode {
        self.mode
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    /// Content-addressed cache key: method plus canonical URL.
    pub fn cache_key(&self) -> String {
        compute_cache_key(&self.method, self.url.as_str())
    }
}

/// A fully buffered response snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// URL the response was produced for (after redirects).
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self { url: String::new(), status, status_text: default_status_text(status).into(), headers: Vec::new(), body: body.into() }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.to_string()));
        self
    }

    /// Whether the status is in the 2xx range (the Fetch `ok` flag).
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

fn default_status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        206 => "Partial Content",
        301 => "Moved Permanently",
        304 => "Not Modified",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "",
    }
}
