//! cache_get tool implementation.
//!
//! Looks a URL up in one named cache or across all of them.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_core::{Error, Request};

use crate::tools::{ToolContext, json_result};

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Absolute URL, or a path resolved against the configured origin.
    pub url: String,

    /// Restrict the lookup to this cache (default: search every cache).
    #[serde(default)]
    pub cache: Option<String>,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub url: String,
    pub cache: Option<String>,
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    /// Body as UTF-8 text (lossy).
    pub body: String,
}

pub async fn get_impl(ctx: &ToolContext, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    let request = Request::get(ctx.resolve(&params.url)?);
    let worker = ctx.worker();
    let caches = worker.caches();

    let response = match params.cache.as_deref() {
        Some(name) => {
            if !caches.has(name).await? {
                return Err(Error::CacheNotFound(name.to_string()).into());
            }
            caches.get_or_create(name).await?.match_request(&request).await?
        }
        None => caches.match_any(&request).await?,
    }
    .ok_or_else(|| Error::CacheMiss(request.url().to_string()))?;

    json_result(&CacheGetOutput {
        url: request.url().to_string(),
        cache: params.cache,
        status: response.status,
        status_text: response.status_text.clone(),
        body: response.text(),
        headers: response.headers,
    })
}
