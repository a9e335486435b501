//! cache_keys tool implementation.
//!
//! Lists every named cache with its entry count.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::{ToolContext, json_result};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheSummary {
    pub name: String,
    /// Whether the cache belongs to the current worker version.
    pub current: bool,
    pub entries: usize,
}

/// Output from the cache_keys tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheKeysOutput {
    pub caches: Vec<CacheSummary>,
}

pub async fn keys_impl(ctx: &ToolContext) -> Result<CallToolResult, McpError> {
    let worker = ctx.worker();
    let caches = worker.caches();
    let names = worker.cache_names();

    let mut summaries = Vec::new();
    for name in caches.keys().await? {
        let entries = caches.get_or_create(&name).await?.urls().await?.len();
        summaries.push(CacheSummary { current: names.is_current(&name), name, entries });
    }

    json_result(&CacheKeysOutput { caches: summaries })
}
