//! cache_purge tool implementation.
//!
//! Deletes one named cache, or every cache the current worker version does not own.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_core::{DeletionReport, Error};

use crate::tools::{ToolContext, json_result};

/// Parameters for the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// Cache to delete. When omitted, every stale cache is deleted.
    #[serde(default)]
    pub name: Option<String>,
}

pub async fn purge_impl(ctx: &ToolContext, params: CachePurgeParams) -> Result<CallToolResult, McpError> {
    let worker = ctx.worker();
    let caches = worker.caches();

    let report = match params.name {
        Some(name) => {
            if !caches.delete(&name).await? {
                return Err(Error::CacheNotFound(name).into());
            }
            tracing::info!(cache = %name, "purged cache");
            DeletionReport { deleted: vec![name], ..Default::default() }
        }
        None => caches.delete_all_except(&worker.cache_names().current()).await?,
    };

    json_result(&report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{context, output};

    #[tokio::test]
    async fn test_purge_named_cache() {
        let (ctx, _) = context().await;
        ctx.worker().caches().get_or_create("dynamic-v1").await.unwrap();

        let out = output(&purge_impl(&ctx, CachePurgeParams { name: Some("dynamic-v1".into()) }).await.unwrap());

        assert_eq!(out["deleted"][0], "dynamic-v1");
        assert!(!ctx.worker().caches().has("dynamic-v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_purge_missing_cache() {
        let (ctx, _) = context().await;
        let err = purge_impl(&ctx, CachePurgeParams { name: Some("nope".into()) }).await.unwrap_err();
        assert!(err.message.starts_with("CACHE_NOT_FOUND"));
    }

    #[tokio::test]
    async fn test_purge_stale() {
        let (ctx, _) = context().await;
        for name in ["static-v0", "static-v1", "dynamic-v0"] {
            ctx.worker().caches().get_or_create(name).await.unwrap();
        }

        let out = output(&purge_impl(&ctx, CachePurgeParams { name: None }).await.unwrap());

        assert_eq!(out["deleted"].as_array().unwrap().len(), 2);
        assert_eq!(out["kept"][0], "static-v1");
        assert_eq!(ctx.worker().caches().keys().await.unwrap(), vec!["static-v1"]);
    }
}
