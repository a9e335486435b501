//! worker_install, worker_activate and worker_status tools.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_core::{DeletionReport, WorkerState};

use crate::tools::{ToolContext, json_result};

/// Output from the worker_install tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerInstallOutput {
    pub state: WorkerState,
    /// The static cache that was populated.
    pub cache: String,
    /// Number of precached entries.
    pub entries: usize,
}

/// Output from the worker_activate tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerActivateOutput {
    pub state: WorkerState,
    pub cleanup: DeletionReport,
}

/// Output from the worker_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerStatusOutput {
    pub state: WorkerState,
    pub static_cache: String,
    pub dynamic_cache: String,
    /// Resolved precache manifest.
    pub precache: Vec<String>,
    /// Every cache currently in storage.
    pub caches: Vec<String>,
}

pub async fn install_impl(ctx: &ToolContext) -> Result<CallToolResult, McpError> {
    let worker = ctx.installable_worker();
    let entries = worker.install().await?;
    json_result(&WorkerInstallOutput { state: worker.state(), cache: worker.cache_names().static_cache.clone(), entries })
}

pub async fn activate_impl(ctx: &ToolContext) -> Result<CallToolResult, McpError> {
    let worker = ctx.worker();
    let cleanup = worker.activate().await?;
    json_result(&WorkerActivateOutput { state: worker.state(), cleanup })
}

pub async fn status_impl(ctx: &ToolContext) -> Result<CallToolResult, McpError> {
    let worker = ctx.worker();
    let names = worker.cache_names();
    json_result(&WorkerStatusOutput {
        state: worker.state(),
        static_cache: names.static_cache.clone(),
        dynamic_cache: names.dynamic_cache.clone(),
        precache: worker.precache().iter().map(|r| r.url().to_string()).collect(),
        caches: worker.caches().keys().await?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{context, output};

    #[tokio::test]
    async fn test_status_before_install() {
        let (ctx, _) = context().await;

        let out = output(&status_impl(&ctx).await.unwrap());

        assert_eq!(out["state"], "parsed");
        assert_eq!(out["static_cache"], "static-v1");
        assert_eq!(out["precache"][1], "http://localhost:4173/index.html");
        assert_eq!(out["caches"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_install_then_activate() {
        let (ctx, _) = context().await;
        ctx.worker().caches().get_or_create("static-v0").await.unwrap();

        let installed = output(&install_impl(&ctx).await.unwrap());
        assert_eq!(installed["state"], "installed");
        assert_eq!(installed["entries"], 2);

        let activated = output(&activate_impl(&ctx).await.unwrap());
        assert_eq!(activated["state"], "activated");
        assert_eq!(activated["cleanup"]["deleted"][0], "static-v0");
        assert!(ctx.platform.clients_claimed());
    }

    #[tokio::test]
    async fn test_install_failure_is_tool_error() {
        let (ctx, origin) = context().await;
        origin.go_offline();

        let err = install_impl(&ctx).await.unwrap_err();
        assert!(err.message.starts_with("INSTALL_FAILED"));
        assert_eq!(ctx.worker().state(), WorkerState::Redundant);
        assert!(ctx.worker().caches().keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_install_retry_after_failure() {
        let (ctx, origin) = context().await;
        origin.go_offline();
        assert!(install_impl(&ctx).await.is_err());

        origin.go_online();
        let installed = output(&install_impl(&ctx).await.unwrap());
        assert_eq!(installed["state"], "installed");
        assert_eq!(installed["entries"], 2);

        let activated = output(&activate_impl(&ctx).await.unwrap());
        assert_eq!(activated["state"], "activated");
        assert_eq!(output(&status_impl(&ctx).await.unwrap())["state"], "activated");
    }

    #[tokio::test]
    async fn test_activate_before_install_is_tool_error() {
        let (ctx, _) = context().await;
        let err = activate_impl(&ctx).await.unwrap_err();
        assert!(err.message.starts_with("INVALID_STATE"));
    }
}
