//! worker_fetch tool implementation.
//!
//! Sends a request through the worker, the way a page would.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_core::{Request, RequestClass, RequestMode, ResponseSource};

use crate::tools::{ToolContext, json_result};

/// Parameters for the worker_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerFetchParams {
    /// Absolute URL, or a path resolved against the configured origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Request mode; `navigate` marks a page navigation (default: no-cors).
    #[serde(default)]
    pub mode: RequestMode,
}

fn default_method() -> String {
    "GET".into()
}

/// Output from the worker_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerFetchOutput {
    pub url: String,
    pub class: RequestClass,
    /// Whether the cache, the network or a bypassed worker answered.
    pub source: ResponseSource,
    pub status: u16,
    pub status_text: String,
    pub content_type: Option<String>,
    /// Body as UTF-8 text (lossy).
    pub body: String,
    pub body_bytes: usize,
}

pub async fn fetch_impl(ctx: &ToolContext, params: WorkerFetchParams) -> Result<CallToolResult, McpError> {
    let url = ctx.resolve(&params.url)?;
    let url_text = url.to_string();
    let request = Request::new(&params.method, url, params.mode);

    let worker = ctx.worker();
    let outcome = worker.handle_fetch(request).await?;
    // Settle write-through before reporting.
    if let Err(e) = worker.drain().await {
        tracing::warn!(error = %e, "background work failed");
    }

    let response = outcome.response;
    json_result(&WorkerFetchOutput {
        url: url_text,
        class: outcome.class,
        source: outcome.source,
        status: response.status,
        status_text: response.status_text.clone(),
        content_type: response.content_type().map(str::to_string),
        body: response.text(),
        body_bytes: response.body.len(),
    })
}
