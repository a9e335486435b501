//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::tools::{
    ToolContext,
    cache::{self, CacheGetParams, CachePurgeParams},
    worker::{self, NotificationClickParams, PushParams, SyncParams, WorkerFetchParams},
};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for swcache.
#[derive(Clone)]
pub struct SwcacheServer {
    ctx: Arc<ToolContext>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl SwcacheServer {
    /// Create a new server handler around a worker.
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx: Arc::new(ctx), tool_router: Self::tool_router() }
    }

    #[tool(description = "Deliver the install event: precache the manifest into the static cache.")]
    async fn worker_install(&self) -> Result<CallToolResult, McpError> {
        worker::install_impl(&self.ctx).await
    }

    #[tool(description = "Deliver the activate event: delete caches from other versions and claim clients.")]
    async fn worker_activate(&self) -> Result<CallToolResult, McpError> {
        worker::activate_impl(&self.ctx).await
    }

    #[tool(description = "Report the worker lifecycle state, current cache names and precache manifest.")]
    async fn worker_status(&self) -> Result<CallToolResult, McpError> {
        worker::status_impl(&self.ctx).await
    }

    /// Route a request through the worker.
    ///
    /// Navigations get the cached app shell, static assets are cache-first with
    /// write-through, API calls are network-first with an offline fallback.
    #[tool(description = "Fetch a URL through the worker. Returns the response, its request class and whether it came from cache or network.")]
    async fn worker_fetch(&self, params: Parameters<WorkerFetchParams>) -> Result<CallToolResult, McpError> {
        worker::fetch_impl(&self.ctx, params.0).await
    }

    #[tool(description = "Deliver a push message. A JSON object payload {title, body, icon, url} shows a notification.")]
    async fn worker_push(&self, params: Parameters<PushParams>) -> Result<CallToolResult, McpError> {
        worker::push_impl(&self.ctx, params.0).await
    }

    #[tool(description = "Click a notification. The `open` action opens its URL; the notification is always closed.")]
    async fn worker_notification_click(
        &self, params: Parameters<NotificationClickParams>,
    ) -> Result<CallToolResult, McpError> {
        worker::notification_click_impl(&self.ctx, params.0).await
    }

    #[tool(description = "Deliver a background sync event with the given tag.")]
    async fn worker_sync(&self, params: Parameters<SyncParams>) -> Result<CallToolResult, McpError> {
        worker::sync_impl(&self.ctx, params.0).await
    }

    #[tool(description = "List named caches with entry counts.")]
    async fn cache_keys(&self) -> Result<CallToolResult, McpError> {
        cache::keys_impl(&self.ctx).await
    }

    #[tool(description = "Look up a cached response by URL, in one named cache or across all caches.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        cache::get_impl(&self.ctx, params.0).await
    }

    #[tool(description = "Delete a named cache, or every cache not owned by the current worker version.")]
    async fn cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        cache::purge_impl(&self.ctx, params.0).await
    }
}

impl ServerHandler for SwcacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "swcache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
