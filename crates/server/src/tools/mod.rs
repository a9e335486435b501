//! MCP tool implementations.
//!
//! This module contains all tools exposed by the swcache server.

pub mod cache;
pub mod worker;

use std::sync::{Arc, PoisonError, RwLock};

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;
use swcache_core::{InMemoryPlatform, ServiceWorker, WorkerState, http::canonicalize};
use url::Url;

use crate::error::ToolError;

/// Everything a tool call may touch.
pub struct ToolContext {
    worker: RwLock<Arc<ServiceWorker>>,
    pub platform: Arc<InMemoryPlatform>,
    pub origin: Url,
}

impl ToolContext {
    pub fn new(worker: ServiceWorker, platform: Arc<InMemoryPlatform>, origin: Url) -> Self {
        Self { worker: RwLock::new(Arc::new(worker)), platform, origin }
    }

    /// The current worker instance.
    pub fn worker(&self) -> Arc<ServiceWorker> {
        Arc::clone(&self.worker.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// The worker an install should run on. A redundant instance is replaced
    /// by a fresh one of the same version, the way a browser retries
    /// registration.
    pub fn installable_worker(&self) -> Arc<ServiceWorker> {
        let mut current = self.worker.write().unwrap_or_else(PoisonError::into_inner);
        if current.state() == WorkerState::Redundant {
            tracing::info!("replacing redundant worker before install");
            *current = Arc::new(current.successor());
        }
        Arc::clone(&current)
    }

    /// Resolve a tool URL argument; root-relative paths use the configured origin.
    pub fn resolve(&self, url: &str) -> Result<Url, McpError> {
        canonicalize(url, &self.origin).map_err(|e| swcache_core::Error::from(e).into())
    }
}

/// Wrap a tool output as pretty JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| ToolError::Output(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
