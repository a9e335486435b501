//! swcache MCP server entry point.
//!
//! This is the main binary that boots the MCP server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use swcache_client::{FetchConfig, HttpFetcher};
use swcache_core::{AppConfig, CacheDb, CacheStorage, InMemoryPlatform, ServiceWorker};
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let origin = config.origin_url()?;
    tracing::info!(origin = %origin, db = %config.db_path.display(), "Starting swcache server on stdio transport");

    let caches = CacheStorage::from(CacheDb::open(&config.db_path).await?);
    let fetcher = Arc::new(HttpFetcher::new(FetchConfig::from(&config))?);
    let platform = Arc::new(InMemoryPlatform::new());
    let worker = ServiceWorker::new(&config, caches, fetcher, platform.clone())?;
    worker.resume().await?;
    tracing::info!(state = %worker.state(), "worker ready");

    let handler = handler::SwcacheServer::new(tools::ToolContext::new(worker, platform, origin));
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
