//! swcache command line.
//!
//! Operates on the same SQLite cache store and configuration as the MCP server.

mod manifest;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use swcache_client::{FetchConfig, HttpFetcher};
use swcache_core::{AppConfig, CacheDb, CacheStorage, InMemoryPlatform, Request, ServiceWorker, http::canonicalize};
use tracing_subscriber::EnvFilter;

use manifest::EntryCheck;

#[derive(Parser, Debug)]
#[command(name = "swcache")]
#[command(about = "Offline cache router: precache, inspect and fetch through the worker")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that every precache entry exists in a build output directory
    CheckManifest {
        /// Build output directory (e.g. `dist`)
        dist: PathBuf,
    },
    /// Install and activate the worker against the live origin
    Precache,
    /// List caches and their entry counts
    Caches,
    /// Fetch a URL through the worker
    Fetch {
        /// Absolute URL or a path on the configured origin
        url: String,
        /// Send the request as a page navigation
        #[arg(long)]
        navigate: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let args = Args::parse();
    let config = AppConfig::load()?;

    match args.command {
        Command::CheckManifest { dist } => check_manifest(&config, &dist),
        Command::Precache => precache(&config).await,
        Command::Caches => caches(&config).await,
        Command::Fetch { url, navigate } => fetch(&config, &url, navigate).await,
    }
}

async fn worker(config: &AppConfig) -> Result<ServiceWorker> {
    let caches = CacheStorage::from(CacheDb::open(&config.db_path).await?);
    let fetcher = Arc::new(HttpFetcher::new(FetchConfig::from(config))?);
    Ok(ServiceWorker::new(config, caches, fetcher, Arc::new(InMemoryPlatform::new()))?)
}

fn check_manifest(config: &AppConfig, dist: &std::path::Path) -> Result<()> {
    if !dist.is_dir() {
        bail!("{} is not a directory", dist.display());
    }

    let mut missing = 0;
    for (entry, result) in manifest::check(dist, &config.precache) {
        match result {
            EntryCheck::Present(file) => println!("ok       {entry} -> {}", file.display()),
            EntryCheck::Remote => println!("remote   {entry}"),
            EntryCheck::Missing(file) => {
                missing += 1;
                println!("MISSING  {entry} -> {}", file.display());
            }
        }
    }

    if missing > 0 {
        bail!("{missing} precache entries missing from {}", dist.display());
    }
    Ok(())
}

async fn precache(config: &AppConfig) -> Result<()> {
    let worker = worker(config).await?;
    let report = worker.start().await?;

    let names = worker.cache_names();
    let entries = worker.caches().get_or_create(&names.static_cache).await?.urls().await?.len();
    println!("installed {} ({entries} entries), state {}", names.static_cache, worker.state());
    for name in &report.deleted {
        println!("deleted  {name}");
    }
    for failed in &report.failed {
        println!("FAILED   {}: {}", failed.name, failed.reason);
    }
    Ok(())
}

async fn caches(config: &AppConfig) -> Result<()> {
    let caches = CacheStorage::from(CacheDb::open(&config.db_path).await?);
    let names = config.cache_names();

    for name in caches.keys().await? {
        let entries = caches.get_or_create(&name).await?.urls().await?.len();
        let marker = if names.is_current(&name) { "*" } else { " " };
        println!("{marker} {name:<24} {entries:>6}");
    }
    Ok(())
}

async fn fetch(config: &AppConfig, url: &str, navigate: bool) -> Result<()> {
    let worker = worker(config).await?;
    if !worker.resume().await? {
        tracing::warn!("no activated worker in storage; fetching straight from the network");
    }

    let url = canonicalize(url, &config.origin_url()?)?;
    let request = if navigate { Request::navigate(url) } else { Request::get(url) };
    let outcome = worker.handle_fetch(request).await?;
    worker.drain().await?;

    let response = &outcome.response;
    eprintln!(
        "{} {} ({:?} via {:?}, {} bytes)",
        response.status,
        response.status_text,
        outcome.class,
        outcome.source,
        response.body.len()
    );
    println!("{}", response.text());
    Ok(())
}
