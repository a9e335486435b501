//! Core types and the offline cache router for swcache.
//!
//! This crate provides:
//! - Named, versioned caches with a SQLite backend
//! - Request classification and per-class cache/network policies
//! - The service-worker lifecycle (install, activate, fetch, push, sync)
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod http;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{CacheDb, CacheStorage, DeletionReport, NamedCache};
pub use config::AppConfig;
pub use error::Error;
pub use fetch::Fetcher;
pub use http::{Request, RequestMode, Response};
pub use worker::{FetchOutcome, InMemoryPlatform, Platform, RequestClass, ResponseSource, ServiceWorker, WorkerState};
