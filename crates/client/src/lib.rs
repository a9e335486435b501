//! Network access for swcache.
//!
//! This crate provides the reqwest-backed [`Fetcher`](swcache_core::Fetcher)
//! shared by the server and CLI.

pub mod fetch;

pub use fetch::{FetchConfig, HttpFetcher};
