//! SQLite-backed named caches of request/response pairs.
//!
//! This module provides persistent, versioned caches using SQLite with async
//! access via tokio-rusqlite. It supports:
//!
//! - Content-addressed entry keys (SHA-256 of method and URL)
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Atomic batch writes and version-rotation sweeps

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod storage;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::StoredEntry;
pub use storage::{CacheBackend, CacheStorage, DeletionReport, FailedDeletion, NamedCache};
