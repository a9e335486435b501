//! Fakes for router and storage tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use url::Url;

use crate::Error;
use crate::cache::{CacheBackend, CacheDb, StoredEntry};
use crate::fetch::Fetcher;
use crate::http::{Request, Response};

pub const ORIGIN: &str = "http://localhost:4173";

pub fn url(path_or_url: &str) -> Url {
    crate::http::canonicalize(path_or_url, &Url::parse(ORIGIN).unwrap()).unwrap()
}

pub fn get(path_or_url: &str) -> Request {
    Request::get(url(path_or_url))
}

pub fn navigate(path_or_url: &str) -> Request {
    Request::navigate(url(path_or_url))
}

/// Network double with a switch for going offline.
///
/// Unknown URLs answer 404 while online.
#[derive(Default)]
pub struct FakeFetcher {
    routes: Mutex<HashMap<String, Response>>,
    offline: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, path_or_url: &str, status: u16, body: &str) {
        let url = url(path_or_url);
        let response = Response::new(status, body.to_string())
            .with_url(url.as_str())
            .with_header("content-type", "text/plain");
        self.routes.lock().unwrap().insert(url.to_string(), response);
    }

    pub fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    pub fn go_online(&self) {
        self.offline.store(false, Ordering::SeqCst);
    }

    /// URLs fetched so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.calls.lock().unwrap().push(request.url().to_string());
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("offline: {}", request.url())));
        }
        let routes = self.routes.lock().unwrap();
        Ok(routes
            .get(request.url().as_str())
            .cloned()
            .unwrap_or_else(|| Response::new(404, "not found").with_url(request.url().as_str())))
    }
}

/// SQLite backend with switchable failures.
pub struct FlakyBackend {
    db: CacheDb,
    fail_deletes: Mutex<HashSet<String>>,
    fail_lookups: AtomicBool,
    fail_stores: AtomicBool,
}

impl FlakyBackend {
    pub fn new(db: CacheDb) -> Self {
        Self {
            db,
            fail_deletes: Mutex::new(HashSet::new()),
            fail_lookups: AtomicBool::new(false),
            fail_stores: AtomicBool::new(false),
        }
    }

    pub fn fail_delete_of(&self, name: &str) {
        self.fail_deletes.lock().unwrap().insert(name.to_string());
    }

    pub fn fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }

    pub fn fail_stores(&self, fail: bool) {
        self.fail_stores.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl CacheBackend for FlakyBackend {
    async fn create(&self, name: &str) -> Result<(), Error> {
        self.db.create(name).await
    }

    async fn names(&self) -> Result<Vec<String>, Error> {
        self.db.names().await
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        if self.fail_deletes.lock().unwrap().contains(name) {
            return Err(Error::Storage(format!("cannot delete {name}")));
        }
        self.db.delete(name).await
    }

    async fn lookup(&self, cache: Option<&str>, request: &Request) -> Result<Option<Response>, Error> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(Error::Storage("storage unavailable".into()));
        }
        self.db.lookup(cache, request).await
    }

    async fn store(&self, cache: &str, entries: Vec<StoredEntry>) -> Result<(), Error> {
        if self.fail_stores.load(Ordering::SeqCst) {
            return Err(Error::Storage("quota exceeded".into()));
        }
        self.db.store(cache, entries).await
    }

    async fn urls(&self, cache: &str) -> Result<Vec<String>, Error> {
        self.db.urls(cache).await
    }

    async fn mark_activated(&self, cache: &str) -> Result<(), Error> {
        self.db.mark_activated(cache).await
    }

    async fn is_activated(&self, cache: &str) -> Result<bool, Error> {
        self.db.activation_recorded(cache).await
    }
}
