//! Cache storage: the set of named caches shared by every event handler.
//!
//! [`CacheStorage`] is the only way the worker touches caches. It exposes
//! `get_or_create` for handles to a single named cache and `delete_all_except`
//! for version rotation, so the "only current names survive" rule lives in one
//! place. The persistence layer behind it is the [`CacheBackend`] trait.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::{join_all, try_join_all};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::connection::CacheDb;
use super::entries::StoredEntry;
use crate::Error;
use crate::fetch::Fetcher;
use crate::http::{Request, Response};

/// Persistence operations a cache store must provide.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Create the named cache if absent.
    async fn create(&self, name: &str) -> Result<(), Error>;

    /// All cache names in creation order.
    async fn names(&self) -> Result<Vec<String>, Error>;

    /// Delete a cache. Returns false if it did not exist.
    async fn delete(&self, name: &str) -> Result<bool, Error>;

    /// Find the response stored for `request`, in one cache or across all of them.
    async fn lookup(&self, cache: Option<&str>, request: &Request) -> Result<Option<Response>, Error>;

    /// Store entries atomically.
    async fn store(&self, cache: &str, entries: Vec<StoredEntry>) -> Result<(), Error>;

    /// Request URLs held by a cache.
    async fn urls(&self, cache: &str) -> Result<Vec<String>, Error>;

    /// Durably mark the worker owning `cache` as activated.
    async fn mark_activated(&self, cache: &str) -> Result<(), Error>;

    /// Whether `cache` exists and its worker was marked activated.
    async fn is_activated(&self, cache: &str) -> Result<bool, Error>;
}

#[async_trait]
impl CacheBackend for CacheDb {
    async fn create(&self, name: &str) -> Result<(), Error> {
        if self.create_cache(name).await? {
            tracing::debug!(cache = name, "created cache");
        }
        Ok(())
    }

    async fn names(&self) -> Result<Vec<String>, Error> {
        self.cache_names().await
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        self.delete_cache(name).await
    }

    async fn lookup(&self, cache: Option<&str>, request: &Request) -> Result<Option<Response>, Error> {
        self.match_entry(cache, &request.cache_key()).await
    }

    async fn store(&self, cache: &str, entries: Vec<StoredEntry>) -> Result<(), Error> {
        self.put_entries(cache, entries).await
    }

    async fn urls(&self, cache: &str) -> Result<Vec<String>, Error> {
        self.entry_urls(cache).await
    }

    async fn mark_activated(&self, cache: &str) -> Result<(), Error> {
        self.record_activation(cache).await
    }

    async fn is_activated(&self, cache: &str) -> Result<bool, Error> {
        self.activation_recorded(cache).await
    }
}

/// A stale cache that could not be removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FailedDeletion {
    pub name: String,
    pub reason: String,
}

/// Outcome of a version-rotation sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DeletionReport {
    pub deleted: Vec<String>,
    pub kept: Vec<String>,
    pub failed: Vec<FailedDeletion>,
}

impl DeletionReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Shared handle to every named cache.
#[derive(Clone)]
pub struct CacheStorage {
    backend: Arc<dyn CacheBackend>,
}

impl std::fmt::Debug for CacheStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStorage").finish_non_exhaustive()
    }
}

impl From<CacheDb> for CacheStorage {
    fn from(db: CacheDb) -> Self {
        Self::new(Arc::new(db))
    }
}

impl CacheStorage {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    /// Open a named cache, creating it if needed.
    pub async fn get_or_create(&self, name: &str) -> Result<NamedCache, Error> {
        self.backend.create(name).await?;
        Ok(NamedCache { backend: Arc::clone(&self.backend), name: name.to_string() })
    }

    /// All cache names in creation order.
    pub async fn keys(&self) -> Result<Vec<String>, Error> {
        self.backend.names().await
    }

    pub async fn has(&self, name: &str) -> Result<bool, Error> {
        Ok(self.keys().await?.iter().any(|n| n == name))
    }

    pub async fn delete(&self, name: &str) -> Result<bool, Error> {
        self.backend.delete(name).await
    }

    pub async fn mark_activated(&self, name: &str) -> Result<(), Error> {
        self.backend.mark_activated(name).await
    }

    /// Whether a worker owning the static cache `name` completed activation.
    pub async fn is_activated(&self, name: &str) -> Result<bool, Error> {
        self.backend.is_activated(name).await
    }

    /// Fetch every request, then store the responses together in `name`.
    ///
    /// Nothing is created or written unless every fetch succeeds with a 2xx
    /// status. A cache created by this call is removed again if the write
    /// fails. Returns the number of entries written.
    pub async fn add_all(&self, name: &str, fetcher: &dyn Fetcher, requests: &[Request]) -> Result<usize, Error> {
        let pairs = try_join_all(requests.iter().map(|request| async move {
            let install_failed = |reason: String| Error::InstallFailed { url: request.url().to_string(), reason };
            let response = fetcher.fetch(request).await.map_err(|e| install_failed(e.to_string()))?;
            if !response.ok() {
                return Err(install_failed(format!("status {}", response.status)));
            }
            Ok((request.clone(), response))
        }))
        .await?;

        let existed = self.has(name).await?;
        let cache = self.get_or_create(name).await?;
        let count = pairs.len();
        if let Err(e) = cache.put_all(pairs).await {
            let cleanup = if existed { Ok(false) } else { self.delete(name).await };
            if let Err(cleanup) = cleanup {
                tracing::warn!(cache = name, error = %cleanup, "failed to remove cache after a failed write");
            }
            return Err(e);
        }
        Ok(count)
    }

    /// Search every cache, oldest first. Non-GET requests never match.
    pub async fn match_any(&self, request: &Request) -> Result<Option<Response>, Error> {
        if !request.is_get() {
            return Ok(None);
        }
        self.backend.lookup(None, request).await
    }

    /// Delete every cache whose name is not in `keep`.
    ///
    /// Deletions run concurrently and independently; a failure is recorded in
    /// the report and never stops the others. Only failing to list the caches
    /// is an error.
    pub async fn delete_all_except(&self, keep: &[&str]) -> Result<DeletionReport, Error> {
        let names = self.keys().await?;
        let (kept, stale): (Vec<String>, Vec<String>) = names.into_iter().partition(|n| keep.contains(&n.as_str()));

        let outcomes = join_all(stale.into_iter().map(|name| async move {
            let result = self.backend.delete(&name).await;
            (name, result)
        }))
        .await;

        let mut report = DeletionReport { kept, ..Default::default() };
        for (name, result) in outcomes {
            match result {
                Ok(_) => {
                    tracing::info!(cache = %name, "deleted stale cache");
                    report.deleted.push(name);
                }
                Err(e) => {
                    tracing::warn!(cache = %name, error = %e, "failed to delete stale cache");
                    report.failed.push(FailedDeletion { name, reason: e.to_string() });
                }
            }
        }

        Ok(report)
    }
}

/// Handle to one named cache.
#[derive(Clone)]
pub struct NamedCache {
    backend: Arc<dyn CacheBackend>,
    name: String,
}

impl std::fmt::Debug for NamedCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedCache").field("name", &self.name).finish_non_exhaustive()
    }
}

impl NamedCache {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Response stored for exactly this request in this cache.
    pub async fn match_request(&self, request: &Request) -> Result<Option<Response>, Error> {
        if !request.is_get() {
            return Ok(None);
        }
        self.backend.lookup(Some(&self.name), request).await
    }

    /// Store one response, replacing any previous entry for the request.
    pub async fn put(&self, request: &Request, response: &Response) -> Result<(), Error> {
        self.put_all(vec![(request.clone(), response.clone())]).await
    }

    /// Store a batch of responses; all or nothing.
    pub async fn put_all(&self, pairs: Vec<(Request, Response)>) -> Result<(), Error> {
        if let Some((req, _)) = pairs.iter().find(|(req, _)| !req.is_get()) {
            return Err(Error::UnsupportedMethod(format!("{} {}", req.method(), req.url())));
        }
        let entries = pairs.iter().map(|(req, resp)| StoredEntry::new(req, resp)).collect();
        self.backend.store(&self.name, entries).await
    }

    /// Request URLs held by this cache.
    pub async fn urls(&self) -> Result<Vec<String>, Error> {
        self.backend.urls(&self.name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeFetcher, FlakyBackend, get};

    async fn storage() -> CacheStorage {
        CacheStorage::from(CacheDb::open_in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn test_get_or_create_then_put() {
        let caches = storage().await;
        let cache = caches.get_or_create("dynamic-v1").await.unwrap();
        let req = get("/assets/images/hero.webp");

        cache.put(&req, &Response::new(200, "img")).await.unwrap();

        let found = cache.match_request(&req).await.unwrap().unwrap();
        assert_eq!(found.text(), "img");
        assert_eq!(caches.keys().await.unwrap(), vec!["dynamic-v1"]);
    }

    #[tokio::test]
    async fn test_put_rejects_non_get() {
        let caches = storage().await;
        let cache = caches.get_or_create("dynamic-v1").await.unwrap();
        let req = Request::new("POST", get("/api/contact").url().clone(), crate::http::RequestMode::Cors);

        let result = cache.put(&req, &Response::new(200, "ok")).await;
        assert!(matches!(result, Err(Error::UnsupportedMethod(_))));
        assert!(cache.urls().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_match_any_ignores_non_get() {
        let caches = storage().await;
        let cache = caches.get_or_create("static-v1").await.unwrap();
        cache.put(&get("/api/contact"), &Response::new(200, "cached")).await.unwrap();

        let post = Request::new("POST", get("/api/contact").url().clone(), crate::http::RequestMode::Cors);
        assert!(caches.match_any(&post).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_all_is_all_or_nothing() {
        let caches = storage().await;
        let cache = caches.get_or_create("static-v1").await.unwrap();
        let post = Request::new("POST", get("/b").url().clone(), crate::http::RequestMode::Cors);

        let result = cache
            .put_all(vec![(get("/a"), Response::new(200, "a")), (post, Response::new(200, "b"))])
            .await;
        assert!(result.is_err());
        assert!(cache.urls().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_all_except_keeps_current_versions() {
        let caches = storage().await;
        for name in ["static-v0", "static-v1", "dynamic-v1"] {
            caches.get_or_create(name).await.unwrap();
        }

        let report = caches.delete_all_except(&["static-v1", "dynamic-v1"]).await.unwrap();

        assert_eq!(report.deleted, vec!["static-v0"]);
        assert_eq!(report.kept, vec!["static-v1", "dynamic-v1"]);
        assert!(report.is_clean());
        assert_eq!(caches.keys().await.unwrap(), vec!["static-v1", "dynamic-v1"]);
    }

    #[tokio::test]
    async fn test_delete_all_except_continues_past_failures() {
        let backend = Arc::new(FlakyBackend::new(CacheDb::open_in_memory().await.unwrap()));
        backend.fail_delete_of("static-v0");
        let caches = CacheStorage::new(backend);
        for name in ["static-v0", "dynamic-v0", "static-v1", "dynamic-v1"] {
            caches.get_or_create(name).await.unwrap();
        }

        let report = caches.delete_all_except(&["static-v1", "dynamic-v1"]).await.unwrap();

        assert_eq!(report.deleted, vec!["dynamic-v0"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].name, "static-v0");
        assert_eq!(caches.keys().await.unwrap(), vec!["static-v0", "static-v1", "dynamic-v1"]);
    }

    #[tokio::test]
    async fn test_add_all_stores_every_response() {
        let caches = storage().await;
        let fetcher = FakeFetcher::new();
        fetcher.serve("/", 200, "root");
        fetcher.serve("/static/js/main.js", 200, "js");

        let count = caches.add_all("static-v1", &fetcher, &[get("/"), get("/static/js/main.js")]).await.unwrap();

        assert_eq!(count, 2);
        let cache = caches.get_or_create("static-v1").await.unwrap();
        assert_eq!(cache.match_request(&get("/static/js/main.js")).await.unwrap().unwrap().text(), "js");
    }

    #[tokio::test]
    async fn test_add_all_fails_on_missing_asset_without_creating_cache() {
        let caches = storage().await;
        let fetcher = FakeFetcher::new();
        fetcher.serve("/", 200, "root");

        let result = caches.add_all("static-v1", &fetcher, &[get("/"), get("/static/css/main.css")]).await;

        assert!(matches!(result, Err(Error::InstallFailed { reason, .. }) if reason == "status 404"));
        assert!(caches.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_all_removes_cache_it_created_when_write_fails() {
        let backend = Arc::new(FlakyBackend::new(CacheDb::open_in_memory().await.unwrap()));
        backend.fail_stores(true);
        let caches = CacheStorage::new(backend);
        caches.get_or_create("static-v0").await.unwrap();
        let fetcher = FakeFetcher::new();
        fetcher.serve("/", 200, "root");

        assert!(caches.add_all("static-v1", &fetcher, &[get("/")]).await.is_err());
        assert!(caches.add_all("static-v0", &fetcher, &[get("/")]).await.is_err());

        assert_eq!(caches.keys().await.unwrap(), vec!["static-v0"]);
    }

    #[tokio::test]
    async fn test_activation_survives_only_with_its_cache() {
        let caches = storage().await;
        caches.get_or_create("static-v1").await.unwrap();
        caches.mark_activated("static-v1").await.unwrap();
        assert!(caches.is_activated("static-v1").await.unwrap());

        caches.delete_all_except(&["static-v2"]).await.unwrap();
        assert!(!caches.is_activated("static-v1").await.unwrap());
    }
}
