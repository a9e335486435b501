//! Per-class cache/network policies.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::event::ExtendableEvent;
use super::route::RequestClass;
use super::CacheNames;
use crate::Error;
use crate::cache::CacheStorage;
use crate::fetch::Fetcher;
use crate::http::{Request, Response};

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Cache,
    Network,
    /// Network, without the worker involved (no active worker).
    Passthrough,
}

/// A response together with its source.
#[derive(Debug, Clone)]
pub struct Served {
    pub response: Response,
    pub source: ResponseSource,
}

impl Served {
    fn cache(response: Response) -> Self {
        Self { response, source: ResponseSource::Cache }
    }

    fn network(response: Response) -> Self {
        Self { response, source: ResponseSource::Network }
    }
}

/// Executes the policy chosen for a request class.
#[derive(Clone)]
pub struct Router {
    pub(crate) caches: CacheStorage,
    pub(crate) fetcher: Arc<dyn Fetcher>,
    pub(crate) names: CacheNames,
    pub(crate) root_document: Request,
}

impl Router {
    pub async fn route(&self, class: RequestClass, request: Request, lifetime: ExtendableEvent) -> Result<Served, Error> {
        match class {
            RequestClass::NavigationDocument => self.root_document_first(&request).await,
            RequestClass::StaticAsset => self.cache_first_write_through(request, &lifetime).await,
            RequestClass::ApiCall => self.network_first(&request).await,
            RequestClass::Other => self.cache_first(&request).await,
        }
    }

    /// Cache lookup where a storage failure counts as a miss.
    async fn cached(&self, request: &Request) -> Option<Response> {
        match self.caches.match_any(request).await {
            Ok(Some(response)) => {
                tracing::debug!(url = %request.url(), "cache hit");
                Some(response)
            }
            Ok(None) => {
                tracing::debug!(url = %request.url(), "cache miss");
                None
            }
            Err(e) => {
                tracing::warn!(url = %request.url(), error = %e, "cache read failed; treating as miss");
                None
            }
        }
    }

    async fn network(&self, request: &Request) -> Result<Response, Error> {
        self.fetcher.fetch(request).await.inspect_err(|e| {
            tracing::debug!(url = %request.url(), error = %e, "network fetch failed");
        })
    }

    /// Navigation: the cached root document, whatever page was asked for.
    async fn root_document_first(&self, request: &Request) -> Result<Served, Error> {
        if let Some(response) = self.cached(&self.root_document).await {
            return Ok(Served::cache(response));
        }
        self.network(request).await.map(Served::network)
    }

    /// Static assets: cache first; a 200 from the network is copied into the
    /// dynamic cache in the background.
    async fn cache_first_write_through(&self, request: Request, lifetime: &ExtendableEvent) -> Result<Served, Error> {
        if let Some(response) = self.cached(&request).await {
            return Ok(Served::cache(response));
        }

        let response = self.network(&request).await?;
        if response.status == 200 && request.is_get() {
            let caches = self.caches.clone();
            let name = self.names.dynamic_cache.clone();
            let copy = response.clone();
            lifetime.wait_until(async move {
                let written = async { caches.get_or_create(&name).await?.put(&request, &copy).await }.await;
                match written {
                    Ok(()) => tracing::debug!(cache = %name, url = %request.url(), "stored runtime asset"),
                    Err(e) => tracing::warn!(cache = %name, url = %request.url(), error = %e, "write-through failed"),
                }
                Ok(())
            });
        }
        Ok(Served::network(response))
    }

    /// API calls: network first; the cache only answers when the network is gone.
    async fn network_first(&self, request: &Request) -> Result<Served, Error> {
        match self.network(request).await {
            Ok(response) => Ok(Served::network(response)),
            Err(network_err) => match self.cached(request).await {
                Some(response) => {
                    tracing::info!(url = %request.url(), "network unavailable; serving cached API response");
                    Ok(Served::cache(response))
                }
                None => Err(network_err),
            },
        }
    }

    /// Everything else: cache first, never written.
    async fn cache_first(&self, request: &Request) -> Result<Served, Error> {
        if let Some(response) = self.cached(request).await {
            return Ok(Served::cache(response));
        }
        self.network(request).await.map(Served::network)
    }
}
