//! The offline cache worker.
//!
//! [`ServiceWorker`] owns the lifecycle state and the event handlers. Each
//! `on_*` method is the handler for one event kind: it does its work inside
//! the event it is given, registering async work with `wait_until` or
//! `respond_with`. The matching dispatcher (`install`, `activate`,
//! `handle_fetch`, ...) builds the event, runs the handler, waits for the
//! event to settle and drives the state machine.

pub mod event;
pub mod lifecycle;
pub mod notify;
pub mod route;
pub mod strategy;

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::oneshot;

pub use event::{ExtendableEvent, FetchEvent};
pub use lifecycle::WorkerState;
pub use notify::{
    InMemoryPlatform, Notification, NotificationAction, NotificationDefaults, NotificationId, Platform, PushPayload,
};
pub use route::{RequestClass, RoutePolicy};
pub use strategy::{ResponseSource, Router, Served};

use crate::cache::{CacheStorage, DeletionReport};
use crate::config::AppConfig;
use crate::fetch::Fetcher;
use crate::http::{Request, Response, canonicalize};
use crate::Error;

/// Sync tag that triggers the background-sync hook.
pub const BACKGROUND_SYNC_TAG: &str = "background-sync";

/// The two cache names owned by one worker version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheNames {
    pub static_cache: String,
    pub dynamic_cache: String,
}

impl CacheNames {
    pub fn new(static_prefix: &str, dynamic_prefix: &str, version: u32) -> Self {
        Self {
            static_cache: format!("{static_prefix}-v{version}"),
            dynamic_cache: format!("{dynamic_prefix}-v{version}"),
        }
    }

    pub fn current(&self) -> [&str; 2] {
        [&self.static_cache, &self.dynamic_cache]
    }

    pub fn is_current(&self, name: &str) -> bool {
        self.current().contains(&name)
    }
}

/// Result of one intercepted fetch.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub response: Response,
    pub source: ResponseSource,
    pub class: RequestClass,
}

pub struct ServiceWorker {
    state: Mutex<WorkerState>,
    names: CacheNames,
    caches: CacheStorage,
    fetcher: Arc<dyn Fetcher>,
    platform: Arc<dyn Platform>,
    policy: RoutePolicy,
    router: Router,
    precache: Vec<Request>,
    defaults: NotificationDefaults,
    /// Background work started by fetch handlers.
    background: ExtendableEvent,
}

impl std::fmt::Debug for ServiceWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceWorker")
            .field("state", &self.state())
            .field("names", &self.names)
            .finish_non_exhaustive()
    }
}

impl ServiceWorker {
    /// Build a worker for the configured version.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUrl` if the origin, root document or a precache
    /// entry is not a valid URL.
    pub fn new(
        config: &AppConfig, caches: CacheStorage, fetcher: Arc<dyn Fetcher>, platform: Arc<dyn Platform>,
    ) -> Result<Self, Error> {
        let origin = config.origin_url()?;
        let precache = config
            .precache
            .iter()
            .map(|entry| canonicalize(entry, &origin).map(Request::get))
            .collect::<Result<Vec<_>, _>>()?;
        let root_document = Request::get(canonicalize(&config.root_document, &origin)?);
        let names = config.cache_names();

        let router = Router {
            caches: caches.clone(),
            fetcher: Arc::clone(&fetcher),
            names: names.clone(),
            root_document,
        };

        Ok(Self {
            state: Mutex::new(WorkerState::Parsed),
            names,
            caches,
            fetcher,
            platform,
            policy: config.route_policy(),
            router,
            precache,
            defaults: NotificationDefaults { app_name: config.app_name.clone(), icon: config.notification_icon.clone() },
            background: ExtendableEvent::new(),
        })
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn cache_names(&self) -> &CacheNames {
        &self.names
    }

    pub fn caches(&self) -> &CacheStorage {
        &self.caches
    }

    pub fn precache(&self) -> &[Request] {
        &self.precache
    }

    pub fn classify(&self, request: &Request) -> RequestClass {
        self.policy.classify(request)
    }

    fn transition(&self, next: WorkerState) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !state.can_transition_to(next) {
            return Err(Error::InvalidState(format!("cannot move from {} to {next}", *state)));
        }
        tracing::info!(from = %*state, to = %next, "worker state changed");
        *state = next;
        Ok(())
    }

    /// Install handler: precache every manifest URL, then skip waiting.
    ///
    /// The receiver yields the number of entries written.
    pub fn on_install(&self, event: &ExtendableEvent) -> oneshot::Receiver<usize> {
        let (tx, rx) = oneshot::channel();
        let caches = self.caches.clone();
        let fetcher = Arc::clone(&self.fetcher);
        let platform = Arc::clone(&self.platform);
        let name = self.names.static_cache.clone();
        let requests = self.precache.clone();

        event.wait_until(async move {
            let written = caches.add_all(&name, fetcher.as_ref(), &requests).await?;
            tracing::info!(cache = %name, entries = written, "precached manifest");
            platform.skip_waiting().await?;
            let _ = tx.send(written);
            Ok(())
        });
        rx
    }

    /// Activate handler: drop every cache but the current two, claim clients,
    /// then record the activation so a later process can resume it.
    pub fn on_activate(&self, event: &ExtendableEvent) -> oneshot::Receiver<DeletionReport> {
        let (tx, rx) = oneshot::channel();
        let caches = self.caches.clone();
        let platform = Arc::clone(&self.platform);
        let names = self.names.clone();

        event.wait_until(async move {
            let report = caches.delete_all_except(&names.current()).await;
            platform.claim_clients().await?;
            let report = report?;
            if !report.is_clean() {
                tracing::warn!(failed = report.failed.len(), "some stale caches could not be deleted");
            }
            caches.mark_activated(&names.static_cache).await?;
            let _ = tx.send(report);
            Ok(())
        });
        rx
    }

    /// Fetch handler: route the request by class.
    pub fn on_fetch(&self, event: &mut FetchEvent) -> Result<RequestClass, Error> {
        let class = self.policy.classify(event.request());
        tracing::debug!(url = %event.request().url(), ?class, "routing fetch");

        let router = self.router.clone();
        let request = event.request().clone();
        let lifetime = event.lifetime();
        event.respond_with(async move { router.route(class, request, lifetime).await })?;
        Ok(class)
    }

    /// Push handler. Returns `None` when the payload does not describe a notification.
    pub fn on_push(&self, event: &ExtendableEvent, data: Option<&[u8]>) -> Option<oneshot::Receiver<NotificationId>> {
        let Some(payload) = PushPayload::parse(data) else {
            tracing::debug!("push without a usable payload; no notification");
            return None;
        };

        let notification = Notification::from_push(payload, &self.defaults);
        let platform = Arc::clone(&self.platform);
        let (tx, rx) = oneshot::channel();
        event.wait_until(async move {
            let id = platform.show_notification(notification).await?;
            let _ = tx.send(id);
            Ok(())
        });
        Some(rx)
    }

    /// Notification click handler: close it, and open its URL for the `open` action.
    pub fn on_notification_click(&self, event: &ExtendableEvent, id: NotificationId, action: Option<String>) {
        let platform = Arc::clone(&self.platform);
        event.wait_until(async move {
            let notification = platform.notification(id).await?;
            platform.close_notification(id).await?;

            let url = notification.and_then(|n| n.data);
            match (action.as_deref(), url) {
                (Some("open"), Some(url)) => platform.open_window(&url).await,
                _ => Ok(()),
            }
        });
    }

    /// Sync handler. Returns whether the tag was recognised.
    pub fn on_sync(&self, event: &ExtendableEvent, tag: &str) -> bool {
        if tag != BACKGROUND_SYNC_TAG {
            tracing::debug!(tag, "ignoring sync event");
            return false;
        }
        event.wait_until(async {
            tracing::info!("background sync triggered");
            Ok(())
        });
        true
    }

    /// Deliver the install event.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidState` unless the worker is freshly parsed, or
    /// the install failure; the worker is then redundant.
    pub async fn install(&self) -> Result<usize, Error> {
        self.transition(WorkerState::Installing)?;

        let event = ExtendableEvent::new();
        let written = self.on_install(&event);
        match event.settle().await {
            Ok(()) => {
                self.transition(WorkerState::Installed)?;
                written.await.map_err(|_| Error::InvalidState("install handler dropped its result".into()))
            }
            Err(e) => {
                tracing::warn!(error = %e, "install failed");
                self.transition(WorkerState::Redundant)?;
                Err(e)
            }
        }
    }

    /// Deliver the activate event.
    ///
    /// The worker ends activated even when cleanup fails; only failing to
    /// list the caches is returned as an error.
    pub async fn activate(&self) -> Result<DeletionReport, Error> {
        self.transition(WorkerState::Activating)?;

        let event = ExtendableEvent::new();
        let report = self.on_activate(&event);
        let settled = event.settle().await;
        self.transition(WorkerState::Activated)?;
        settled?;

        report.await.map_err(|_| Error::InvalidState("activate handler dropped its result".into()))
    }

    /// Install then activate.
    pub async fn start(&self) -> Result<DeletionReport, Error> {
        self.install().await?;
        self.activate().await
    }

    /// Pick up a worker a previous process already activated.
    ///
    /// Only a freshly parsed worker whose version has an activation on record
    /// goes straight to `Activated`; a version that failed to install or never
    /// activated stays parsed. Stale caches a previous cleanup could not remove
    /// are swept again. Returns whether the worker resumed.
    pub async fn resume(&self) -> Result<bool, Error> {
        if self.state() != WorkerState::Parsed || !self.caches.is_activated(&self.names.static_cache).await? {
            return Ok(false);
        }
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state != WorkerState::Parsed {
                return Ok(false);
            }
            tracing::info!(cache = %self.names.static_cache, "resuming activated worker");
            *state = WorkerState::Activated;
        }

        let report = self.caches.delete_all_except(&self.names.current()).await?;
        if !report.is_clean() {
            tracing::warn!(failed = report.failed.len(), "stale caches still present after resume");
        }
        Ok(true)
    }

    /// A new, parsed instance of the same version sharing storage, network and
    /// platform. Used to retry after this instance became redundant.
    pub fn successor(&self) -> Self {
        Self {
            state: Mutex::new(WorkerState::Parsed),
            names: self.names.clone(),
            caches: self.caches.clone(),
            fetcher: Arc::clone(&self.fetcher),
            platform: Arc::clone(&self.platform),
            policy: self.policy.clone(),
            router: self.router.clone(),
            precache: self.precache.clone(),
            defaults: self.defaults.clone(),
            background: ExtendableEvent::new(),
        }
    }

    /// Deliver a fetch event. Without an active worker the request goes
    /// straight to the network.
    pub async fn handle_fetch(&self, request: Request) -> Result<FetchOutcome, Error> {
        let class = self.policy.classify(&request);
        if !self.state().is_active() {
            let response = self.fetcher.fetch(&request).await?;
            return Ok(FetchOutcome { response, source: ResponseSource::Passthrough, class });
        }

        let mut event = FetchEvent::new(request, self.background.clone());
        let class = self.on_fetch(&mut event)?;
        let served = match event.into_parts() {
            (_, Some(response)) => response.await?,
            (request, None) => Served { response: self.fetcher.fetch(&request).await?, source: ResponseSource::Network },
        };
        Ok(FetchOutcome { response: served.response, source: served.source, class })
    }

    /// Deliver a push message. Returns the id of the notification shown, if any.
    pub async fn handle_push(&self, data: Option<&[u8]>) -> Result<Option<NotificationId>, Error> {
        let event = ExtendableEvent::new();
        let Some(shown) = self.on_push(&event, data) else {
            return Ok(None);
        };
        event.settle().await?;
        shown
            .await
            .map(Some)
            .map_err(|_| Error::InvalidState("push handler dropped its result".into()))
    }

    pub async fn handle_notification_click(&self, id: NotificationId, action: Option<String>) -> Result<(), Error> {
        let event = ExtendableEvent::new();
        self.on_notification_click(&event, id, action);
        event.settle().await
    }

    pub async fn handle_sync(&self, tag: &str) -> Result<bool, Error> {
        let event = ExtendableEvent::new();
        let handled = self.on_sync(&event, tag);
        event.settle().await?;
        Ok(handled)
    }

    /// Wait for background work started by earlier fetches.
    pub async fn drain(&self) -> Result<(), Error> {
        self.background.settle().await
    }
}
