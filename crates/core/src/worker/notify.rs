//! Push payloads, notifications and the platform services the worker signals.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Error;

pub type NotificationId = u64;

/// The JSON body a push message may carry. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PushPayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl PushPayload {
    /// Parse a raw push body. Absent, non-JSON and non-object bodies yield `None`.
    pub fn parse(data: Option<&[u8]>) -> Option<Self> {
        let value: serde_json::Value = serde_json::from_slice(data?).ok()?;
        if !value.is_object() {
            return None;
        }
        // Wrongly typed fields are dropped rather than rejecting the payload.
        let field = |name: &str| value.get(name).and_then(|v| v.as_str()).map(str::to_string);
        Some(Self { title: field("title"), body: field("body"), icon: field("icon"), url: field("url") })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Notification {
    pub title: String,
    pub body: Option<String>,
    pub icon: String,
    pub badge: String,
    /// URL opened by the `open` action.
    pub data: Option<String>,
    pub actions: Vec<NotificationAction>,
}

/// Fallbacks applied when a push payload omits a field.
#[derive(Debug, Clone)]
pub struct NotificationDefaults {
    pub app_name: String,
    pub icon: String,
}

impl Notification {
    pub fn from_push(payload: PushPayload, defaults: &NotificationDefaults) -> Self {
        Self {
            title: payload.title.unwrap_or_else(|| defaults.app_name.clone()),
            body: payload.body,
            icon: payload.icon.unwrap_or_else(|| defaults.icon.clone()),
            badge: defaults.icon.clone(),
            data: payload.url,
            actions: vec![
                NotificationAction { action: "open".into(), title: "Open".into(), icon: Some(defaults.icon.clone()) },
                NotificationAction { action: "close".into(), title: "Close".into(), icon: Some(defaults.icon.clone()) },
            ],
        }
    }
}

/// Browser services a worker can signal.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Activate without waiting for old clients to close.
    async fn skip_waiting(&self) -> Result<(), Error>;

    /// Take control of already-open clients.
    async fn claim_clients(&self) -> Result<(), Error>;

    async fn show_notification(&self, notification: Notification) -> Result<NotificationId, Error>;

    async fn close_notification(&self, id: NotificationId) -> Result<(), Error>;

    /// A notification still on screen.
    async fn notification(&self, id: NotificationId) -> Result<Option<Notification>, Error>;

    async fn open_window(&self, url: &str) -> Result<(), Error>;
}

/// Platform that keeps everything in memory and can be inspected.
#[derive(Debug, Default)]
pub struct InMemoryPlatform {
    skip_waiting: AtomicBool,
    claimed: AtomicBool,
    next_id: AtomicU64,
    shown: Mutex<BTreeMap<NotificationId, Notification>>,
    windows: Mutex<Vec<String>>,
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skip_waiting_called(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    pub fn clients_claimed(&self) -> bool {
        self.claimed.load(Ordering::SeqCst)
    }

    /// Notifications currently shown, oldest first.
    pub fn notifications(&self) -> Vec<(NotificationId, Notification)> {
        lock(&self.shown).iter().map(|(id, n)| (*id, n.clone())).collect()
    }

    pub fn opened_windows(&self) -> Vec<String> {
        lock(&self.windows).clone()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[async_trait]
impl Platform for InMemoryPlatform {
    async fn skip_waiting(&self) -> Result<(), Error> {
        self.skip_waiting.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn claim_clients(&self) -> Result<(), Error> {
        self.claimed.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn show_notification(&self, notification: Notification) -> Result<NotificationId, Error> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        lock(&self.shown).insert(id, notification);
        Ok(id)
    }

    async fn close_notification(&self, id: NotificationId) -> Result<(), Error> {
        lock(&self.shown).remove(&id).map(|_| ()).ok_or(Error::NotificationNotFound(id))
    }

    async fn notification(&self, id: NotificationId) -> Result<Option<Notification>, Error> {
        Ok(lock(&self.shown).get(&id).cloned())
    }

    async fn open_window(&self, url: &str) -> Result<(), Error> {
        lock(&self.windows).push(url.to_string());
        Ok(())
    }
}
