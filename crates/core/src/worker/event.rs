//! Extendable events: the "keep me alive until this settles" contract.
//!
//! A handler calls [`ExtendableEvent::wait_until`] for every piece of async
//! work its event depends on. The work starts immediately on the tokio
//! runtime; the dispatcher later calls [`ExtendableEvent::settle`] to wait for
//! all of it. Tasks registered while settling are waited for too.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::join_all;
use tokio::task::JoinHandle;

use crate::Error;
use crate::http::Request;

use super::strategy::Served;

/// Response future registered by `respond_with`.
pub type ResponseFuture = Pin<Box<dyn Future<Output = Result<Served, Error>> + Send + 'static>>;

#[derive(Default)]
struct Lifetime {
    tasks: Mutex<Vec<JoinHandle<()>>>,
    failures: Mutex<Vec<Error>>,
}

/// Handle to an event's extended lifetime. Clones share the same task set.
#[derive(Clone, Default)]
pub struct ExtendableEvent {
    inner: Arc<Lifetime>,
}

impl std::fmt::Debug for ExtendableEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtendableEvent").field("pending", &self.pending()).finish()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ExtendableEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep the event alive until `task` settles.
    pub fn wait_until<F>(&self, task: F)
    where
        F: Future<Output = Result<(), Error>> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            if let Err(e) = task.await {
                lock(&inner.failures).push(e);
            }
        });

        let mut tasks = lock(&self.inner.tasks);
        tasks.retain(|h| !h.is_finished());
        tasks.push(handle);
    }

    /// Number of registered tasks still running.
    pub fn pending(&self) -> usize {
        lock(&self.inner.tasks).iter().filter(|h| !h.is_finished()).count()
    }

    /// Wait for every registered task.
    ///
    /// All tasks run to completion regardless of failures. Returns the first
    /// failure; later ones are logged.
    pub async fn settle(&self) -> Result<(), Error> {
        loop {
            let batch = std::mem::take(&mut *lock(&self.inner.tasks));
            if batch.is_empty() {
                break;
            }
            for joined in join_all(batch).await {
                if let Err(e) = joined {
                    lock(&self.inner.failures).push(Error::InvalidState(format!("event task aborted: {e}")));
                }
            }
        }

        let mut failures = std::mem::take(&mut *lock(&self.inner.failures)).into_iter();
        match failures.next() {
            None => Ok(()),
            Some(first) => {
                for extra in failures {
                    tracing::warn!(error = %extra, "additional event task failure");
                }
                Err(first)
            }
        }
    }
}

/// A fetch intercepted by the worker.
pub struct FetchEvent {
    request: Request,
    lifetime: ExtendableEvent,
    response: Option<ResponseFuture>,
}

impl FetchEvent {
    pub fn new(request: Request, lifetime: ExtendableEvent) -> Self {
        Self { request, lifetime, response: None }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Provide the response. May be called once per event.
    pub fn respond_with<F>(&mut self, response: F) -> Result<(), Error>
    where
        F: Future<Output = Result<Served, Error>> + Send + 'static,
    {
        if self.response.is_some() {
            return Err(Error::InvalidState("respond_with called twice".into()));
        }
        self.response = Some(Box::pin(response));
        Ok(())
    }

    /// Lifetime handle for background work that must outlive the response.
    pub fn lifetime(&self) -> ExtendableEvent {
        self.lifetime.clone()
    }

    pub(crate) fn into_parts(self) -> (Request, Option<ResponseFuture>) {
        (self.request, self.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Response;
    use crate::testing::get;
    use crate::worker::ResponseSource;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_settle_waits_for_all_tasks() {
        let event = ExtendableEvent::new();
        let done = Arc::new(AtomicUsize::new(0));
        for delay in [30u64, 10, 20] {
            let done = Arc::clone(&done);
            event.wait_until(async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                done.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        event.settle().await.unwrap();
        assert_eq!(done.load(Ordering::SeqCst), 3);
        assert_eq!(event.pending(), 0);
    }

    #[tokio::test]
    async fn test_settle_does_not_short_circuit() {
        let event = ExtendableEvent::new();
        let done = Arc::new(AtomicUsize::new(0));
        event.wait_until(async { Err(Error::Storage("first".into())) });
        let counter = Arc::clone(&done);
        event.wait_until(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let result = event.settle().await;
        assert!(matches!(result, Err(Error::Storage(msg)) if msg == "first"));
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_tasks_registered_during_settle_are_awaited() {
        let event = ExtendableEvent::new();
        let done = Arc::new(AtomicUsize::new(0));
        let inner_event = event.clone();
        let counter = Arc::clone(&done);
        event.wait_until(async move {
            inner_event.wait_until(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
            Ok(())
        });

        event.settle().await.unwrap();
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_settle_empty_event() {
        assert!(ExtendableEvent::new().settle().await.is_ok());
    }

    #[tokio::test]
    async fn test_respond_with_once() {
        let mut event = FetchEvent::new(get("/"), ExtendableEvent::new());

        let served = || async { Ok::<_, Error>(Served { response: Response::new(200, "a"), source: ResponseSource::Network }) };
        event.respond_with(served()).unwrap();
        assert!(event.respond_with(served()).is_err());

        let (_, response) = event.into_parts();
        let served = response.unwrap().await.unwrap();
        assert_eq!(served.response.text(), "a");
    }
}
