//! Network seam used by the worker.

use async_trait::async_trait;

use crate::Error;
use crate::http::{Request, Response};

/// Performs a network request.
///
/// Any HTTP status is a response. An `Err` means the request never produced
/// a response (offline, DNS failure, reset, timeout).
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}
