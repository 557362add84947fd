//! The seam between the audit engine and whatever actually talks to the target.

use crate::http::request::HttpRequest;
use crate::http::response::HttpResponse;
use async_trait::async_trait;
use std::sync::Arc;

/// Asynchronous request execution under a concurrency limit.
///
/// `submit` never fails: timeouts and connection errors come back as an
/// `HttpResponse` whose `outcome` says what happened.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn submit(&self, request: HttpRequest) -> HttpResponse;

    fn max_concurrency(&self) -> usize;

    fn set_max_concurrency(&self, limit: usize);
}

pub type SharedDispatcher = Arc<dyn Dispatcher>;
