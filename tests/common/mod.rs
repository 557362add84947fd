//! In-memory target for integration tests.
//!
//! `FakeTarget` records every request and answers it with a scripted
//! response. Elapsed time is simulated, never slept, and a request whose
//! simulated time exceeds its timeout comes back as `TimedOut`.

#![allow(dead_code)]

use async_trait::async_trait;
use gauntlet::core::config::ScanConfig;
use gauntlet::core::{AuditEngine, ScanContext};
use gauntlet::http::{Dispatcher, HttpRequest, HttpResponse, Outcome};
use parking_lot::Mutex;
use regex::Regex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use url::Url;

pub struct Reply {
    pub status: u16,
    pub body: String,
    pub elapsed_ms: u128,
    pub outcome: Outcome,
    /// never answers
    pub hang: bool,
}

impl Reply {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            elapsed_ms: 5,
            outcome: Outcome::Completed,
            hang: false,
        }
    }

    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn after(mut self, elapsed_ms: u128) -> Self {
        self.elapsed_ms = elapsed_ms;
        self
    }

    pub fn timed_out() -> Self {
        Self {
            status: 0,
            body: String::new(),
            elapsed_ms: 10_000,
            outcome: Outcome::TimedOut,
            hang: false,
        }
    }

    pub fn hang() -> Self {
        Self {
            hang: true,
            ..Self::ok("")
        }
    }
}

type Script = Box<dyn Fn(&HttpRequest) -> Reply + Send + Sync>;

pub struct FakeTarget {
    script: Script,
    requests: Mutex<Vec<HttpRequest>>,
    limit: AtomicUsize,
}

impl FakeTarget {
    pub fn new<F>(script: F) -> Arc<Self>
    where
        F: Fn(&HttpRequest) -> Reply + Send + Sync + 'static,
    {
        Arc::new(Self {
            script: Box::new(script),
            requests: Mutex::new(Vec::new()),
            limit: AtomicUsize::new(4),
        })
    }

    /// Answers "ok" to everything.
    pub fn static_page(body: &'static str) -> Arc<Self> {
        Self::new(move |_| Reply::ok(body))
    }

    /// Takes `N` seconds for any query value containing `sleep(N)`.
    pub fn sleepy(base_ms: u128) -> Arc<Self> {
        let sleep = Regex::new(r"sleep\((\d+(?:\.\d+)?)\)").unwrap();
        Self::new(move |req| {
            let delay: f64 = query_values(req)
                .iter()
                .filter_map(|v| sleep.captures(v))
                .filter_map(|c| c[1].parse::<f64>().ok())
                .sum();
            Reply::ok("ok").after(base_ms + (delay * 1000.0) as u128)
        })
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl Dispatcher for FakeTarget {
    async fn submit(&self, request: HttpRequest) -> HttpResponse {
        self.requests.lock().push(request.clone());
        let reply = (self.script)(&request);
        if reply.hang {
            futures::future::pending::<()>().await;
        }

        if let Some(timeout) = request.timeout {
            if reply.elapsed_ms > timeout.as_millis() {
                return HttpResponse::failed(request.url, Outcome::TimedOut, timeout.as_millis());
            }
        }
        if reply.outcome != Outcome::Completed {
            return HttpResponse::failed(request.url, reply.outcome, reply.elapsed_ms);
        }

        // yield so responses can complete out of order
        tokio::task::yield_now().await;
        HttpResponse::new(
            request.url,
            reply.status,
            HashMap::new(),
            reply.body.into_bytes(),
            reply.elapsed_ms,
        )
    }

    fn max_concurrency(&self) -> usize {
        self.limit.load(Ordering::SeqCst)
    }

    fn set_max_concurrency(&self, limit: usize) {
        self.limit.store(limit.max(1), Ordering::SeqCst);
    }
}

pub fn query_values(req: &HttpRequest) -> Vec<String> {
    req.url.query_pairs().map(|(_, v)| v.into_owned()).collect()
}

pub fn query_value(req: &HttpRequest, name: &str) -> Option<String> {
    req.url
        .query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

pub fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

pub fn engine_with(target: Arc<FakeTarget>, config: ScanConfig) -> AuditEngine {
    let ctx = Arc::new(ScanContext::new(url("http://example.com/"), config).unwrap());
    AuditEngine::new(ctx, target)
}

pub fn engine(target: Arc<FakeTarget>) -> AuditEngine {
    engine_with(target, ScanConfig::default())
}
