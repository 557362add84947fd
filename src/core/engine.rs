//! Audit engine
//!
//! Turns a page plus a payload set into dispatched requests. Every mutation
//! goes through the same gate before it may touch the network:
//!
//! `Generated -> scope -> coverage dedup -> dispatched -> response`
//!
//! A mutation stopped at the gate produces no traffic and no callback.
//! Responses are handed back in completion order, not generation order.

use crate::core::context::ScanContext;
use crate::core::scope::CounterMode;
use crate::element::{Element, Page};
use crate::error::Result;
use crate::http::dispatch::SharedDispatcher;
use crate::http::response::HttpResponse;
use crate::payload::iterator::mutations;
use crate::payload::loader::PayloadSet;
use crate::payload::mutation::Mutation;
use crate::payload::options::AuditOptions;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;

/// Where a mutation stopped on its way to the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Aborted,
    OutOfScope,
    Duplicate,
    Admitted,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuditSummary {
    pub generated: usize,
    pub out_of_scope: usize,
    pub duplicate: usize,
    pub dispatched: usize,
    pub timed_out: usize,
    pub failed: usize,
    pub aborted: bool,
}

impl AuditSummary {
    fn record(&mut self, response: &HttpResponse) {
        if response.timed_out() {
            self.timed_out += 1;
        } else if response.connection_failed() {
            self.failed += 1;
        }
    }
}

#[derive(Clone)]
pub struct AuditEngine {
    ctx: Arc<ScanContext>,
    dispatcher: SharedDispatcher,
}

impl AuditEngine {
    pub fn new(ctx: Arc<ScanContext>, dispatcher: SharedDispatcher) -> Self {
        Self { ctx, dispatcher }
    }

    pub fn context(&self) -> &Arc<ScanContext> {
        &self.ctx
    }

    pub fn dispatcher(&self) -> &SharedDispatcher {
        &self.dispatcher
    }

    /// Scope and coverage gate. Admitting a mutation records its coverage.
    pub fn admit(&self, mutation: &Mutation, force: bool) -> Admission {
        self.admit_keyed(mutation, mutation.coverage_hash(), force)
    }

    pub(crate) fn admit_keyed(&self, mutation: &Mutation, coverage: u64, force: bool) -> Admission {
        if self.ctx.is_aborted() {
            return Admission::Aborted;
        }
        if let Err(reason) = self
            .ctx
            .scope
            .check(mutation.element().action(), CounterMode::ReadOnly)
        {
            tracing::trace!("Skipping {}: {}", mutation, reason);
            return Admission::OutOfScope;
        }
        let new = self.ctx.mark_covered(coverage);
        if !new && !force {
            return Admission::Duplicate;
        }
        Admission::Admitted
    }

    /// Audit every eligible element of `page` with `payloads`.
    ///
    /// `on_response` runs exactly once per dispatched request, including
    /// requests that timed out or failed to connect.
    pub async fn audit<F>(
        &self,
        page: &Page,
        payloads: &PayloadSet,
        options: &AuditOptions,
        mut on_response: F,
    ) -> Result<AuditSummary>
    where
        F: FnMut(&HttpResponse, &Mutation) + Send,
    {
        options.validate()?;
        payloads.validate()?;

        let window = self.dispatcher.max_concurrency().max(1) * 2;
        let mut summary = AuditSummary::default();
        let mut seen_elements = HashSet::new();
        let mut in_flight: FuturesUnordered<BoxFuture<'static, (HttpResponse, Mutation)>> =
            FuturesUnordered::new();

        'elements: for element in page.elements() {
            if !options.covers(element.kind()) || !seen_elements.insert(element.identity()) {
                continue;
            }

            for mutation in mutations(element, payloads, options) {
                for candidate in expand(mutation, page, options) {
                    summary.generated += 1;

                    match self.admit(&candidate, options.force) {
                        Admission::Aborted => {
                            summary.aborted = true;
                            break 'elements;
                        }
                        Admission::OutOfScope => summary.out_of_scope += 1,
                        Admission::Duplicate => summary.duplicate += 1,
                        Admission::Admitted => {
                            while in_flight.len() >= window {
                                if let Some((response, done)) = in_flight.next().await {
                                    summary.record(&response);
                                    on_response(&response, &done);
                                }
                            }

                            let request = candidate.to_request(&options.submit);
                            let dispatcher = Arc::clone(&self.dispatcher);
                            in_flight.push(Box::pin(async move {
                                let response = dispatcher.submit(request).await;
                                (response, candidate)
                            }));
                            summary.dispatched += 1;
                        }
                    }
                }
            }
        }

        while let Some((response, done)) = in_flight.next().await {
            summary.record(&response);
            on_response(&response, &done);
        }

        tracing::debug!(
            "Audited {} with '{}': {} generated, {} sent, {} duplicate, {} out of scope",
            page.url,
            payloads.name(),
            summary.generated,
            summary.dispatched,
            summary.duplicate,
            summary.out_of_scope
        );

        Ok(summary)
    }

    /// Sends a mutation outside the coverage gate. Used by verification
    /// phases, where repeating a request is the point.
    pub(crate) async fn submit(&self, mutation: &Mutation, options: &AuditOptions) -> HttpResponse {
        self.dispatcher.submit(mutation.to_request(&options.submit)).await
    }

    /// Elements of `page` the options select, once per identity.
    pub(crate) fn eligible<'a>(&self, page: &'a Page, options: &AuditOptions) -> Vec<&'a Element> {
        let mut seen = HashSet::new();
        page.elements()
            .iter()
            .filter(|e| options.covers(e.kind()) && seen.insert(e.identity()))
            .collect()
    }
}

/// The generated mutation plus whatever `each_mutation` and cookie
/// propagation derive from it.
fn expand(mutation: Mutation, page: &Page, options: &AuditOptions) -> Vec<Mutation> {
    let mut expanded = Vec::with_capacity(1);

    if let Some(ref each) = options.each_mutation {
        expanded.extend(each(&mutation));
    }

    if options.extensively {
        for carrier in page.links().into_iter().chain(page.forms()) {
            if let Some(carried) = mutation.carried_by(carrier) {
                expanded.push(carried);
            }
        }
    }

    expanded.insert(0, mutation);
    expanded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ScanConfig;
    use crate::http::dispatch::Dispatcher;
    use crate::http::request::HttpRequest;
    use crate::payload::options::Format;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use url::Url;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Dispatcher for Recorder {
        async fn submit(&self, request: HttpRequest) -> HttpResponse {
            self.seen.lock().push(request.url.to_string());
            HttpResponse::new(request.url, 200, HashMap::new(), b"ok".to_vec(), 1)
        }

        fn max_concurrency(&self) -> usize {
            2
        }

        fn set_max_concurrency(&self, _limit: usize) {}
    }

    fn engine() -> (AuditEngine, Arc<Recorder>) {
        let seed = Url::parse("http://example.com/").unwrap();
        let ctx = Arc::new(ScanContext::new(seed, ScanConfig::default()).unwrap());
        let recorder = Arc::new(Recorder::default());
        (AuditEngine::new(ctx, recorder.clone()), recorder)
    }

    fn page() -> Page {
        let url = Url::parse("http://example.com/list?a=1&b=2").unwrap();
        Page::new(url.clone(), vec![Element::link(&url)])
    }

    #[tokio::test]
    async fn test_window_larger_than_work() {
        let (engine, recorder) = engine();
        let payloads = PayloadSet::new("p", ["1", "2", "3", "4", "5"]);
        let options = AuditOptions::default().with_format([Format::STRAIGHT]);

        let mut calls = 0;
        let summary = engine
            .audit(&page(), &payloads, &options, |_, _| calls += 1)
            .await
            .unwrap();

        assert_eq!(summary.dispatched, 10);
        assert_eq!(calls, 10);
        assert_eq!(recorder.seen.lock().len(), 10);
    }

    #[tokio::test]
    async fn test_each_mutation_adds_variants() {
        let (engine, _) = engine();
        let payloads = PayloadSet::new("p", ["x"]);
        let options = AuditOptions {
            format: vec![Format::STRAIGHT],
            each_mutation: Some(Arc::new(|m: &Mutation| -> Vec<Mutation> {
                m.reseed("y").into_iter().collect()
            })),
            ..Default::default()
        };

        let mut seeds = Vec::new();
        engine
            .audit(&page(), &payloads, &options, |_, m| seeds.push(m.seed().to_string()))
            .await
            .unwrap();

        seeds.sort();
        assert_eq!(seeds, vec!["x", "x", "y", "y"]);
    }

    #[tokio::test]
    async fn test_element_kind_filter() {
        let (engine, recorder) = engine();
        let payloads = PayloadSet::new("p", ["x"]);
        let options = AuditOptions::default().with_elements([crate::element::ElementKind::Form]);

        let summary = engine.audit(&page(), &payloads, &options, |_, _| {}).await.unwrap();
        assert_eq!(summary.generated, 0);
        assert!(recorder.seen.lock().is_empty());
    }
}
