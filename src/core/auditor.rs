//! The surface a check sees while it runs against one page.

use crate::core::config::ScanConfig;
use crate::core::engine::{AuditEngine, AuditSummary};
use crate::core::rdiff::RdiffOptions;
use crate::element::Page;
use crate::error::Result;
use crate::http::response::HttpResponse;
use crate::lookup::{Lookup, LookupSet};
use crate::payload::loader::PayloadSet;
use crate::payload::mutation::Mutation;
use crate::payload::options::AuditOptions;
use crate::reporting::model::{Issue, IssueFields};
use parking_lot::Mutex;
use std::sync::Arc;

pub struct Auditor {
    engine: AuditEngine,
    check: String,
    page: Arc<Page>,
    audited: Mutex<LookupSet>,
}

impl Auditor {
    pub fn new(engine: AuditEngine, check: &str, page: Arc<Page>) -> Self {
        Self {
            engine,
            check: check.to_string(),
            page,
            audited: Mutex::new(LookupSet::new()),
        }
    }

    pub fn check(&self) -> &str {
        &self.check
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn config(&self) -> &ScanConfig {
        &self.engine.context().config
    }

    pub async fn audit<F>(
        &self,
        payloads: &PayloadSet,
        options: &AuditOptions,
        on_response: F,
    ) -> Result<AuditSummary>
    where
        F: FnMut(&HttpResponse, &Mutation) + Send,
    {
        self.engine.audit(&self.page, payloads, options, on_response).await
    }

    /// Runs a timing audit and logs one issue per confirmed input.
    pub async fn timing_attack_audit(
        &self,
        templates: &[String],
        options: &AuditOptions,
        fields: IssueFields,
    ) -> Result<usize> {
        let timing = self.config().audit.timing.clone();
        let found = self
            .engine
            .timing_attack_audit(&self.page, templates, options, &timing)
            .await?;

        for m in &found {
            let mut fields = fields.clone();
            fields.remarks.push(format!(
                "Control request answered in {}ms; {} verification request(s) with a {}ms delay averaged {:.0}ms",
                m.control_ms,
                m.verification.samples.len(),
                m.verification_delay_ms,
                m.verification.mean
            ));
            fields.proof = Some(m.template.clone());
            self.log(fields, &m.mutation, &m.response);
        }
        Ok(found.len())
    }

    /// Runs a boolean differential audit and logs one issue per vulnerable input.
    pub async fn rdiff_audit(&self, options: &RdiffOptions, fields: IssueFields) -> Result<usize> {
        let found = self.engine.rdiff_audit(&self.page, options).await?;

        for m in &found {
            let mut fields = fields.clone();
            fields.remarks.push(format!(
                "True expression {:?} differs from false expression {:?} and from the control",
                m.pair.true_payload, m.pair.false_payload
            ));
            self.log(fields, &m.mutation, &m.response);
        }
        Ok(found.len())
    }

    /// Records an issue backed by a response.
    pub fn log(&self, fields: IssueFields, mutation: &Mutation, response: &HttpResponse) -> bool {
        self.log_issue(Issue::new(&self.check, fields, mutation, Some(response)))
    }

    pub fn log_issue(&self, issue: Issue) -> bool {
        self.engine.context().issues.log(issue)
    }

    /// Check-local dedup hook; true the first time `key` is seen.
    pub fn audited(&self, key: &str) -> bool {
        self.audited.lock().insert_key(key)
    }

    pub fn is_audited(&self, key: &str) -> bool {
        self.audited.lock().contains_key(key)
    }
}
