//! Server error fuzzing
//!
//! Throws malformed values at every input. A request that times out, or a
//! 5xx response that differs from the page as originally fetched, is
//! evidence that the input reaches code that does not expect it.

use crate::checks::{Check, CheckInfo};
use crate::core::auditor::Auditor;
use crate::element::ElementKind;
use crate::error::AuditError;
use crate::http::response::HttpResponse;
use crate::payload::loader::{load_payloads, PayloadSet};
use crate::payload::mutation::Mutation;
use crate::payload::options::{AuditOptions, Format};
use crate::reporting::model::{IssueFields, Severity};
use crate::validation::baseline::Baseline;
use crate::validation::diff::diff;
use crate::validation::verdict::evaluate;
use async_trait::async_trait;
use std::path::PathBuf;

const BUILTIN: &[&str] = &[
    "'",
    "\"",
    "\\",
    "`",
    "%",
    "%00",
    "{{",
    "${",
    "../../../../../../etc/passwd",
    "[]",
    "-1",
    "99999999999999999999",
];

#[derive(Debug, Default)]
pub struct ServerErrorFuzz {
    /// one payload per line; the builtin list is used when unset
    pub payload_file: Option<PathBuf>,
}

impl ServerErrorFuzz {
    pub fn with_payload_file(path: impl Into<PathBuf>) -> Self {
        Self {
            payload_file: Some(path.into()),
        }
    }

    fn payloads(&self) -> Result<PayloadSet, AuditError> {
        match self.payload_file {
            Some(ref path) => load_payloads(path).map_err(|e| {
                AuditError::config(format!("cannot load fuzz payloads from {}: {}", path.display(), e))
            }),
            None => Ok(PayloadSet::new("fuzz", BUILTIN.iter().copied())),
        }
    }

    fn inspect(auditor: &Auditor, baseline: &Baseline, response: &HttpResponse, mutation: &Mutation) {
        if response.timed_out() {
            let key = format!("timeout:{}:{}", mutation.element().action_key(), mutation.affected_input_name());
            if !auditor.audited(&key) {
                return;
            }
            let mut fields = fields("Unresponsive input", "The request timed out after a malformed value was sent.");
            fields.remarks.push(format!("Timed out after {}ms", response.elapsed_ms));
            fields.proof = Some(mutation.seed().to_string());
            if auditor.log(fields, mutation, response) {
                tracing::warn!("Request timed out: {}", mutation);
            }
            return;
        }

        if !response.is_completed() || response.status < 500 {
            return;
        }

        let verdict = evaluate(&diff(baseline, response));
        if baseline.status >= 500 && !verdict.interesting {
            return;
        }

        let key = format!("{}:{:016x}", response.status, response.signature().0);
        if !auditor.audited(&key) {
            return;
        }

        let mut fields = fields(
            "Server error",
            "The server answered a malformed value with an internal error.",
        );
        fields.remarks.push(format!(
            "Status {} (page returned {}), confidence {:.0}%",
            response.status,
            baseline.status,
            verdict.confidence * 100.0
        ));
        fields.proof = Some(mutation.seed().to_string());
        if auditor.log(fields, mutation, response) {
            tracing::warn!("Server error {}: {}", response.status, mutation);
        }
    }
}

fn fields(name: &str, description: &str) -> IssueFields {
    IssueFields {
        name: name.to_string(),
        description: description.to_string(),
        severity: Severity::Info,
        cwe: Some("CWE-20".to_string()),
        ..IssueFields::default()
    }
}

#[async_trait]
impl Check for ServerErrorFuzz {
    fn info(&self) -> CheckInfo {
        CheckInfo {
            name: "Server error fuzzing",
            shortname: "fuzz",
            description: "Sends malformed values and reports timeouts and new server errors.",
            elements: ElementKind::ALL.to_vec(),
        }
    }

    async fn run(&self, auditor: &Auditor) -> Result<(), AuditError> {
        let payloads = self.payloads()?;
        let baseline = Baseline::from_page(auditor.page());
        let options = AuditOptions::default().with_format([Format::STRAIGHT, Format::APPEND]);

        auditor
            .audit(&payloads, &options, |response, mutation| {
                Self::inspect(auditor, &baseline, response, mutation)
            })
            .await?;
        Ok(())
    }
}
