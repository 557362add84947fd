//! Boolean differential injection
//!
//! Sends an always-true and an always-false expression through each input
//! and reports the inputs where only the true expression changes the page.

use crate::checks::{Check, CheckInfo};
use crate::core::auditor::Auditor;
use crate::core::rdiff::{BooleanPair, RdiffOptions};
use crate::element::ElementKind;
use crate::error::AuditError;
use crate::payload::options::{AuditOptions, Format};
use crate::reporting::model::{IssueFields, Severity};
use async_trait::async_trait;

const ELEMENTS: [ElementKind; 3] = [ElementKind::Link, ElementKind::Form, ElementKind::LinkTemplate];

#[derive(Debug, Clone)]
pub struct BooleanDifferential {
    pub pairs: Vec<BooleanPair>,
}

impl Default for BooleanDifferential {
    fn default() -> Self {
        Self {
            pairs: vec![
                BooleanPair::new(" AND 1=1", " AND 1=2"),
                BooleanPair::new("' AND '1'='1", "' AND '1'='2"),
                BooleanPair::new("\" AND \"1\"=\"1", "\" AND \"1\"=\"2"),
            ],
        }
    }
}

#[async_trait]
impl Check for BooleanDifferential {
    fn info(&self) -> CheckInfo {
        CheckInfo {
            name: "Boolean differential injection",
            shortname: "boolean",
            description: "Compares true, false and control responses for injected boolean expressions.",
            elements: ELEMENTS.to_vec(),
        }
    }

    async fn run(&self, auditor: &Auditor) -> Result<(), AuditError> {
        let options = RdiffOptions {
            pairs: self.pairs.clone(),
            thresholds: auditor.config().audit.rdiff,
            audit: AuditOptions::default()
                .with_format([Format::APPEND])
                .with_elements(ELEMENTS),
            ..RdiffOptions::default()
        };
        let fields = IssueFields {
            name: "Blind injection (boolean differential)".to_string(),
            description: "Appending an always-true expression to the input returns a different \
                          page than an always-false expression and the unmodified value."
                .to_string(),
            severity: Severity::High,
            cwe: Some("CWE-89".to_string()),
            ..IssueFields::default()
        };

        let found = auditor.rdiff_audit(&options, fields).await?;
        if found > 0 {
            tracing::warn!("{} boolean differential finding(s) on {}", found, auditor.page().url);
        }
        Ok(())
    }
}
