//! Blind timing injection
//!
//! Injects expressions that make the backend sleep for a chosen number of
//! seconds and confirms the delay with a control and a verification request.

use crate::checks::{Check, CheckInfo};
use crate::core::auditor::Auditor;
use crate::element::ElementKind;
use crate::error::AuditError;
use crate::payload::options::{AuditOptions, Format};
use crate::reporting::model::{IssueFields, Severity};
use async_trait::async_trait;

const ELEMENTS: [ElementKind; 4] = [
    ElementKind::Link,
    ElementKind::Form,
    ElementKind::Cookie,
    ElementKind::LinkTemplate,
];

#[derive(Debug, Clone)]
pub struct BlindTiming {
    pub templates: Vec<String>,
}

impl Default for BlindTiming {
    fn default() -> Self {
        Self {
            templates: [
                "sleep(__TIME__)",
                "' AND SLEEP(__TIME__)-- ",
                "1 AND SLEEP(__TIME__)",
                "'; SELECT pg_sleep(__TIME__)-- ",
                "; sleep __TIME__ #",
                "| sleep __TIME__ #",
            ]
            .iter()
            .map(|t| t.to_string())
            .collect(),
        }
    }
}

#[async_trait]
impl Check for BlindTiming {
    fn info(&self) -> CheckInfo {
        CheckInfo {
            name: "Blind timing injection",
            shortname: "timing",
            description: "Detects injected sleep expressions through verified response delays.",
            elements: ELEMENTS.to_vec(),
        }
    }

    async fn run(&self, auditor: &Auditor) -> Result<(), AuditError> {
        let options = AuditOptions::default()
            .with_format([Format::STRAIGHT, Format::APPEND])
            .with_elements(ELEMENTS);
        let fields = IssueFields {
            name: "Blind injection (timing)".to_string(),
            description: "An injected sleep expression delayed the response by the requested time, \
                          and a zero-delay control did not."
                .to_string(),
            severity: Severity::High,
            cwe: Some("CWE-94".to_string()),
            ..IssueFields::default()
        };

        let found = auditor.timing_attack_audit(&self.templates, &options, fields).await?;
        if found > 0 {
            tracing::warn!("{} timing finding(s) on {}", found, auditor.page().url);
        }
        Ok(())
    }
}
