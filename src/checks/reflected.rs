//! Reflected input
//!
//! Sends a unique, benign marker through every input and reports the inputs
//! whose marker comes back verbatim in the response body.

use crate::checks::{Check, CheckInfo};
use crate::core::auditor::Auditor;
use crate::element::ElementKind;
use crate::error::AuditError;
use crate::payload::loader::PayloadSet;
use crate::payload::options::{AuditOptions, Format};
use crate::reporting::model::{IssueFields, Severity};
use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;

const ELEMENTS: [ElementKind; 3] = [ElementKind::Link, ElementKind::Form, ElementKind::LinkTemplate];

pub struct ReflectedInput;

impl ReflectedInput {
    fn marker() -> String {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(10)
            .map(char::from)
            .collect();
        format!("gx{}", token.to_ascii_lowercase())
    }

    fn fields() -> IssueFields {
        IssueFields {
            name: "Reflected input".to_string(),
            description: "An input value is echoed back unencoded in the response body.".to_string(),
            severity: Severity::Low,
            cwe: Some("CWE-79".to_string()),
            references: vec!["https://owasp.org/www-community/attacks/xss/".to_string()],
            ..IssueFields::default()
        }
    }
}

#[async_trait]
impl Check for ReflectedInput {
    fn info(&self) -> CheckInfo {
        CheckInfo {
            name: "Reflected input",
            shortname: "reflected",
            description: "Looks for inputs echoed back in the response body.",
            elements: ELEMENTS.to_vec(),
        }
    }

    async fn run(&self, auditor: &Auditor) -> Result<(), AuditError> {
        let marker = Self::marker();
        let payloads = PayloadSet::new("reflected", [marker]);
        let options = AuditOptions::default()
            .with_format([Format::STRAIGHT])
            .with_elements(ELEMENTS);

        auditor
            .audit(&payloads, &options, |response, mutation| {
                if !response.is_completed() || !response.body_text().contains(mutation.seed()) {
                    return;
                }
                let mut fields = Self::fields();
                fields.proof = Some(mutation.seed().to_string());
                if auditor.log(fields, mutation, response) {
                    tracing::warn!("Reflected input: {}", mutation);
                }
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markers_are_unique_tokens() {
        let a = ReflectedInput::marker();
        let b = ReflectedInput::marker();
        assert_ne!(a, b);
        assert_eq!(a.len(), 12);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
