use crate::element::ElementKind;
use crate::fingerprint::persistent_hash_parts;
use crate::http::response::HttpResponse;
use crate::payload::mutation::{Mutation, MutationKind};
use serde::Serialize;

/// What a check knows about a finding; the rest is taken from the mutation.
#[derive(Debug, Clone, Default)]
pub struct IssueFields {
    pub name: String,
    pub description: String,
    pub severity: Severity,
    pub cwe: Option<String>,
    /// the piece of the response that proves the issue
    pub proof: Option<String>,
    pub remarks: Vec<String>,
    pub references: Vec<String>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Vector {
    pub kind: ElementKind,
    pub mutation: String,
    pub method: String,
    pub action: String,
    pub url: String,
    pub affected_input: String,
    pub seed: String,
}

impl Vector {
    pub fn from_mutation(mutation: &Mutation) -> Self {
        let element = mutation.element();
        let kind = match mutation.kind() {
            MutationKind::Carried => ElementKind::Cookie,
            _ => element.kind(),
        };
        Self {
            kind,
            mutation: mutation.kind().as_str().to_string(),
            method: element.method().to_string(),
            action: element.action_key(),
            url: element.to_request().url.to_string(),
            affected_input: mutation.affected_input_name().to_string(),
            seed: mutation.seed().to_string(),
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct Issue {
    pub name: String,
    pub check: String,
    pub description: String,
    pub severity: Severity,
    pub cwe: Option<String>,
    pub vector: Vector,
    pub status: Option<u16>,
    pub proof: Option<String>,
    pub remarks: Vec<String>,
    pub references: Vec<String>,
    /// stable across scans for the same check and injection point
    pub digest: String,
    /// how many times the same digest was logged
    pub variations: usize,
}

impl Issue {
    pub fn new(
        check: &str,
        fields: IssueFields,
        mutation: &Mutation,
        response: Option<&HttpResponse>,
    ) -> Self {
        let vector = Vector::from_mutation(mutation);
        let digest = issue_digest(check, &vector);
        Self {
            name: fields.name,
            check: check.to_string(),
            description: fields.description,
            severity: fields.severity,
            cwe: fields.cwe,
            vector,
            status: response.map(|r| r.status),
            proof: fields.proof,
            remarks: fields.remarks,
            references: fields.references,
            digest,
            variations: 1,
        }
    }
}

/// Hex digest over the check name and the identity of the injection point.
///
/// Payload, response and timing are not part of it: the same
/// weakness found with different payloads or in another scan collapses.
pub fn issue_digest(check: &str, vector: &Vector) -> String {
    let hash = persistent_hash_parts([
        check,
        vector.kind.as_str(),
        vector.method.as_str(),
        vector.action.as_str(),
        vector.affected_input.as_str(),
    ]);
    format!("{:016x}", hash)
}

#[derive(Debug, Serialize, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    #[default]
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Low => write!(f, "LOW"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::High => write!(f, "HIGH"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}
