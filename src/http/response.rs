use crate::fingerprint::{normalize_body, ContentSignature};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use url::Url;

/// How a dispatched request ended. Failures are data, not errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Outcome {
    Completed,
    TimedOut,
    ConnectionFailed(String),
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub url: Url,
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body_len: usize,
    pub body_hash: String,
    pub body: Vec<u8>,
    pub elapsed_ms: u128,
    pub outcome: Outcome,
}

impl HttpResponse {
    pub fn new(
        url: Url,
        status: u16,
        headers: HashMap<String, String>,
        body: Vec<u8>,
        elapsed_ms: u128,
    ) -> Self {
        let body_hash = body_digest(&body);

        Self {
            url,
            status,
            headers,
            body_len: body.len(),
            body_hash,
            body,
            elapsed_ms,
            outcome: Outcome::Completed,
        }
    }

    /// A response stand-in for a request that never produced one.
    pub fn failed(url: Url, outcome: Outcome, elapsed_ms: u128) -> Self {
        let mut resp = Self::new(url, 0, HashMap::new(), Vec::new(), elapsed_ms);
        resp.outcome = outcome;
        resp
    }

    pub fn is_completed(&self) -> bool {
        self.outcome == Outcome::Completed
    }

    pub fn timed_out(&self) -> bool {
        self.outcome == Outcome::TimedOut
    }

    pub fn connection_failed(&self) -> bool {
        matches!(self.outcome, Outcome::ConnectionFailed(_))
    }

    /// Body decoded with the same normalization used for hashing.
    pub fn body_text(&self) -> String {
        normalize_body(&self.body)
    }

    pub fn signature(&self) -> ContentSignature {
        ContentSignature::of(&self.body)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Hex SHA-256 of a body.
pub fn body_digest(body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    format!("{:x}", hasher.finalize())
}
