//! Stable hashes for dedup keys, issue digests and near-duplicate responses.
//!
//! `std::hash` is randomly seeded per process, which makes it useless for
//! anything that gets serialized or compared across scans. Everything in here
//! is derived from SHA-256 instead, so the same logical content produces the
//! same number on every run and every machine.

use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Width of a content signature in bits.
pub const SIGNATURE_BITS: u32 = 64;

/// Deterministic 64-bit hash of a string.
pub fn persistent_hash(value: &str) -> u64 {
    persistent_hash_bytes(value.as_bytes())
}

pub fn persistent_hash_bytes(bytes: &[u8]) -> u64 {
    let digest = Sha256::digest(bytes);
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(head)
}

/// Hash of several parts, unambiguous with respect to where one part ends.
pub fn persistent_hash_parts<I, S>(parts: I) -> u64
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut hasher = Sha256::new();
    for part in parts {
        let part = part.as_ref();
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part.as_bytes());
    }
    let digest = hasher.finalize();
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(head)
}

/// Decode a response body into a single representation before hashing.
///
/// Valid UTF-8 is taken as is; anything else is read as Latin-1 so that every
/// byte maps to exactly one char and ASCII content hashes identically either way.
pub fn normalize_body(body: &[u8]) -> String {
    match std::str::from_utf8(body) {
        Ok(text) => text.to_string(),
        Err(_) => body.iter().map(|&b| b as char).collect(),
    }
}

/// Locality sensitive signature of a response body (simhash over word tokens).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentSignature(pub u64);

impl ContentSignature {
    pub fn of(body: &[u8]) -> Self {
        content_signature(body)
    }

    pub fn distance(&self, other: &ContentSignature) -> u32 {
        (self.0 ^ other.0).count_ones()
    }

    /// 1.0 for identical signatures, 0.0 for complementary ones.
    pub fn similarity(&self, other: &ContentSignature) -> f64 {
        1.0 - self.distance(other) as f64 / SIGNATURE_BITS as f64
    }
}

pub fn content_signature(body: &[u8]) -> ContentSignature {
    let text = normalize_body(body).to_lowercase();

    let mut weights: HashMap<&str, i64> = HashMap::new();
    for token in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        *weights.entry(token).or_insert(0) += 1;
    }

    if weights.is_empty() {
        return ContentSignature(0);
    }

    let mut columns = [0i64; SIGNATURE_BITS as usize];
    for (token, weight) in weights {
        let hash = persistent_hash(token);
        for (bit, column) in columns.iter_mut().enumerate() {
            if hash & (1u64 << bit) != 0 {
                *column += weight;
            } else {
                *column -= weight;
            }
        }
    }

    let mut signature = 0u64;
    for (bit, column) in columns.iter().enumerate() {
        if *column > 0 {
            signature |= 1u64 << bit;
        }
    }
    ContentSignature(signature)
}
