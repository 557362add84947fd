use crate::element::Page;
use crate::fingerprint::ContentSignature;
use crate::http::response::HttpResponse;

/// What a "normal" response looked like, kept for later comparison.
#[derive(Clone, Debug)]
pub struct Baseline {
    pub status: u16,
    pub body_len: usize,
    pub body_hash: String,
    pub signature: ContentSignature,
    pub elapsed_ms: u128,
    pub completed: bool,
}

impl Baseline {
    pub fn from_response(resp: &HttpResponse) -> Self {
        Self {
            status: resp.status,
            body_len: resp.body_len,
            body_hash: resp.body_hash.clone(),
            signature: resp.signature(),
            elapsed_ms: resp.elapsed_ms,
            completed: resp.is_completed(),
        }
    }

    /// The page as it was fetched before any auditing.
    pub fn from_page(page: &Page) -> Self {
        let body = page.body.as_bytes();
        Self {
            status: page.status,
            body_len: body.len(),
            body_hash: crate::http::response::body_digest(body),
            signature: ContentSignature::of(body),
            elapsed_ms: 0,
            completed: true,
        }
    }
}
