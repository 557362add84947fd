use crate::http::response::HttpResponse;
use crate::validation::baseline::Baseline;

#[derive(Debug)]
pub struct DiffResult {
    pub status_changed: bool,
    pub body_len_delta: isize,
    pub body_changed: bool,
    /// Hamming distance between content signatures
    pub distance: u32,
}

pub fn diff(baseline: &Baseline, resp: &HttpResponse) -> DiffResult {
    diff_baselines(baseline, &Baseline::from_response(resp))
}

pub fn diff_baselines(a: &Baseline, b: &Baseline) -> DiffResult {
    DiffResult {
        status_changed: a.status != b.status,
        body_len_delta: b.body_len as isize - a.body_len as isize,
        body_changed: a.body_hash != b.body_hash,
        distance: a.signature.distance(&b.signature),
    }
}
