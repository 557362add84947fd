//! Classification of response differences.
//!
//! `evaluate` scores a single response against a baseline; `classify` decides
//! a boolean-differential (rdiff) matrix from repeated true, false and control
//! samples.

use crate::validation::baseline::Baseline;
use crate::validation::diff::{diff_baselines, DiffResult};
use serde::{Deserialize, Serialize};

#[derive(Debug)]
pub struct Verdict {
    pub confidence: f32,
    pub interesting: bool,
}

pub fn evaluate(diff: &DiffResult) -> Verdict {
    let mut score: f32 = 0.0;

    if diff.status_changed {
        score += 0.4;
    }
    if diff.body_changed && diff.distance > 8 {
        score += 0.4;
    }
    if diff.body_len_delta.abs() > 100 {
        score += 0.2;
    }

    Verdict {
        confidence: score.min(1.0),
        interesting: score >= 0.6,
    }
}

/// Bit distances used when comparing rdiff cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RdiffThresholds {
    /// samples of the same case further apart than this make the input unstable
    pub max_noise_bits: u32,
    /// how far above the observed noise two cases must be to count as different
    pub margin_bits: u32,
}

impl Default for RdiffThresholds {
    fn default() -> Self {
        Self {
            max_noise_bits: 4,
            margin_bits: 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RdiffVerdict {
    Vulnerable,
    NotVulnerable,
    /// the evidence could not be trusted; carries the reason for debug logs
    Inconclusive(&'static str),
}

impl RdiffVerdict {
    pub fn is_vulnerable(&self) -> bool {
        matches!(self, RdiffVerdict::Vulnerable)
    }
}

/// The false case and the control are not required to match each other: a
/// true case that stands apart from two different pages is still vulnerable.
pub fn classify(
    trues: &[Baseline],
    falses: &[Baseline],
    controls: &[Baseline],
    thresholds: &RdiffThresholds,
) -> RdiffVerdict {
    if trues.is_empty() || falses.is_empty() || controls.is_empty() {
        return RdiffVerdict::Inconclusive("missing samples");
    }

    if trues.iter().chain(falses).chain(controls).any(|b| !b.completed) {
        return RdiffVerdict::Inconclusive("request did not complete");
    }

    let noise = [trues, falses, controls]
        .iter()
        .filter_map(|case| spread(case))
        .max()
        .unwrap_or(0);

    for case in [trues, falses, controls] {
        if case.iter().any(|b| b.status != case[0].status) {
            return RdiffVerdict::Inconclusive("status unstable across samples");
        }
    }
    if noise > thresholds.max_noise_bits {
        return RdiffVerdict::Inconclusive("content unstable across samples");
    }

    let required = noise + thresholds.margin_bits;
    let distinguishable = |other: &Baseline| {
        let d = diff_baselines(&trues[0], other);
        d.status_changed || (d.body_changed && d.distance > required)
    };

    if distinguishable(&falses[0]) && distinguishable(&controls[0]) {
        RdiffVerdict::Vulnerable
    } else {
        RdiffVerdict::NotVulnerable
    }
}

/// Largest pairwise signature distance within one case.
fn spread(case: &[Baseline]) -> Option<u32> {
    let mut max = None;
    for (i, a) in case.iter().enumerate() {
        for b in &case[i + 1..] {
            let d = a.signature.distance(&b.signature);
            max = Some(max.map_or(d, |m: u32| m.max(d)));
        }
    }
    max
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::response::{HttpResponse, Outcome};
    use std::collections::HashMap;
    use url::Url;

    fn sample(status: u16, body: &str) -> Baseline {
        Baseline::from_response(&HttpResponse::new(
            Url::parse("http://example.com/").unwrap(),
            status,
            HashMap::new(),
            body.as_bytes().to_vec(),
            3,
        ))
    }

    fn samples(status: u16, body: &str, n: usize) -> Vec<Baseline> {
        (0..n).map(|_| sample(status, body)).collect()
    }

    #[test]
    fn test_distinct_true_case_is_vulnerable() {
        let verdict = classify(
            &samples(200, "1 item found", 2),
            &samples(200, "Could not find any results", 2),
            &samples(200, "No idea what you want", 2),
            &RdiffThresholds::default(),
        );
        assert_eq!(verdict, RdiffVerdict::Vulnerable);
    }

    #[test]
    fn test_identical_cases_are_not_vulnerable() {
        let body = "No idea what you want";
        let verdict = classify(
            &samples(200, body, 2),
            &samples(200, body, 2),
            &samples(200, body, 2),
            &RdiffThresholds::default(),
        );
        assert_eq!(verdict, RdiffVerdict::NotVulnerable);
    }

    #[test]
    fn test_true_equal_to_control_is_not_vulnerable() {
        let verdict = classify(
            &samples(200, "1 item found", 2),
            &samples(200, "Could not find any results", 2),
            &samples(200, "1 item found", 2),
            &RdiffThresholds::default(),
        );
        assert_eq!(verdict, RdiffVerdict::NotVulnerable);
    }

    #[test]
    fn test_status_change_is_distinguishable() {
        let verdict = classify(
            &samples(200, "ok", 1),
            &samples(404, "ok", 1),
            &samples(500, "ok", 1),
            &RdiffThresholds::default(),
        );
        assert!(verdict.is_vulnerable());
    }

    #[test]
    fn test_unstable_case_is_inconclusive() {
        let trues = vec![
            sample(200, "1 item found"),
            sample(200, "Could not find any results"),
        ];
        let verdict = classify(
            &trues,
            &samples(200, "Could not find any results", 2),
            &samples(200, "No idea what you want", 2),
            &RdiffThresholds::default(),
        );
        assert!(matches!(verdict, RdiffVerdict::Inconclusive(_)));
    }

    #[test]
    fn test_failed_request_is_inconclusive() {
        let failed = Baseline::from_response(&HttpResponse::failed(
            Url::parse("http://example.com/").unwrap(),
            Outcome::TimedOut,
            10_000,
        ));
        let verdict = classify(
            &[failed],
            &samples(200, "b", 1),
            &samples(200, "c", 1),
            &RdiffThresholds::default(),
        );
        assert!(matches!(verdict, RdiffVerdict::Inconclusive(_)));
    }

    #[test]
    fn test_evaluate_scores_server_errors() {
        let base = sample(200, "welcome to the shop");
        let d = diff_baselines(&base, &sample(500, "welcome to the shop"));
        let v = evaluate(&d);
        assert!(!v.interesting);
        assert!((v.confidence - 0.4).abs() < f32::EPSILON);
    }
}
