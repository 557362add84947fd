//! Response differential (boolean) detection
//!
//! For every input, a true expression, a false expression and a control
//! value are each sent `samples` times. All samples of one input are in
//! flight together and the verdict waits for all of them, bounded by the
//! barrier timeout.

use crate::core::engine::{Admission, AuditEngine};
use crate::element::Page;
use crate::error::{AuditError, Result};
use crate::fingerprint::persistent_hash_parts;
use crate::http::response::HttpResponse;
use crate::payload::iterator::mutations;
use crate::payload::loader::PayloadSet;
use crate::payload::mutation::Mutation;
use crate::payload::options::AuditOptions;
use crate::validation::baseline::Baseline;
use crate::validation::verdict::{classify, RdiffThresholds, RdiffVerdict};
use futures::future::join_all;
use std::collections::HashSet;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BooleanPair {
    pub true_payload: String,
    pub false_payload: String,
}

impl BooleanPair {
    pub fn new(true_payload: impl Into<String>, false_payload: impl Into<String>) -> Self {
        Self {
            true_payload: true_payload.into(),
            false_payload: false_payload.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RdiffOptions {
    pub pairs: Vec<BooleanPair>,
    /// value sent as the control; the input's original value when `None`
    pub control: Option<String>,
    pub samples: usize,
    pub thresholds: RdiffThresholds,
    pub barrier_timeout: Duration,
    pub audit: AuditOptions,
}

impl Default for RdiffOptions {
    fn default() -> Self {
        Self {
            pairs: Vec::new(),
            control: None,
            samples: 2,
            thresholds: RdiffThresholds::default(),
            barrier_timeout: Duration::from_secs(60),
            audit: AuditOptions::default(),
        }
    }
}

impl RdiffOptions {
    pub fn validate(&self) -> Result<()> {
        if self.pairs.is_empty() {
            return Err(AuditError::config("rdiff needs at least one true/false pair"));
        }
        if self.samples == 0 {
            return Err(AuditError::config("rdiff samples must be at least 1"));
        }
        self.audit.validate()
    }
}

#[derive(Debug, Clone)]
pub struct RdiffMatch {
    pub mutation: Mutation,
    pub pair: BooleanPair,
    /// one of the true-case responses
    pub response: HttpResponse,
}

impl AuditEngine {
    pub async fn rdiff_audit(&self, page: &Page, options: &RdiffOptions) -> Result<Vec<RdiffMatch>> {
        options.validate()?;

        let mut confirmed: HashSet<(u64, String)> = HashSet::new();
        let mut matches = Vec::new();

        for pair in &options.pairs {
            let trues = PayloadSet::new("rdiff", [pair.true_payload.clone()]);

            for element in self.eligible(page, &options.audit) {
                for mutation in mutations(element, &trues, &options.audit) {
                    let key = (element.identity(), mutation.affected_input_name().to_string());
                    if confirmed.contains(&key) {
                        continue;
                    }

                    let coverage = persistent_hash_parts([
                        "rdiff",
                        mutation.coverage_id(),
                        pair.false_payload.as_str(),
                    ]);
                    match self.admit_keyed(&mutation, coverage, options.audit.force) {
                        Admission::Aborted => return Ok(matches),
                        Admission::Admitted => {}
                        _ => continue,
                    }

                    match self.rdiff_input(&mutation, pair, options).await {
                        Some(found) => {
                            confirmed.insert(key);
                            matches.push(found);
                        }
                        None => continue,
                    }
                }
            }
        }

        Ok(matches)
    }

    async fn rdiff_input(
        &self,
        mutation: &Mutation,
        pair: &BooleanPair,
        options: &RdiffOptions,
    ) -> Option<RdiffMatch> {
        let falsy = mutation.reseed(&pair.false_payload)?;
        let control = match options.control {
            Some(ref value) => mutation.reseed(value)?,
            None => mutation.control()?,
        };

        let cases = [mutation, &falsy, &control];
        let requests = cases.iter().flat_map(|m| {
            (0..options.samples).map(move |_| self.submit(m, &options.audit))
        });

        let responses = match tokio::time::timeout(options.barrier_timeout, join_all(requests)).await {
            Ok(responses) => responses,
            Err(_) => {
                tracing::debug!("rdiff of {} hit the barrier timeout", mutation);
                return None;
            }
        };

        let mut grouped = responses.chunks(options.samples);
        let mut baselines = || -> Vec<Baseline> {
            grouped
                .next()
                .map(|chunk| chunk.iter().map(Baseline::from_response).collect())
                .unwrap_or_default()
        };
        let true_samples = baselines();
        let false_samples = baselines();
        let control_samples = baselines();

        match classify(&true_samples, &false_samples, &control_samples, &options.thresholds) {
            RdiffVerdict::Vulnerable => Some(RdiffMatch {
                mutation: mutation.clone(),
                pair: pair.clone(),
                response: responses.first()?.clone(),
            }),
            RdiffVerdict::NotVulnerable => None,
            RdiffVerdict::Inconclusive(reason) => {
                tracing::debug!("rdiff of {} inconclusive: {}", mutation, reason);
                None
            }
        }
    }
}
