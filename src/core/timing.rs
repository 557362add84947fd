//! Blind timing detection
//!
//! Phase one audits the page with every template rendered at the base delay
//! and keeps the mutations whose responses were slow enough. Phase two
//! verifies each candidate serially:
//!
//! 1. a control request with the control delay must come back promptly
//! 2. each verification request with the escalated delay must be slow again
//!
//! A candidate failing either step is dropped without an issue or an error.

use crate::core::engine::AuditEngine;
use crate::element::Page;
use crate::error::{AuditError, Result};
use crate::http::response::HttpResponse;
use crate::payload::loader::PayloadSet;
use crate::payload::mutation::Mutation;
use crate::payload::options::AuditOptions;
use crate::validation::timing::{build_profile, LatencyProfile, TimingOptions, TIME_PLACEHOLDER};
use indexmap::IndexMap;
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct TimingMatch {
    /// the phase one mutation that was confirmed
    pub mutation: Mutation,
    pub template: String,
    /// last verification response
    pub response: HttpResponse,
    pub control_ms: u128,
    pub verification_delay_ms: u64,
    pub verification: LatencyProfile,
}

impl AuditEngine {
    pub async fn timing_attack_audit(
        &self,
        page: &Page,
        templates: &[String],
        options: &AuditOptions,
        timing: &TimingOptions,
    ) -> Result<Vec<TimingMatch>> {
        if templates.is_empty() {
            return Err(AuditError::config("no timing payload templates given"));
        }
        if let Some(t) = templates.iter().find(|t| !t.contains(TIME_PLACEHOLDER)) {
            return Err(AuditError::config(format!(
                "timing payload '{}' has no {} placeholder",
                t, TIME_PLACEHOLDER
            )));
        }
        if timing.control_ratio <= 0.0 || timing.control_ratio >= 1.0 {
            return Err(AuditError::config("timing control_ratio must be between 0 and 1"));
        }

        let rendered: IndexMap<String, String> = templates
            .iter()
            .map(|t| (timing.render(t, timing.delay_ms), t.clone()))
            .collect();
        let payloads = PayloadSet::new("timing", rendered.keys().cloned());

        let mut phase_one = options.clone();
        phase_one.submit.timeout = Some(timing.request_timeout(timing.delay_ms));

        let mut candidates = Vec::new();
        self.audit(page, &payloads, &phase_one, |response, mutation| {
            if timing.is_delayed(response, timing.delay_ms) {
                candidates.push(mutation.clone());
            }
        })
        .await?;

        if !candidates.is_empty() {
            tracing::debug!("{} timing candidates on {}", candidates.len(), page.url);
        }

        let mut confirmed: HashSet<(u64, String)> = HashSet::new();
        let mut matches = Vec::new();

        for candidate in candidates {
            if self.context().is_aborted() {
                break;
            }
            let key = (
                candidate.element().identity(),
                candidate.affected_input_name().to_string(),
            );
            if confirmed.contains(&key) {
                continue;
            }
            let Some(template) = rendered.get(candidate.seed()) else {
                continue;
            };

            let verification = self.verify_timing(&candidate, template, options, timing);
            match tokio::time::timeout(timing.barrier_timeout(), verification).await {
                Ok(Some(found)) => {
                    confirmed.insert(key);
                    matches.push(found);
                }
                Ok(None) => {}
                Err(_) => {
                    tracing::debug!("Timing verification of {} hit the barrier timeout", candidate);
                }
            }
        }

        Ok(matches)
    }

    async fn verify_timing(
        &self,
        candidate: &Mutation,
        template: &str,
        options: &AuditOptions,
        timing: &TimingOptions,
    ) -> Option<TimingMatch> {
        let control = candidate.reseed(&timing.render(template, timing.control_delay_ms))?;
        let mut control_options = options.clone();
        control_options.submit.timeout = Some(timing.request_timeout(timing.delay_ms));

        let control_response = self.submit(&control, &control_options).await;
        if !timing.is_prompt(&control_response) {
            tracing::debug!(
                "Discarding {}: control took {}ms",
                candidate,
                control_response.elapsed_ms
            );
            return None;
        }

        let delay = timing.verification_delay_ms();
        let retry = candidate.reseed(&timing.render(template, delay))?;
        let mut retry_options = options.clone();
        retry_options.submit.timeout = Some(timing.request_timeout(delay));

        let mut samples = Vec::with_capacity(timing.verification_retries.max(1));
        let mut last = None;
        for _ in 0..timing.verification_retries.max(1) {
            if self.context().is_aborted() {
                return None;
            }
            let response = self.submit(&retry, &retry_options).await;
            if !timing.is_delayed(&response, delay) {
                tracing::debug!(
                    "Discarding {}: verification took {}ms, expected {}ms",
                    candidate,
                    response.elapsed_ms,
                    delay
                );
                return None;
            }
            samples.push(response.elapsed_ms);
            last = Some(response);
        }

        Some(TimingMatch {
            mutation: candidate.clone(),
            template: template.to_string(),
            response: last?,
            control_ms: control_response.elapsed_ms,
            verification_delay_ms: delay,
            verification: build_profile(samples),
        })
    }
}
