//! Delay measurement for blind timing checks.
//!
//! Payload templates carry a `__TIME__` placeholder that is replaced by the
//! delay expressed in the unit the target understands (`delay_ms / divisor`,
//! so seconds by default).

use crate::http::response::HttpResponse;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const TIME_PLACEHOLDER: &str = "__TIME__";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingOptions {
    /// delay requested in the first phase, in milliseconds
    pub delay_ms: u64,
    /// `delay_ms / divisor` is what gets substituted into the template
    pub divisor: u64,
    pub control_delay_ms: u64,
    /// the control must come back faster than `delay_ms * control_ratio`
    pub control_ratio: f64,
    pub verification_retries: usize,
    /// verification delay is `delay_ms * escalation`
    pub escalation: u64,
    /// added to the expected delay to form the request timeout
    pub timeout_padding_ms: u64,
    /// upper bound for verifying a single candidate
    pub barrier_timeout_ms: u64,
}

impl Default for TimingOptions {
    fn default() -> Self {
        Self {
            delay_ms: 4_000,
            divisor: 1_000,
            control_delay_ms: 0,
            control_ratio: 0.5,
            verification_retries: 1,
            escalation: 2,
            timeout_padding_ms: 6_000,
            barrier_timeout_ms: 60_000,
        }
    }
}

impl TimingOptions {
    pub fn render(&self, template: &str, delay_ms: u64) -> String {
        let value = delay_ms as f64 / self.divisor.max(1) as f64;
        template.replace(TIME_PLACEHOLDER, &value.to_string())
    }

    pub fn verification_delay_ms(&self) -> u64 {
        self.delay_ms.saturating_mul(self.escalation.max(1))
    }

    pub fn request_timeout(&self, delay_ms: u64) -> Duration {
        Duration::from_millis(delay_ms.saturating_add(self.timeout_padding_ms))
    }

    pub fn barrier_timeout(&self) -> Duration {
        Duration::from_millis(self.barrier_timeout_ms)
    }

    pub fn control_threshold_ms(&self) -> f64 {
        self.delay_ms as f64 * self.control_ratio
    }

    /// A timeout counts as delayed: the server held the connection at least that long.
    pub fn is_delayed(&self, resp: &HttpResponse, delay_ms: u64) -> bool {
        resp.timed_out() || (resp.is_completed() && resp.elapsed_ms >= delay_ms as u128)
    }

    pub fn is_prompt(&self, resp: &HttpResponse) -> bool {
        resp.is_completed() && (resp.elapsed_ms as f64) < self.control_threshold_ms()
    }
}

/// Response times of a set of requests.
#[derive(Debug, Clone, PartialEq)]
pub struct LatencyProfile {
    pub samples: Vec<u128>,
    pub mean: f64,
    pub variance: f64,
}

pub fn build_profile(samples: Vec<u128>) -> LatencyProfile {
    let mean = calculate_mean(&samples);
    let variance = calculate_variance(&samples, mean);

    LatencyProfile {
        samples,
        mean,
        variance,
    }
}

fn calculate_mean(samples: &[u128]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: u128 = samples.iter().sum();
    sum as f64 / samples.len() as f64
}

fn calculate_variance(samples: &[u128], mean: f64) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples
        .iter()
        .map(|&x| {
            let diff = x as f64 - mean;
            diff * diff
        })
        .sum::<f64>()
        / samples.len() as f64
}
