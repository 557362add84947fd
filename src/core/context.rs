//! Per-scan shared state
//!
//! One `ScanContext` lives for exactly one scan. It owns everything that
//! checks running concurrently must agree on: scope counters, the coverage
//! set, the issue log and the abort flag.

use crate::core::config::ScanConfig;
use crate::core::scope::Scope;
use crate::error::{AuditError, Result};
use crate::lookup::{BoundedLookupSet, Lookup, LookupSet};
use crate::reporting::IssueLog;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use url::Url;

pub struct ScanContext {
    pub config: Arc<ScanConfig>,
    pub seed: Url,
    pub scope: Scope,
    pub issues: IssueLog,
    coverage: Mutex<Box<dyn Lookup>>,
    aborted: AtomicBool,
}

impl ScanContext {
    pub fn new(seed: Url, config: ScanConfig) -> Result<Self> {
        let scope = Scope::new(&seed, &config.scope)?;

        let coverage: Box<dyn Lookup> = match config.audit.coverage.capacity {
            None => Box::new(LookupSet::new()),
            Some(capacity) => {
                let capacity = NonZeroUsize::new(capacity).ok_or_else(|| {
                    AuditError::config("audit.coverage.capacity must be greater than zero")
                })?;
                Box::new(BoundedLookupSet::new(capacity, config.audit.coverage.eviction))
            }
        };

        tracing::debug!("Scan context ready for {}", seed);

        Ok(Self {
            config: Arc::new(config),
            seed,
            scope,
            issues: IssueLog::new(),
            coverage: Mutex::new(coverage),
            aborted: AtomicBool::new(false),
        })
    }

    /// Stop issuing new work. Requests already in flight are left to finish.
    pub fn abort(&self) {
        if !self.aborted.swap(true, Ordering::SeqCst) {
            tracing::warn!("Scan aborted, no new requests will be issued");
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    /// Records a coverage fingerprint; false if it was already there.
    pub fn mark_covered(&self, fingerprint: u64) -> bool {
        self.coverage.lock().insert(fingerprint)
    }

    pub fn is_covered(&self, fingerprint: u64) -> bool {
        self.coverage.lock().contains(fingerprint)
    }

    pub fn coverage_len(&self) -> usize {
        self.coverage.lock().len()
    }

    /// Raw fingerprints, for suspending a scan.
    pub fn dump_coverage(&self) -> Vec<u64> {
        self.coverage.lock().dump()
    }

    pub fn restore_coverage(&self, fingerprints: impl IntoIterator<Item = u64>) {
        let mut coverage = self.coverage.lock();
        for fingerprint in fingerprints {
            coverage.insert(fingerprint);
        }
    }
}
