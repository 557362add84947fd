//! Checks and the boundary they run behind.
//!
//! A check that returns an error or panics is reported as failed; the
//! other checks and the scan carry on.

pub mod blind_timing;
pub mod boolean;
pub mod fuzz;
pub mod reflected;

use crate::core::auditor::Auditor;
use crate::core::engine::AuditEngine;
use crate::element::{ElementKind, Page};
use crate::error::AuditError;
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinSet;

pub use blind_timing::BlindTiming;
pub use boolean::BooleanDifferential;
pub use fuzz::ServerErrorFuzz;
pub use reflected::ReflectedInput;

#[derive(Debug, Clone)]
pub struct CheckInfo {
    pub name: &'static str,
    pub shortname: &'static str,
    pub description: &'static str,
    pub elements: Vec<ElementKind>,
}

#[async_trait]
pub trait Check: Send + Sync {
    fn info(&self) -> CheckInfo;

    async fn run(&self, auditor: &Auditor) -> Result<(), AuditError>;
}

/// The checks shipped with the scanner.
pub fn default_checks() -> Vec<Arc<dyn Check>> {
    vec![
        Arc::new(ReflectedInput),
        Arc::new(ServerErrorFuzz::default()),
        Arc::new(BlindTiming::default()),
        Arc::new(BooleanDifferential::default()),
    ]
}

/// Selects checks by shortname; unknown names are a configuration error.
pub fn select_checks(
    available: Vec<Arc<dyn Check>>,
    names: &[String],
) -> Result<Vec<Arc<dyn Check>>, AuditError> {
    if names.is_empty() {
        return Ok(available);
    }
    for name in names {
        if !available.iter().any(|c| c.info().shortname == name.as_str()) {
            return Err(AuditError::config(format!("unknown check '{}'", name)));
        }
    }
    Ok(available
        .into_iter()
        .filter(|c| names.iter().any(|n| n.as_str() == c.info().shortname))
        .collect())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub completed: Vec<String>,
    /// (check, reason)
    pub failed: Vec<(String, String)>,
}

pub struct CheckRunner {
    engine: AuditEngine,
}

impl CheckRunner {
    pub fn new(engine: AuditEngine) -> Self {
        Self { engine }
    }

    /// Runs every check against `page` concurrently and waits for all of them.
    pub async fn run(&self, page: Arc<Page>, checks: &[Arc<dyn Check>]) -> RunSummary {
        let mut tasks = JoinSet::new();

        for check in checks {
            let check = Arc::clone(check);
            let shortname = check.info().shortname;
            let auditor = Auditor::new(self.engine.clone(), shortname, Arc::clone(&page));
            tasks.spawn(async move {
                tracing::debug!("Running check {}", shortname);
                let outcome = AssertUnwindSafe(check.run(&auditor)).catch_unwind().await;
                (shortname, outcome)
            });
        }

        let mut summary = RunSummary::default();
        while let Some(joined) = tasks.join_next().await {
            let (name, reason) = match joined {
                Ok((name, Ok(Ok(())))) => {
                    summary.completed.push(name.to_string());
                    continue;
                }
                Ok((name, Ok(Err(e)))) => (name.to_string(), e.to_string()),
                Ok((name, Err(panic))) => (name.to_string(), panic_message(panic.as_ref())),
                Err(e) => ("unknown".to_string(), e.to_string()),
            };
            tracing::error!("check {} failed to run: {}", name, reason);
            summary.failed.push((name, reason));
        }

        summary.completed.sort();
        summary.failed.sort();
        summary
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}
