//! gauntlet: the audit core of a web application scanner.
//!
//! A page's links, forms, cookies and headers are turned into mutated
//! requests, filtered through the scope rules and the scan-wide coverage
//! set, dispatched under a concurrency limit, and handed back to the check
//! that asked for them.

pub mod checks;
pub mod core;
pub mod element;
pub mod error;
pub mod fingerprint;
pub mod http;
pub mod lookup;
pub mod payload;
pub mod reporting;
pub mod validation;

pub use crate::core::{AuditEngine, Auditor, ScanConfig, ScanContext};
pub use crate::error::{AuditError, Result};
