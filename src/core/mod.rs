pub mod auditor;
pub mod config;
pub mod context;
pub mod engine;
pub mod rdiff;
pub mod scope;
pub mod timing;

pub use auditor::Auditor;
pub use config::ScanConfig;
pub use context::ScanContext;
pub use engine::{Admission, AuditEngine, AuditSummary};
pub use scope::{CounterMode, Scope, ScopeRejection};
