pub mod json;
pub mod model;
pub mod reporter;

pub use model::{Issue, IssueFields, Severity};
pub use reporter::IssueLog;
