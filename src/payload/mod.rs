pub mod injector;
pub mod iterator;
pub mod loader;
pub mod mutation;
pub mod options;

pub use iterator::{mutations, MutationIter};
pub use loader::{load_payloads, PayloadSet};
pub use mutation::{Mutation, MutationKind};
pub use options::{AuditOptions, Format, SkipLike, SubmitOverrides};
