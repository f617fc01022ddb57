//! Data model shared across discovery, resolution and reconciliation

pub mod chain;
pub mod report;
pub mod table_root;

pub use chain::ChainDescriptor;
pub use report::{
    CompletionReport, DiscoveryReport, FailureEntry, FlagEntry, JobRunStatus,
    JobStateChangeEvent, ResourceEntry, SourceKind,
};
pub use table_root::{GroupingPolicy, TableRoot};
