//! Pipeline stages, from dataset discovery to record assembly.

pub mod assemble;
pub mod batch;
pub mod classify;
pub mod discovery;
pub mod headers;
pub mod matching;
pub mod reconcile;

// Re-export key types for convenience
pub use assemble::{assemble, AssemblyError};
pub use batch::{run_batch, run_batch_in, BatchError, BatchResult, WeldError, WeldFailure};
pub use classify::Classification;
pub use discovery::{
    find_all_dataset_files, find_dataset_files, list_datasets, natural_sort, DatasetFiles,
    DiscoveryError,
};
pub use headers::{harmonize, harmonize_files, EligibleHeader, HeaderError};
pub use matching::{match_schedules, MatchError, SchedulePair};
pub use reconcile::{schedule_offsets, ReconcileError, Reconciled, Reconciler};
