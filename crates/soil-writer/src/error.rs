use soil_store::StoreError;

use crate::group::PathGroup;

/// Errors from the batched writer.
#[derive(Debug, thiserror::Error)]
pub enum WriterError {
    /// A write-set addressed the tree root without `allow_root`.
    #[error("write-set addresses the root path; root writes need explicit opt-in")]
    RootPath,

    /// A root-level entry could not be expanded into top-level writes.
    #[error("root-level value must be an object, got {0}")]
    InvalidRootValue(String),

    /// A group failed after earlier groups were already applied. The store
    /// is in an indeterminate state; retrying the whole operation is safe for
    /// everything except bulk type teardown.
    #[error("batch failed in {failed_group} group after applying {applied_groups:?}: {source}")]
    PartialBatch {
        applied_groups: Vec<PathGroup>,
        failed_group: PathGroup,
        source: StoreError,
    },

    /// A bulk teardown stopped partway; the remaining batches were not sent.
    #[error("bulk apply aborted after {completed_batches}/{total_batches} batches: {source}")]
    BulkAborted {
        completed_batches: usize,
        total_batches: usize,
        source: StoreError,
    },

    #[error("invalid writer configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result alias for writer operations.
pub type WriterResult<T> = Result<T, WriterError>;
