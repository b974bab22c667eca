use soil_store::StoreError;
use soil_types::{DataType, RecordRef, TypeError};
use soil_writer::WriterError;

/// Errors from engine operations.
///
/// Precondition variants are raised before anything is written. `Writer`
/// wraps partial-batch failures, after which the store state is
/// indeterminate.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("record {0} not found")]
    RecordNotFound(RecordRef),

    #[error("record {0} already exists")]
    TargetExists(RecordRef),

    #[error("source and target are both {0}")]
    SameCoordinates(RecordRef),

    #[error("records of type {0} must be public")]
    PublicAccessRequired(DataType),

    #[error("field {0:?} is managed by the engine")]
    ReservedField(String),

    #[error("type {0} stores files but no blob store is configured")]
    MissingBlobStore(DataType),

    #[error("no schema registered for type {0}")]
    UnknownDataType(DataType),

    #[error("schema for {data_type} rejected the record: {reason}")]
    SchemaViolation { data_type: DataType, reason: String },

    #[error("malformed value at {path}: {reason}")]
    Malformed { path: String, reason: String },

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Writer(#[from] WriterError),
}

impl EngineError {
    /// Returns `true` if the call was rejected before any write was sent.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::RecordNotFound(_)
                | Self::TargetExists(_)
                | Self::SameCoordinates(_)
                | Self::PublicAccessRequired(_)
                | Self::ReservedField(_)
                | Self::MissingBlobStore(_)
                | Self::UnknownDataType(_)
                | Self::SchemaViolation { .. }
                | Self::Type(_)
                | Self::Writer(WriterError::RootPath)
        )
    }
}

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
