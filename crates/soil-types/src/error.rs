use thiserror::Error;

/// Errors produced by type construction and path building.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    /// A path segment (type, key, uid, field, ...) is not storable.
    #[error("invalid {kind} segment {segment:?}: {reason}")]
    InvalidSegment {
        kind: &'static str,
        segment: String,
        reason: String,
    },

    /// A stored value did not have the expected shape.
    #[error("malformed value at {path}: {reason}")]
    MalformedValue { path: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for TypeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result alias for type operations.
pub type TypeResult<T> = Result<T, TypeError>;
