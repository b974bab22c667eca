use soil_types::TypeError;

/// Errors from tree-store and blob-store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Root-level reads and writes need an explicit opt-in.
    #[error("refusing to operate on the root path {path:?}")]
    RootPath { path: String },

    /// The path or one of its segments is not storable.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// The underlying transport rejected or failed the request.
    #[error("transport error: {0}")]
    Transport(String),

    /// The store denied the request.
    #[error("permission denied at {path}")]
    PermissionDenied { path: String },

    /// An optimistic transaction kept colliding with concurrent writers.
    #[error("transaction at {path} gave up after {attempts} attempts")]
    RetryExhausted { path: String, attempts: u32 },

    /// Blob storage failed.
    #[error("blob error for {locator}: {reason}")]
    Blob { locator: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Type(#[from] TypeError),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
