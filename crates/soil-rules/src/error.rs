use soil_types::TypeError;

/// Errors from compiling or evaluating a permission tree.
#[derive(Debug, thiserror::Error)]
pub enum RulesError {
    #[error("invalid rules configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Type(#[from] TypeError),
}

impl From<serde_json::Error> for RulesError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result alias for rules operations.
pub type RulesResult<T> = Result<T, RulesError>;
