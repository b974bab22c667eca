use serde::{Deserialize, Serialize};
use soil_writer::WriterConfig;

/// Configuration for the record engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Type whose records represent users. Must always be public.
    pub identity_type: String,
    /// Type whose records point at out-of-tree blobs.
    pub file_type: String,
    /// Type of records created on behalf of a remote requester.
    pub remote_request_type: String,
    /// Field that stamps the requester's uid on remote-request records.
    pub remote_request_field: String,
    /// Characters of a payload included in transport error logs.
    pub log_value_limit: usize,
    /// Reject types without a registered schema.
    pub strict_schemas: bool,
    pub writer: WriterConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            identity_type: "appUser".into(),
            file_type: "soilFile".into(),
            remote_request_type: "remoteRequest".into(),
            remote_request_field: "remoteRequestUid".into(),
            log_value_limit: soil_store::logged::DEFAULT_VALUE_LIMIT,
            strict_schemas: false,
            writer: WriterConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Default type names with an unpaced writer; for in-memory stores.
    pub fn permissive() -> Self {
        Self {
            writer: WriterConfig::permissive(),
            ..Default::default()
        }
    }
}
