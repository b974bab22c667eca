//! Per-type behavior, looked up by type tag at runtime.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use soil_types::{paths, DataKey, DataType, Record, Uid};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};

/// Field on file records naming the uploader; part of the blob locator.
pub const UPLOADED_BY_UID: &str = "uploadedByUid";

/// Capabilities of one data type.
pub trait RecordSchema: Send + Sync {
    fn data_type(&self) -> &DataType;

    /// Records of this type must be created with `publicAccess = true`.
    fn requires_public_access(&self) -> bool {
        false
    }

    /// Returns `true` if records of this type may own an out-of-tree blob.
    fn stores_blobs(&self) -> bool {
        false
    }

    /// Locator of the blob backing `record`, if it has one.
    fn blob_locator(&self, _key: &DataKey, _record: &Record) -> Option<String> {
        None
    }

    /// Records of this type carry an immutable requester marker.
    fn is_remote_request(&self) -> bool {
        false
    }

    /// Check the payload of a record about to be created.
    fn validate_create(&self, _fields: &Map<String, Value>) -> EngineResult<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Built-in schemas
// ---------------------------------------------------------------------------

/// A type with no special behavior.
#[derive(Clone, Debug)]
pub struct PlainSchema {
    data_type: DataType,
}

impl PlainSchema {
    pub fn new(data_type: DataType) -> Self {
        Self { data_type }
    }
}

impl RecordSchema for PlainSchema {
    fn data_type(&self) -> &DataType {
        &self.data_type
    }
}

/// The user-identity type. Always public so that anyone can connect data
/// to a user they do not own.
#[derive(Clone, Debug)]
pub struct IdentitySchema {
    data_type: DataType,
}

impl IdentitySchema {
    pub fn new(data_type: DataType) -> Self {
        Self { data_type }
    }
}

impl RecordSchema for IdentitySchema {
    fn data_type(&self) -> &DataType {
        &self.data_type
    }

    fn requires_public_access(&self) -> bool {
        true
    }
}

/// File records. The blob lives at `{type}/{uploadedByUid}/{key}`.
#[derive(Clone, Debug)]
pub struct FileSchema {
    data_type: DataType,
}

impl FileSchema {
    pub fn new(data_type: DataType) -> Self {
        Self { data_type }
    }
}

impl RecordSchema for FileSchema {
    fn data_type(&self) -> &DataType {
        &self.data_type
    }

    fn stores_blobs(&self) -> bool {
        true
    }

    fn blob_locator(&self, key: &DataKey, record: &Record) -> Option<String> {
        let uid = record.field(UPLOADED_BY_UID)?.as_str()?;
        let uid = Uid::new(uid).ok()?;
        Some(paths::blob_locator(&self.data_type, &uid, key))
    }

    fn validate_create(&self, fields: &Map<String, Value>) -> EngineResult<()> {
        match fields.get(UPLOADED_BY_UID).and_then(Value::as_str) {
            Some(uid) if Uid::new(uid).is_ok() => Ok(()),
            _ => Err(EngineError::SchemaViolation {
                data_type: self.data_type.clone(),
                reason: format!("`{UPLOADED_BY_UID}` must be a uid"),
            }),
        }
    }
}

/// Records created on behalf of a remote requester, stamped with the
/// requester's uid.
#[derive(Clone, Debug)]
pub struct RemoteRequestSchema {
    data_type: DataType,
    marker_field: String,
}

impl RemoteRequestSchema {
    pub fn new(data_type: DataType, marker_field: impl Into<String>) -> Self {
        Self {
            data_type,
            marker_field: marker_field.into(),
        }
    }

    pub fn marker_field(&self) -> &str {
        &self.marker_field
    }
}

impl RecordSchema for RemoteRequestSchema {
    fn data_type(&self) -> &DataType {
        &self.data_type
    }

    fn is_remote_request(&self) -> bool {
        true
    }

    fn validate_create(&self, fields: &Map<String, Value>) -> EngineResult<()> {
        match fields.get(&self.marker_field).and_then(Value::as_str) {
            Some(uid) if Uid::new(uid).is_ok() => Ok(()),
            _ => Err(EngineError::SchemaViolation {
                data_type: self.data_type.clone(),
                reason: format!("`{}` must carry the requester's uid", self.marker_field),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// SchemaRegistry
// ---------------------------------------------------------------------------

/// Type tag → schema lookup.
#[derive(Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<DataType, Arc<dyn RecordSchema>>,
    strict: bool,
}

impl SchemaRegistry {
    /// An empty, permissive registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the identity, file and remote-request schemas named
    /// in `config`.
    pub fn with_builtins(config: &EngineConfig) -> EngineResult<Self> {
        let mut registry = Self {
            schemas: HashMap::new(),
            strict: config.strict_schemas,
        };
        registry.register(IdentitySchema::new(DataType::new(config.identity_type.as_str())?));
        registry.register(FileSchema::new(DataType::new(config.file_type.as_str())?));
        registry.register(RemoteRequestSchema::new(
            DataType::new(config.remote_request_type.as_str())?,
            config.remote_request_field.as_str(),
        ));
        Ok(registry)
    }

    /// Register (or replace) the schema for its type.
    pub fn register(&mut self, schema: impl RecordSchema + 'static) {
        self.schemas
            .insert(schema.data_type().clone(), Arc::new(schema));
    }

    /// Look up a type. Unregistered types get a [`PlainSchema`] unless the
    /// registry is strict.
    pub fn get(&self, data_type: &DataType) -> EngineResult<Arc<dyn RecordSchema>> {
        match self.schemas.get(data_type) {
            Some(schema) => Ok(Arc::clone(schema)),
            None if self.strict => Err(EngineError::UnknownDataType(data_type.clone())),
            None => Ok(Arc::new(PlainSchema::new(data_type.clone()))),
        }
    }

    pub fn is_registered(&self, data_type: &DataType) -> bool {
        self.schemas.contains_key(data_type)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<&str> = self.schemas.keys().map(DataType::as_str).collect();
        types.sort_unstable();
        f.debug_struct("SchemaRegistry")
            .field("types", &types)
            .field("strict", &self.strict)
            .finish()
    }
}
