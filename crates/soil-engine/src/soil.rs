use std::sync::Arc;

use serde_json::Value;
use soil_store::{BlobStore, LoggedTreeStore, TreeStore, WriteMode};
use soil_types::{DataType, WriteSet};
use soil_writer::{ApplyReport, BatchedWriter};

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::schema::{RecordSchema, SchemaRegistry};

/// The record engine: one store handle plus everything needed to keep its
/// indexes consistent.
///
/// Operations live in the `ownership`, `connections`, `read`, `lifecycle`,
/// `users`, `tracking` and `counters` modules as further `impl` blocks.
pub struct Soil<S: ?Sized> {
    store: Arc<S>,
    blobs: Option<Arc<dyn BlobStore>>,
    writer: BatchedWriter<S>,
    schemas: SchemaRegistry,
    identity_type: DataType,
    config: EngineConfig,
}

impl<S: TreeStore + ?Sized> Soil<S> {
    pub fn new(store: Arc<S>, config: EngineConfig) -> EngineResult<Self> {
        let writer = BatchedWriter::new(Arc::clone(&store), config.writer.clone())?;
        let schemas = SchemaRegistry::with_builtins(&config)?;
        let identity_type = DataType::new(config.identity_type.as_str())?;
        Ok(Self {
            store,
            blobs: None,
            writer,
            schemas,
            identity_type,
            config,
        })
    }

    /// Attach the collaborator that deletes file blobs.
    pub fn with_blob_store(mut self, blobs: Arc<dyn BlobStore>) -> Self {
        self.blobs = Some(blobs);
        self
    }

    /// Register an application schema, replacing any built-in for its type.
    pub fn with_schema(mut self, schema: impl RecordSchema + 'static) -> Self {
        self.schemas.register(schema);
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn writer(&self) -> &BatchedWriter<S> {
        &self.writer
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Type whose records represent users.
    pub fn identity_type(&self) -> &DataType {
        &self.identity_type
    }

    pub(crate) fn blob_store(&self) -> Option<&Arc<dyn BlobStore>> {
        self.blobs.as_ref()
    }

    pub(crate) async fn read(&self, path: &str) -> EngineResult<Option<Value>> {
        Ok(self.store.read(path).await?)
    }

    pub(crate) async fn apply(&self, writes: &WriteSet, mode: WriteMode) -> EngineResult<ApplyReport> {
        Ok(self.writer.apply(writes, mode).await?)
    }
}

impl<S: TreeStore> Soil<LoggedTreeStore<S>> {
    /// Wrap `store` so that transport failures are logged with context
    /// before they surface.
    pub fn logged(store: S, config: EngineConfig) -> EngineResult<Self> {
        let store = LoggedTreeStore::new(store).with_value_limit(config.log_value_limit);
        Self::new(Arc::new(store), config)
    }
}

impl<S: ?Sized> std::fmt::Debug for Soil<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Soil")
            .field("schemas", &self.schemas)
            .field("blob_store", &self.blobs.is_some())
            .field("config", &self.config)
            .finish()
    }
}
