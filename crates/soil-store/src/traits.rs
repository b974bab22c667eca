use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use soil_types::WriteSet;

use crate::error::StoreResult;

/// How `batch_apply` treats object values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Additive: an object value is merged one level into the node at its
    /// path (each child replaced, null children deleted). Scalars replace.
    Merge,
    /// Destructive: every value replaces the node at its path.
    Delete,
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Merge => f.write_str("merge"),
            Self::Delete => f.write_str("delete"),
        }
    }
}

/// Transaction body for [`TreeStore::run_with_optimistic_retry`].
///
/// Receives the current value (or `None`) and returns the value to store
/// (or `None` to delete). May be called more than once.
pub type TransactionFn<'a> = &'a (dyn Fn(Option<Value>) -> Option<Value> + Send + Sync);

/// The path-addressed tree store soil is layered on.
///
/// All implementations must satisfy these invariants:
/// - Reading a missing path is `Ok(None)`, never an error.
/// - A null value in a write-set deletes its path; parents left empty are
///   pruned so that empty objects never exist.
/// - One `batch_apply` call is atomic: all entries land or none do.
/// - Root-level reads and writes are refused with `StoreError::RootPath`.
#[async_trait]
pub trait TreeStore: Send + Sync {
    /// Read the value at `path`.
    async fn read(&self, path: &str) -> StoreResult<Option<Value>>;

    /// Apply every entry of `writes` atomically.
    async fn batch_apply(&self, writes: &WriteSet, mode: WriteMode) -> StoreResult<()>;

    /// Allocate a collision-resistant, time-ordered child key under `path`.
    async fn generate_key(&self, path: &str) -> StoreResult<String>;

    /// Read-modify-write `path`, retrying on concurrent modification.
    ///
    /// Returns the value that was finally applied.
    async fn run_with_optimistic_retry(
        &self,
        path: &str,
        update: TransactionFn<'_>,
    ) -> StoreResult<Option<Value>>;

    /// Store `value` under a freshly generated child key of `path`.
    async fn push(&self, path: &str, value: Value) -> StoreResult<String> {
        let key = self.generate_key(path).await?;
        let mut writes = WriteSet::new();
        writes.set(format!("{}/{key}", soil_types::paths::normalize(path)), value);
        self.batch_apply(&writes, WriteMode::Merge).await?;
        Ok(key)
    }
}

/// Out-of-tree storage for file contents.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Delete the blob at `locator`. Deleting a missing blob succeeds.
    async fn delete_blob(&self, locator: &str) -> StoreResult<()>;
}
