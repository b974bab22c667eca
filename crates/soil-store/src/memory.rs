use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Map, Value};
use soil_types::{paths, WriteSet};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::traits::{BlobStore, TransactionFn, TreeStore, WriteMode};

const FAILURE_DISABLED: usize = usize::MAX;

/// One `batch_apply` call as seen by the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppliedBatch {
    pub mode: WriteMode,
    pub paths: Vec<String>,
}

/// In-memory JSON tree implementing [`TreeStore`].
///
/// Intended for tests and embedding. The whole tree is held behind a tokio
/// `RwLock`; every applied batch is recorded so tests can inspect the order
/// in which groups reached the store.
pub struct InMemoryTreeStore {
    root: RwLock<Value>,
    history: RwLock<Vec<AppliedBatch>>,
    reads: AtomicUsize,
    fail_countdown: AtomicUsize,
}

impl InMemoryTreeStore {
    pub fn new() -> Self {
        Self {
            root: RwLock::new(Value::Object(Map::new())),
            history: RwLock::new(Vec::new()),
            reads: AtomicUsize::new(0),
            fail_countdown: AtomicUsize::new(FAILURE_DISABLED),
        }
    }

    /// Seed the store with an initial tree.
    pub fn with_tree(tree: Value) -> Self {
        Self {
            root: RwLock::new(prune(tree)),
            ..Self::new()
        }
    }

    /// A clone of the whole tree.
    pub async fn snapshot(&self) -> Value {
        self.root.read().await.clone()
    }

    /// Every batch applied so far, oldest first.
    pub async fn history(&self) -> Vec<AppliedBatch> {
        self.history.read().await.clone()
    }

    pub async fn clear_history(&self) {
        self.history.write().await.clear();
    }

    /// Number of `read` calls served.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Let `successes` more batches through, then fail the next one.
    ///
    /// The failure fires once; later batches succeed again.
    pub fn fail_on_apply(&self, successes: usize) {
        self.fail_countdown.store(successes, Ordering::SeqCst);
    }

    fn take_injected_failure(&self) -> bool {
        let remaining = self.fail_countdown.load(Ordering::SeqCst);
        match remaining {
            FAILURE_DISABLED => false,
            0 => {
                self.fail_countdown.store(FAILURE_DISABLED, Ordering::SeqCst);
                true
            }
            n => {
                self.fail_countdown.store(n - 1, Ordering::SeqCst);
                false
            }
        }
    }
}

impl Default for InMemoryTreeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryTreeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTreeStore")
            .field("reads", &self.read_count())
            .finish()
    }
}

fn check_path(path: &str) -> StoreResult<()> {
    if paths::is_root(path) {
        return Err(StoreError::RootPath {
            path: path.to_string(),
        });
    }
    for segment in paths::segments(path) {
        paths::validate_segment(segment, "path").map_err(|err| StoreError::InvalidPath {
            path: path.to_string(),
            reason: err.to_string(),
        })?;
    }
    Ok(())
}

#[async_trait]
impl TreeStore for InMemoryTreeStore {
    async fn read(&self, path: &str) -> StoreResult<Option<Value>> {
        check_path(path)?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        let root = self.root.read().await;
        Ok(get_node(&root, path).cloned())
    }

    async fn batch_apply(&self, writes: &WriteSet, mode: WriteMode) -> StoreResult<()> {
        for path in writes.paths() {
            check_path(path)?;
        }
        if self.take_injected_failure() {
            return Err(StoreError::Transport("injected failure".into()));
        }

        let mut root = self.root.write().await;
        for (path, value) in writes.iter() {
            match (mode, value) {
                (WriteMode::Merge, Value::Object(children)) => {
                    for (child, child_value) in children {
                        set_node(&mut root, &format!("{path}/{child}"), child_value.clone());
                    }
                }
                _ => set_node(&mut root, path, value.clone()),
            }
        }
        drop(root);

        debug!(mode = %mode, entries = writes.len(), "applied batch");
        self.history.write().await.push(AppliedBatch {
            mode,
            paths: writes.paths().cloned().collect(),
        });
        Ok(())
    }

    async fn generate_key(&self, path: &str) -> StoreResult<String> {
        check_path(path)?;
        Ok(Uuid::now_v7().simple().to_string())
    }

    async fn run_with_optimistic_retry(
        &self,
        path: &str,
        update: TransactionFn<'_>,
    ) -> StoreResult<Option<Value>> {
        check_path(path)?;
        // The write lock makes the read-modify-write exclusive, so the
        // first attempt always commits.
        let mut root = self.root.write().await;
        let current = get_node(&root, path).cloned();
        let next = update(current);
        set_node(&mut root, path, next.clone().unwrap_or(Value::Null));
        Ok(next.map(prune).filter(|v| !is_empty(v)))
    }
}

// ---------------------------------------------------------------------------
// Tree helpers
// ---------------------------------------------------------------------------

fn get_node<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut node = root;
    for segment in paths::segments(path) {
        node = node.as_object()?.get(segment)?;
    }
    Some(node)
}

/// The object at `node`, replacing a scalar or null with an empty one.
fn ensure_object(node: &mut Value) -> &mut Map<String, Value> {
    match node {
        Value::Object(map) => map,
        other => {
            *other = Value::Object(Map::new());
            ensure_object(other)
        }
    }
}

fn set_node(root: &mut Value, path: &str, value: Value) {
    let segments: Vec<&str> = paths::segments(path).collect();
    let value = prune(value);
    if is_empty(&value) {
        remove_node(root, &segments);
        return;
    }
    let Some((last, parents)) = segments.split_last() else {
        return;
    };
    let mut node = root;
    for segment in parents {
        node = ensure_object(node)
            .entry((*segment).to_string())
            .or_insert(Value::Null);
    }
    ensure_object(node).insert((*last).to_string(), value);
}

fn remove_node(node: &mut Value, segments: &[&str]) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    let Value::Object(map) = node else {
        return;
    };
    if rest.is_empty() {
        map.remove(*first);
        return;
    }
    if let Some(child) = map.get_mut(*first) {
        remove_node(child, rest);
        if is_empty(child) {
            map.remove(*first);
        }
    }
}

/// Drop null children and empty objects, the way the store never holds them.
fn prune(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, prune(v)))
                .filter(|(_, v)| !is_empty(v))
                .collect(),
        ),
        other => other,
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// InMemoryBlobStore
// ---------------------------------------------------------------------------

/// In-memory blob locator set implementing [`BlobStore`].
#[derive(Default)]
pub struct InMemoryBlobStore {
    blobs: RwLock<BTreeSet<String>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, locator: impl Into<String>) {
        self.blobs.write().await.insert(locator.into());
    }

    pub async fn contains(&self, locator: &str) -> bool {
        self.blobs.read().await.contains(locator)
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn delete_blob(&self, locator: &str) -> StoreResult<()> {
        self.blobs.write().await.remove(locator);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ws(entries: &[(&str, Value)]) -> WriteSet {
        entries
            .iter()
            .map(|(p, v)| (p.to_string(), v.clone()))
            .collect()
    }

    // ----------------------------------------------------------------
    // Reads
    // ----------------------------------------------------------------

    #[tokio::test]
    async fn missing_path_reads_none() {
        let store = InMemoryTreeStore::new();
        assert_eq!(store.read("data/widget/w1").await.unwrap(), None);
        assert_eq!(store.read_count(), 1);
    }

    #[tokio::test]
    async fn root_read_is_refused() {
        let store = InMemoryTreeStore::new();
        assert!(matches!(
            store.read("/").await,
            Err(StoreError::RootPath { .. })
        ));
    }

    #[tokio::test]
    async fn invalid_segment_is_refused() {
        let store = InMemoryTreeStore::new();
        assert!(matches!(
            store.read("data/a.b").await,
            Err(StoreError::InvalidPath { .. })
        ));
    }

    // ----------------------------------------------------------------
    // Merge vs delete semantics
    // ----------------------------------------------------------------

    #[tokio::test]
    async fn merge_mode_merges_object_children() {
        let store = InMemoryTreeStore::with_tree(json!({
            "data": { "widget": { "w1": { "a": 1, "b": 2 } } }
        }));
        store
            .batch_apply(
                &ws(&[("data/widget/w1", json!({ "b": 3, "c": 4 }))]),
                WriteMode::Merge,
            )
            .await
            .unwrap();
        assert_eq!(
            store.read("data/widget/w1").await.unwrap(),
            Some(json!({ "a": 1, "b": 3, "c": 4 }))
        );
    }

    #[tokio::test]
    async fn merge_mode_null_child_deletes_field() {
        let store = InMemoryTreeStore::with_tree(json!({
            "data": { "widget": { "w1": { "a": 1, "b": 2 } } }
        }));
        store
            .batch_apply(
                &ws(&[("data/widget/w1", json!({ "b": null }))]),
                WriteMode::Merge,
            )
            .await
            .unwrap();
        assert_eq!(
            store.read("data/widget/w1").await.unwrap(),
            Some(json!({ "a": 1 }))
        );
    }

    #[tokio::test]
    async fn delete_mode_replaces_objects() {
        let store = InMemoryTreeStore::with_tree(json!({
            "data": { "widget": { "w1": { "a": 1, "b": 2 } } }
        }));
        store
            .batch_apply(&ws(&[("data/widget/w1", json!({ "c": 3 }))]), WriteMode::Delete)
            .await
            .unwrap();
        assert_eq!(
            store.read("data/widget/w1").await.unwrap(),
            Some(json!({ "c": 3 }))
        );
    }

    #[tokio::test]
    async fn deleting_last_child_prunes_parents() {
        let store = InMemoryTreeStore::with_tree(json!({
            "owners": { "widget": { "w1": { "u1": 5 } } },
            "data": { "x": { "y": 1 } }
        }));
        store
            .batch_apply(&ws(&[("owners/widget/w1/u1", Value::Null)]), WriteMode::Delete)
            .await
            .unwrap();
        assert_eq!(store.snapshot().await, json!({ "data": { "x": { "y": 1 } } }));
    }

    #[tokio::test]
    async fn scalar_is_promoted_when_writing_below_it() {
        let store = InMemoryTreeStore::with_tree(json!({
            "connectionGraph": { "widget": { "w1": { "tag": { "t1": 5 } } } }
        }));
        store
            .batch_apply(
                &ws(&[("connectionGraph/widget/w1/tag/t1/updatedAt", json!(9))]),
                WriteMode::Merge,
            )
            .await
            .unwrap();
        assert_eq!(
            store.read("connectionGraph/widget/w1/tag/t1").await.unwrap(),
            Some(json!({ "updatedAt": 9 }))
        );
    }

    #[tokio::test]
    async fn root_write_is_refused_and_nothing_lands() {
        let store = InMemoryTreeStore::new();
        let result = store
            .batch_apply(&ws(&[("data/a", json!(1)), ("/", json!(2))]), WriteMode::Merge)
            .await;
        assert!(matches!(result, Err(StoreError::RootPath { .. })));
        assert_eq!(store.snapshot().await, json!({}));
    }

    // ----------------------------------------------------------------
    // History and failure injection
    // ----------------------------------------------------------------

    #[tokio::test]
    async fn history_records_batches_in_order() {
        let store = InMemoryTreeStore::new();
        store
            .batch_apply(&ws(&[("owners/a/b/c", json!(1))]), WriteMode::Merge)
            .await
            .unwrap();
        store
            .batch_apply(&ws(&[("data/a/b", json!({ "x": 1 }))]), WriteMode::Delete)
            .await
            .unwrap();
        let history = store.history().await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].mode, WriteMode::Merge);
        assert_eq!(history[1].paths, vec!["data/a/b".to_string()]);
    }

    #[tokio::test]
    async fn injected_failure_fires_once() {
        let store = InMemoryTreeStore::new();
        store.fail_on_apply(1);
        let batch = ws(&[("data/a/b", json!(1))]);
        assert!(store.batch_apply(&batch, WriteMode::Merge).await.is_ok());
        assert!(store.batch_apply(&batch, WriteMode::Merge).await.is_err());
        assert!(store.batch_apply(&batch, WriteMode::Merge).await.is_ok());
        assert_eq!(store.history().await.len(), 2);
    }

    // ----------------------------------------------------------------
    // Keys, push, transactions
    // ----------------------------------------------------------------

    #[tokio::test]
    async fn generated_keys_are_unique_and_ordered() {
        let store = InMemoryTreeStore::new();
        let a = store.generate_key("tracking").await.unwrap();
        let b = store.generate_key("tracking").await.unwrap();
        assert_ne!(a, b);
        assert!(paths::validate_segment(&a, "key").is_ok());
    }

    #[tokio::test]
    async fn push_stores_under_new_key() {
        let store = InMemoryTreeStore::new();
        let key = store.push("tracking", json!({ "uid": "u1" })).await.unwrap();
        assert_eq!(
            store.read(&format!("tracking/{key}")).await.unwrap(),
            Some(json!({ "uid": "u1" }))
        );
    }

    #[tokio::test]
    async fn transaction_applies_update() {
        let store = InMemoryTreeStore::with_tree(json!({ "data": { "c": { "k": { "n": 2 } } } }));
        let inc = |current: Option<Value>| {
            Some(json!(current.and_then(|v| v.as_i64()).unwrap_or(0) + 3))
        };
        let applied = store
            .run_with_optimistic_retry("data/c/k/n", &inc)
            .await
            .unwrap();
        assert_eq!(applied, Some(json!(5)));
        assert_eq!(store.read("data/c/k/n").await.unwrap(), Some(json!(5)));
    }

    #[tokio::test]
    async fn blob_store_deletes() {
        let blobs = InMemoryBlobStore::new();
        blobs.put("soilFile/u1/f1").await;
        blobs.delete_blob("soilFile/u1/f1").await.unwrap();
        blobs.delete_blob("soilFile/u1/missing").await.unwrap();
        assert!(!blobs.contains("soilFile/u1/f1").await);
    }
}
