use std::sync::Arc;

use serde_json::Value;
use soil_store::{TreeStore, WriteMode};
use soil_types::{paths, WriteSet};
use tracing::{debug, warn};

use crate::config::WriterConfig;
use crate::error::{WriterError, WriterResult};
use crate::group::{chunk, ordered_entries, ordered_groups, PathGroup};
use crate::queue::{BulkReport, RateLimitedQueue};

/// What a single `apply` sent to the store.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Groups applied, in order.
    pub groups: Vec<PathGroup>,
    /// Entries applied across all groups.
    pub entries: usize,
}

/// Applies write-sets as one logical, ordering-aware operation.
///
/// Each path-prefix group becomes one atomic store batch. Groups are sent in
/// [`PathGroup::order`] for the mode, so that readers never see data whose
/// gating grants are missing (merge), or grants that point at data already
/// gone for longer than one group (delete).
pub struct BatchedWriter<S: ?Sized> {
    store: Arc<S>,
    config: WriterConfig,
    queue: RateLimitedQueue,
}

impl<S: TreeStore + ?Sized> BatchedWriter<S> {
    pub fn new(store: Arc<S>, config: WriterConfig) -> WriterResult<Self> {
        let queue = RateLimitedQueue::new(&config)?;
        Ok(Self {
            store,
            config,
            queue,
        })
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Apply `writes` group by group in `mode` order.
    ///
    /// Stops at the first failing group and reports which groups already
    /// landed; nothing is retried here.
    pub async fn apply(&self, writes: &WriteSet, mode: WriteMode) -> WriterResult<ApplyReport> {
        let writes = self.expand_root(writes)?;
        let mut report = ApplyReport::default();

        for (group, batch) in ordered_groups(&writes, mode) {
            if let Err(source) = self.store.batch_apply(&batch, mode).await {
                return Err(WriterError::PartialBatch {
                    applied_groups: report.groups,
                    failed_group: group,
                    source,
                });
            }
            debug!(group = %group, mode = %mode, entries = batch.len(), "applied group");
            report.entries += batch.len();
            report.groups.push(group);
        }

        Ok(report)
    }

    /// Apply a large destructive write-set as a paced sequence of bounded
    /// batches.
    ///
    /// Entries are flattened in delete order before chunking so that later
    /// chunks only remove grants for data already cleared by earlier ones.
    /// This is not atomic: a failure leaves earlier chunks applied.
    pub async fn apply_bulk(&self, writes: &WriteSet) -> WriterResult<BulkReport> {
        let writes = self.expand_root(writes)?;
        let chunks = chunk(
            ordered_entries(&writes, WriteMode::Delete),
            self.config.max_ops_per_batch,
        );
        if chunks.len() > 1 {
            warn!(
                batches = chunks.len(),
                entries = writes.len(),
                "bulk write is split across batches and is not atomic"
            );
        }
        self.queue
            .run(self.store.as_ref(), &chunks, WriteMode::Delete)
            .await
    }

    /// Replace root-level entries with their top-level children, or refuse
    /// them when root writes are not enabled.
    fn expand_root(&self, writes: &WriteSet) -> WriterResult<WriteSet> {
        let Some(root_value) = writes.iter().find(|(p, _)| paths::is_root(p)).map(|(_, v)| v) else {
            return Ok(writes.clone());
        };
        if !self.config.allow_root {
            return Err(WriterError::RootPath);
        }
        let Value::Object(children) = root_value else {
            return Err(WriterError::InvalidRootValue(root_value.to_string()));
        };

        let mut expanded = WriteSet::new();
        for (child, value) in children {
            expanded.set(child, value.clone());
        }
        // Explicit paths win over the expanded root object.
        for (path, value) in writes.iter().filter(|(p, _)| !paths::is_root(p)) {
            expanded.set(path, value.clone());
        }
        Ok(expanded)
    }
}

impl<S: ?Sized> std::fmt::Debug for BatchedWriter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchedWriter")
            .field("config", &self.config)
            .field("queue", &self.queue)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use soil_store::InMemoryTreeStore;

    fn writer(store: &Arc<InMemoryTreeStore>) -> BatchedWriter<InMemoryTreeStore> {
        BatchedWriter::new(store.clone(), WriterConfig::permissive()).unwrap()
    }

    fn create_set() -> WriteSet {
        let mut ws = WriteSet::new();
        ws.set("data/widget/w1", json!({ "title": "a", "publicAccess": true }));
        ws.set("owners/widget/w1/u1", 1);
        ws.set("userOwnedLists/u1/widget/w1", 1);
        ws.set("publicLists/widget/w1", 1);
        ws.set("connectionGraph/widget/w1/tag/t1", 1);
        ws.set("connectionGraph/tag/t1/widget/w1", 1);
        ws
    }

    fn first_segments(batch: &soil_store::AppliedBatch) -> Vec<&str> {
        batch
            .paths
            .iter()
            .filter_map(|p| paths::segments(p).next())
            .collect()
    }

    // ---- merge mode ----

    #[tokio::test]
    async fn merge_applies_grants_before_data() {
        let store = Arc::new(InMemoryTreeStore::new());
        let report = writer(&store).apply(&create_set(), WriteMode::Merge).await.unwrap();
        assert_eq!(
            report.groups,
            vec![
                PathGroup::Ownership,
                PathGroup::PublicList,
                PathGroup::PrimaryData,
                PathGroup::ConnectionGraph,
            ]
        );
        assert_eq!(report.entries, 6);

        let history = store.history().await;
        assert_eq!(history.len(), 4);
        assert!(first_segments(&history[0]).iter().all(|s| *s == "owners" || *s == "userOwnedLists"));
        assert_eq!(first_segments(&history[2]), vec!["data"]);
    }

    // ---- delete mode ----

    #[tokio::test]
    async fn delete_clears_data_before_grants() {
        let store = Arc::new(InMemoryTreeStore::new());
        let w = writer(&store);
        w.apply(&create_set(), WriteMode::Merge).await.unwrap();
        store.clear_history().await;

        let teardown: WriteSet = create_set()
            .into_iter()
            .map(|(p, _)| (p, Value::Null))
            .collect();
        w.apply(&teardown, WriteMode::Delete).await.unwrap();

        let history = store.history().await;
        assert_eq!(first_segments(&history[0]), vec!["connectionGraph", "connectionGraph"]);
        assert_eq!(first_segments(&history[1]), vec!["data"]);
        assert_eq!(first_segments(&history[2]), vec!["publicLists"]);
        assert_eq!(first_segments(&history[3]), vec!["owners", "userOwnedLists"]);
        assert_eq!(store.snapshot().await, json!({}));
    }

    // ---- failures ----

    #[tokio::test]
    async fn failure_reports_partial_progress() {
        let store = Arc::new(InMemoryTreeStore::new());
        store.fail_on_apply(2);
        let err = writer(&store)
            .apply(&create_set(), WriteMode::Merge)
            .await
            .unwrap_err();
        match err {
            WriterError::PartialBatch {
                applied_groups,
                failed_group,
                ..
            } => {
                assert_eq!(applied_groups, vec![PathGroup::Ownership, PathGroup::PublicList]);
                assert_eq!(failed_group, PathGroup::PrimaryData);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // Ownership landed, data did not.
        assert!(store.read("owners/widget/w1/u1").await.unwrap().is_some());
        assert!(store.read("data/widget/w1").await.unwrap().is_none());
    }

    // ---- root handling ----

    #[tokio::test]
    async fn root_write_without_opt_in_is_refused() {
        let store = Arc::new(InMemoryTreeStore::new());
        let mut ws = WriteSet::new();
        ws.set("/", json!({ "data": null }));
        let err = writer(&store).apply(&ws, WriteMode::Merge).await.unwrap_err();
        assert!(matches!(err, WriterError::RootPath));
        assert!(store.history().await.is_empty());
    }

    #[tokio::test]
    async fn root_write_with_opt_in_is_expanded() {
        let store = Arc::new(InMemoryTreeStore::with_tree(json!({
            "tracking": { "k1": { "uid": "u1" } },
            "usernames": { "alice": "u1" }
        })));
        let config = WriterConfig {
            allow_root: true,
            ..WriterConfig::permissive()
        };
        let w = BatchedWriter::new(store.clone(), config).unwrap();
        let mut ws = WriteSet::new();
        ws.set("/", json!({ "tracking": null }));
        w.apply(&ws, WriteMode::Delete).await.unwrap();
        assert_eq!(store.snapshot().await, json!({ "usernames": { "alice": "u1" } }));
    }

    // ---- bulk ----

    #[tokio::test]
    async fn bulk_chunks_in_delete_order() {
        let store = Arc::new(InMemoryTreeStore::new());
        let config = WriterConfig {
            max_ops_per_batch: 2,
            ..WriterConfig::permissive()
        };
        let w = BatchedWriter::new(store.clone(), config).unwrap();
        w.apply(&create_set(), WriteMode::Merge).await.unwrap();
        store.clear_history().await;

        let teardown: WriteSet = create_set()
            .into_iter()
            .map(|(p, _)| (p, Value::Null))
            .collect();
        let report = w.apply_bulk(&teardown).await.unwrap();
        assert_eq!(report.batches, 3);
        assert_eq!(report.operations, 6);

        let history = store.history().await;
        assert!(history.iter().all(|b| b.mode == WriteMode::Delete));
        assert_eq!(first_segments(&history[0]), vec!["connectionGraph", "connectionGraph"]);
        assert_eq!(first_segments(&history[2]), vec!["owners", "userOwnedLists"]);
        assert_eq!(store.snapshot().await, json!({}));
    }
}
