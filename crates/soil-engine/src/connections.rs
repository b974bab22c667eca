//! Connection graph: every edge is stored twice, once under each endpoint
//! at `connectionGraph/{t}/{k}/{ct}/{ck}`.

use std::collections::BTreeMap;

use futures::future::{join_all, try_join_all};
use serde_json::Value;
use soil_store::{TreeStore, WriteMode};
use soil_types::{paths, restamp_entry, ConnectionPair, DataKey, DataType, RecordRef, Timestamp, WriteSet};
use tracing::debug;

use crate::decode::{self, ConnectionList};
use crate::error::EngineResult;
use crate::read::KeyedRecord;
use crate::soil::Soil;

/// Path of the entry stored under `at` for its edge to `other`.
fn entry_path(at: &RecordRef, other: &RecordRef) -> String {
    paths::connection_entry(&at.data_type, &at.data_key, &other.data_type, &other.data_key)
}

impl<S: TreeStore + ?Sized> Soil<S> {
    /// Add both mirrored entries of each pair to `writes`.
    pub fn plan_create_connections(&self, writes: &mut WriteSet, pairs: &[ConnectionPair], ts: Timestamp) {
        for pair in pairs {
            let (source, target) = (pair.source(), pair.target());
            writes.set(entry_path(&source, &target), pair.source_entry(ts));
            writes.set(entry_path(&target, &source), pair.target_entry(ts));
        }
    }

    /// Clear both mirrored entries of each pair in `writes`.
    pub fn plan_remove_connections(&self, writes: &mut WriteSet, pairs: &[ConnectionPair]) {
        for pair in pairs {
            let (source, target) = (pair.source(), pair.target());
            writes.clear(entry_path(&source, &target));
            writes.clear(entry_path(&target, &source));
        }
    }

    pub async fn create_connections(&self, pairs: &[ConnectionPair], ts: Timestamp) -> EngineResult<WriteSet> {
        let mut writes = WriteSet::new();
        self.plan_create_connections(&mut writes, pairs, ts);
        self.apply(&writes, WriteMode::Merge).await?;
        debug!(pairs = pairs.len(), "created connections");
        Ok(writes)
    }

    pub async fn remove_connections(&self, pairs: &[ConnectionPair]) -> EngineResult<WriteSet> {
        let mut writes = WriteSet::new();
        self.plan_remove_connections(&mut writes, pairs);
        self.apply(&writes, WriteMode::Delete).await?;
        debug!(pairs = pairs.len(), "removed connections");
        Ok(writes)
    }

    /// Re-stamp every edge in `list`, on both sides, keeping payloads.
    ///
    /// The mirrored entries are read in parallel so that a payload carried
    /// only on the far side survives.
    pub(crate) async fn plan_refresh_connections(
        &self,
        writes: &mut WriteSet,
        record: &RecordRef,
        list: &ConnectionList,
        ts: Timestamp,
    ) -> EngineResult<()> {
        let edges: Vec<(RecordRef, &Value)> = list
            .iter()
            .flat_map(|(connection_type, entries)| {
                entries.iter().map(move |(key, entry)| {
                    (RecordRef::new(connection_type.clone(), key.clone()), entry)
                })
            })
            .collect();
        let mirrors = self.read_mirrors(record, edges.iter().map(|(target, _)| target)).await?;

        for ((target, entry), mirror) in edges.iter().zip(mirrors) {
            writes.set(entry_path(record, target), restamp_entry(Some(entry), ts));
            if target != record {
                writes.set(entry_path(target, record), restamp_entry(mirror.as_ref(), ts));
            }
        }
        Ok(())
    }

    /// Entries stored under each target for its edge back to `record`.
    pub(crate) async fn read_mirrors<'a>(
        &self,
        record: &RecordRef,
        targets: impl Iterator<Item = &'a RecordRef>,
    ) -> EngineResult<Vec<Option<Value>>> {
        let mirror_paths: Vec<String> = targets.map(|target| entry_path(target, record)).collect();
        try_join_all(mirror_paths.iter().map(|path| self.read(path))).await
    }

    /// Every connection of one record.
    pub async fn get_all_connections(&self, record: &RecordRef) -> EngineResult<ConnectionList> {
        let path = paths::connection_key(&record.data_type, &record.data_key);
        decode::connection_list(&path, self.read(&path).await?)
    }

    /// Connection lists of every record of a type that has any.
    pub async fn get_all_connections_by_type(
        &self,
        data_type: &DataType,
    ) -> EngineResult<BTreeMap<DataKey, ConnectionList>> {
        let path = paths::connection_type(data_type);
        decode::children(&path, self.read(&path).await?)?
            .into_iter()
            .map(|(key, list)| {
                let list = decode::connection_list(&format!("{path}/{key}"), Some(list))?;
                Ok((DataKey::new(key)?, list))
            })
            .collect()
    }

    /// Keys of `connection_type` connected to `record`, most recent first.
    pub async fn get_connection_type_keys(
        &self,
        record: &RecordRef,
        connection_type: &DataType,
    ) -> EngineResult<Vec<DataKey>> {
        let path = paths::connection_list(&record.data_type, &record.data_key, connection_type);
        decode::keys_by_recency(&path, self.read(&path).await?)
    }

    /// Records of `connection_type` connected to `record`. Edges pointing at
    /// missing records are skipped.
    pub async fn get_connection_type_data(
        &self,
        record: &RecordRef,
        connection_type: &DataType,
    ) -> EngineResult<Vec<KeyedRecord>> {
        let keys = self.get_connection_type_keys(record, connection_type).await?;
        self.fetch_records(connection_type, keys).await
    }

    /// For each record of `connection_type` connected to `record`, that
    /// record's own connections.
    pub async fn get_connection_type_connections(
        &self,
        record: &RecordRef,
        connection_type: &DataType,
    ) -> EngineResult<BTreeMap<DataKey, ConnectionList>> {
        let keys = self.get_connection_type_keys(record, connection_type).await?;
        let lists = join_all(keys.iter().map(|key| {
            let neighbour = RecordRef::new(connection_type.clone(), key.clone());
            async move { self.get_all_connections(&neighbour).await }
        }))
        .await;

        keys.into_iter()
            .zip(lists)
            .map(|(key, list)| Ok((key, list?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use soil_store::{TreeStore, WriteMode};
    use soil_types::{Connection, ConnectionPair, Direction, Timestamp, WriteSet};

    use crate::decode::connection_targets;
    use crate::test_support::{engine, rec, t};

    fn pair(from: (&str, &str), to: (&str, &str)) -> ConnectionPair {
        let target = rec(to.0, to.1);
        ConnectionPair::new(
            &rec(from.0, from.1),
            &Connection::new(target.data_type, target.data_key),
        )
    }

    #[tokio::test]
    async fn edges_are_mirrored() {
        let (_, soil) = engine();
        soil.create_connections(&[pair(("widget", "w1"), ("tag", "t1"))], Timestamp(3))
            .await
            .unwrap();

        let from_widget = soil.get_all_connections(&rec("widget", "w1")).await.unwrap();
        let from_tag = soil.get_all_connections(&rec("tag", "t1")).await.unwrap();
        assert_eq!(connection_targets(&from_widget), [rec("tag", "t1")]);
        assert_eq!(connection_targets(&from_tag), [rec("widget", "w1")]);
    }

    #[tokio::test]
    async fn removing_an_edge_clears_both_mirrors() {
        let (store, soil) = engine();
        let edge = pair(("widget", "w1"), ("tag", "t1"));
        soil.create_connections(&[edge.clone()], Timestamp(3)).await.unwrap();
        soil.remove_connections(&[edge]).await.unwrap();

        let tree = store.snapshot().await;
        assert!(tree.get("connectionGraph").is_none());
    }

    #[tokio::test]
    async fn directional_payload_lands_on_one_side() {
        let (store, soil) = engine();
        let data = json!({ "label": "primary" }).as_object().unwrap().clone();
        let edge = ConnectionPair::new(
            &rec("widget", "w1"),
            &Connection::new(t("tag"), rec("tag", "t1").data_key).with_payload(data, Direction::Target),
        );
        soil.create_connections(&[edge], Timestamp(3)).await.unwrap();

        let tree = store.snapshot().await;
        assert_eq!(tree["connectionGraph"]["widget"]["w1"]["tag"]["t1"], json!(3));
        assert_eq!(
            tree["connectionGraph"]["tag"]["t1"]["widget"]["w1"],
            json!({ "label": "primary", "updatedAt": 3 })
        );
    }

    #[tokio::test]
    async fn refresh_keeps_far_side_payload() {
        let (store, soil) = engine();
        let data = json!({ "label": "primary" }).as_object().unwrap().clone();
        let widget = rec("widget", "w1");
        let edge = ConnectionPair::new(
            &widget,
            &Connection::new(t("tag"), rec("tag", "t1").data_key).with_payload(data, Direction::Target),
        );
        soil.create_connections(&[edge], Timestamp(3)).await.unwrap();

        let list = soil.get_all_connections(&widget).await.unwrap();
        let mut writes = WriteSet::new();
        soil.plan_refresh_connections(&mut writes, &widget, &list, Timestamp(9))
            .await
            .unwrap();
        assert_eq!(
            writes.get("connectionGraph/tag/t1/widget/w1"),
            Some(&json!({ "label": "primary", "updatedAt": 9 }))
        );
        assert_eq!(writes.get("connectionGraph/widget/w1/tag/t1"), Some(&json!(9)));
        // planning alone writes nothing
        assert_eq!(
            store.snapshot().await["connectionGraph"]["widget"]["w1"]["tag"]["t1"],
            json!(3)
        );
    }

    #[tokio::test]
    async fn one_hop_data_skips_missing_records() {
        let (store, soil) = engine();
        let widget = rec("widget", "w1");
        soil.create_connections(
            &[pair(("widget", "w1"), ("tag", "t1")), pair(("widget", "w1"), ("tag", "t2"))],
            Timestamp(3),
        )
        .await
        .unwrap();
        let mut writes = WriteSet::new();
        writes.set("data/tag/t1", json!({ "createdAt": 1, "name": "red" }));
        store.batch_apply(&writes, WriteMode::Merge).await.unwrap();

        let keys = soil.get_connection_type_keys(&widget, &t("tag")).await.unwrap();
        assert_eq!(keys.len(), 2);
        let data = soil.get_connection_type_data(&widget, &t("tag")).await.unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].key.as_str(), "t1");
        assert_eq!(data[0].record.field("name"), Some(&json!("red")));
    }

    #[tokio::test]
    async fn two_hop_connections() {
        let (_, soil) = engine();
        soil.create_connections(
            &[
                pair(("widget", "w1"), ("tag", "t1")),
                pair(("tag", "t1"), ("widget", "w2")),
            ],
            Timestamp(3),
        )
        .await
        .unwrap();

        let hops = soil
            .get_connection_type_connections(&rec("widget", "w1"), &t("tag"))
            .await
            .unwrap();
        let t1 = &hops[&rec("tag", "t1").data_key];
        assert_eq!(
            connection_targets(t1),
            [rec("widget", "w1"), rec("widget", "w2")]
        );
    }
}
