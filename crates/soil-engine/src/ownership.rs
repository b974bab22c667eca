//! Ownership index: `owners/{t}/{k}/{uid}` mirrored by
//! `userOwnedLists/{uid}/{t}/{k}`.
//!
//! The two entries of a pair are always written and cleared together.

use std::collections::BTreeMap;

use soil_store::{TreeStore, WriteMode};
use soil_types::{paths, DataKey, DataType, RecordRef, Timestamp, Uid, WriteSet};
use tracing::debug;

use crate::decode;
use crate::error::EngineResult;
use crate::read::KeyedRecord;
use crate::soil::Soil;

impl<S: TreeStore + ?Sized> Soil<S> {
    /// Add both entries of each owner pair to `writes`.
    pub fn plan_add_owners(&self, writes: &mut WriteSet, record: &RecordRef, owners: &[Uid], ts: Timestamp) {
        let (t, k) = (&record.data_type, &record.data_key);
        for uid in owners {
            writes.set(paths::owner(t, k, uid), ts);
            writes.set(paths::user_list_entry(uid, t, k), ts);
        }
    }

    /// Clear both entries of each owner pair in `writes`.
    pub fn plan_remove_owners(&self, writes: &mut WriteSet, record: &RecordRef, owners: &[Uid]) {
        let (t, k) = (&record.data_type, &record.data_key);
        for uid in owners {
            writes.clear(paths::owner(t, k, uid));
            writes.clear(paths::user_list_entry(uid, t, k));
        }
    }

    pub async fn add_owners(&self, record: &RecordRef, owners: &[Uid], ts: Timestamp) -> EngineResult<WriteSet> {
        let mut writes = WriteSet::new();
        self.plan_add_owners(&mut writes, record, owners, ts);
        self.apply(&writes, WriteMode::Merge).await?;
        debug!(record = %record, owners = owners.len(), "added owners");
        Ok(writes)
    }

    pub async fn remove_owners(&self, record: &RecordRef, owners: &[Uid]) -> EngineResult<WriteSet> {
        let mut writes = WriteSet::new();
        self.plan_remove_owners(&mut writes, record, owners);
        self.apply(&writes, WriteMode::Delete).await?;
        debug!(record = %record, owners = owners.len(), "removed owners");
        Ok(writes)
    }

    pub async fn get_owners(&self, record: &RecordRef) -> EngineResult<Vec<Uid>> {
        let path = paths::owners_key(&record.data_type, &record.data_key);
        decode::owners(&path, self.read(&path).await?)
    }

    pub async fn is_owner(&self, record: &RecordRef, uid: &Uid) -> EngineResult<bool> {
        let path = paths::owner(&record.data_type, &record.data_key, uid);
        Ok(self.read(&path).await?.is_some())
    }

    /// Owner sets of every record of a type that has any.
    pub async fn get_owners_by_type(&self, data_type: &DataType) -> EngineResult<BTreeMap<DataKey, Vec<Uid>>> {
        let path = paths::owners_type(data_type);
        decode::children(&path, self.read(&path).await?)?
            .into_iter()
            .map(|(key, owners)| {
                let owners = decode::owners(&format!("{path}/{key}"), Some(owners))?;
                Ok((DataKey::new(key)?, owners))
            })
            .collect()
    }

    /// Keys of a type owned by `uid`, most recently stamped first.
    pub async fn get_user_type_keys(&self, uid: &Uid, data_type: &DataType) -> EngineResult<Vec<DataKey>> {
        let path = paths::user_type_list(uid, data_type);
        decode::keys_by_recency(&path, self.read(&path).await?)
    }

    /// Records of a type owned by `uid`, fetched in parallel.
    pub async fn get_user_type_data(&self, uid: &Uid, data_type: &DataType) -> EngineResult<Vec<KeyedRecord>> {
        let keys = self.get_user_type_keys(uid, data_type).await?;
        self.fetch_records(data_type, keys).await
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::{engine, rec, uid};
    use soil_types::Timestamp;

    #[tokio::test]
    async fn owner_pairs_are_symmetric() {
        let (_, soil) = engine();
        let record = rec("widget", "w1");
        let owners = [uid("u1"), uid("u2")];
        soil.add_owners(&record, &owners, Timestamp(5)).await.unwrap();

        assert_eq!(soil.get_owners(&record).await.unwrap(), owners);
        for owner in &owners {
            assert!(soil.is_owner(&record, owner).await.unwrap());
            let keys = soil
                .get_user_type_keys(owner, &record.data_type)
                .await
                .unwrap();
            assert_eq!(keys, [record.data_key.clone()]);
        }
    }

    #[tokio::test]
    async fn removing_an_owner_clears_both_sides() {
        let (store, soil) = engine();
        let record = rec("widget", "w1");
        soil.add_owners(&record, &[uid("u1"), uid("u2")], Timestamp(5))
            .await
            .unwrap();
        soil.remove_owners(&record, &[uid("u1")]).await.unwrap();

        assert_eq!(soil.get_owners(&record).await.unwrap(), [uid("u2")]);
        let tree = store.snapshot().await;
        assert!(tree["userOwnedLists"].get("u1").is_none());
        assert!(tree["userOwnedLists"]["u2"]["widget"].get("w1").is_some());
    }

    #[tokio::test]
    async fn user_keys_newest_first() {
        let (_, soil) = engine();
        let owner = uid("u1");
        soil.add_owners(&rec("widget", "old"), &[owner.clone()], Timestamp(1))
            .await
            .unwrap();
        soil.add_owners(&rec("widget", "new"), &[owner.clone()], Timestamp(2))
            .await
            .unwrap();

        let keys = soil
            .get_user_type_keys(&owner, &rec("widget", "x").data_type)
            .await
            .unwrap();
        let keys: Vec<&str> = keys.iter().map(|k| k.as_str()).collect();
        assert_eq!(keys, ["new", "old"]);
    }

    #[tokio::test]
    async fn owners_by_type_groups_per_key() {
        let (_, soil) = engine();
        soil.add_owners(&rec("widget", "a"), &[uid("u1")], Timestamp(1))
            .await
            .unwrap();
        soil.add_owners(&rec("widget", "b"), &[uid("u1"), uid("u2")], Timestamp(1))
            .await
            .unwrap();

        let by_type = soil
            .get_owners_by_type(&rec("widget", "a").data_type)
            .await
            .unwrap();
        assert_eq!(by_type.len(), 2);
        assert_eq!(by_type.values().map(Vec::len).sum::<usize>(), 3);
    }
}
