//! Record lifecycle: create, update, upsert, remove, remove by type and
//! change of key.
//!
//! Every mutating operation has a `plan_*` form that only fills a
//! [`WriteSet`]. The plain form plans, applies through the batched writer
//! and returns what it applied.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Map, Value};
use soil_store::{TreeStore, WriteMode};
use soil_types::record::{
    is_reserved_field, CONNECTION_ACCESS, CREATED_AT, DELETED_AT, OWNERSHIP_ACCESS, PUBLIC_ACCESS,
    UPDATED_AT,
};
use soil_types::{
    paths, restamp_entry, ConnectionPair, DataKey, DataType, IndexTimes, RecordRef, TypeError, Uid,
    WriteSet,
};
use soil_writer::BulkReport;
use tracing::{debug, info, warn};

use crate::decode::{self, ConnectionList};
use crate::error::{EngineError, EngineResult};
use crate::params::{ChangeKeyReport, CreateParams, RemoveParams, UpdateParams, UpsertOutcome};
use crate::soil::Soil;

/// A payload field name. `nested` allows `a/b` paths, which only updates
/// can address; a create stores names as literal object keys.
pub(crate) fn check_field(name: &str, nested: bool) -> EngineResult<()> {
    if nested {
        paths::validate_field(name)?;
    } else {
        paths::validate_segment(name, "field")?;
    }
    let top = name.split('/').next().unwrap_or(name);
    if is_reserved_field(top) {
        return Err(EngineError::ReservedField(name.to_string()));
    }
    Ok(())
}

fn check_fields(data: &Map<String, Value>, nested: bool) -> EngineResult<()> {
    data.keys().try_for_each(|name| check_field(name, nested))
}

fn descriptor<T: Serialize>(access: Option<&T>) -> EngineResult<Value> {
    match access {
        Some(access) => Ok(serde_json::to_value(access).map_err(TypeError::from)?),
        None => Ok(Value::Null),
    }
}

impl<S: TreeStore + ?Sized> Soil<S> {
    // -----------------------------------------------------------------------
    // create
    // -----------------------------------------------------------------------

    /// Plan a new record with its owner pairs, connection mirrors and public
    /// entry. Existing records at the same coordinates are overwritten
    /// field by field; use [`Soil::upsert`] to keep `createdAt`.
    pub fn plan_create(&self, writes: &mut WriteSet, record: &RecordRef, params: &CreateParams) -> EngineResult<()> {
        check_fields(&params.data, false)?;
        let schema = self.schemas().get(&record.data_type)?;
        if schema.requires_public_access() && !params.public_access {
            return Err(EngineError::PublicAccessRequired(record.data_type.clone()));
        }
        schema.validate_create(&params.data)?;

        let (t, k) = (&record.data_type, &record.data_key);
        let times = params.times;

        self.plan_add_owners(writes, record, &params.owners, times.ownership_now);

        let mut fields = params.data.clone();
        fields.insert(CREATED_AT.into(), params.created_at.unwrap_or(times.now).into());
        fields.insert(UPDATED_AT.into(), times.now.into());
        fields.insert(PUBLIC_ACCESS.into(), params.public_access.into());
        fields.insert(
            CONNECTION_ACCESS.into(),
            descriptor(params.connection_access.as_ref())?,
        );
        fields.insert(
            OWNERSHIP_ACCESS.into(),
            descriptor(params.ownership_access.as_ref())?,
        );
        writes.set(paths::data_key(t, k), Value::Object(fields));

        let pairs: Vec<ConnectionPair> = params
            .connections
            .iter()
            .map(|connection| ConnectionPair::new(record, connection))
            .collect();
        self.plan_create_connections(writes, &pairs, times.connection_now);

        if params.public_access {
            writes.set(paths::public_entry(t, k), times.public_now);
        } else {
            writes.clear(paths::public_entry(t, k));
        }
        Ok(())
    }

    pub async fn create(&self, record: &RecordRef, params: CreateParams) -> EngineResult<WriteSet> {
        let mut writes = WriteSet::new();
        self.plan_create(&mut writes, record, &params)?;
        self.apply(&writes, WriteMode::Merge).await?;
        debug!(record = %record, entries = writes.len(), "created record");
        Ok(writes)
    }

    // -----------------------------------------------------------------------
    // update
    // -----------------------------------------------------------------------

    /// Plan a field-level update.
    ///
    /// Unless refreshing is turned off this reads the record's current
    /// owners, connections and public flag, and re-stamps every index entry
    /// that points at it. Those reads are not isolated from concurrent
    /// writers; every entry they produce is an idempotent timestamp.
    pub async fn plan_update(&self, writes: &mut WriteSet, record: &RecordRef, params: &UpdateParams) -> EngineResult<()> {
        check_fields(&params.data, true)?;
        if params.public_access == Some(false)
            && self.schemas().get(&record.data_type)?.requires_public_access()
        {
            return Err(EngineError::PublicAccessRequired(record.data_type.clone()));
        }

        let (t, k) = (&record.data_type, &record.data_key);
        let times = params.times;
        let refresh = params.refresh;

        let existing_owners = async {
            if refresh.owners {
                self.get_owners(record).await.map(Some)
            } else {
                Ok(None)
            }
        };
        let existing_connections = async {
            if refresh.connections {
                self.get_all_connections(record).await.map(Some)
            } else {
                Ok(None)
            }
        };
        let already_public = async {
            if refresh.public && params.public_access.is_none() {
                let flag = self.get_field(record, PUBLIC_ACCESS).await?;
                Ok::<_, EngineError>(flag == Some(Value::Bool(true)))
            } else {
                Ok(false)
            }
        };
        let (existing_owners, existing_connections, already_public) =
            futures::try_join!(existing_owners, existing_connections, already_public)?;

        for (name, value) in &params.data {
            writes.set(paths::data_field(t, k, name), value.clone());
        }
        if params.include_updated_at {
            writes.set(paths::data_field(t, k, UPDATED_AT), times.now);
        }
        if let Some(access) = &params.connection_access {
            writes.set(paths::data_field(t, k, CONNECTION_ACCESS), descriptor(Some(access))?);
        }
        if let Some(access) = &params.ownership_access {
            writes.set(paths::data_field(t, k, OWNERSHIP_ACCESS), descriptor(Some(access))?);
        }

        if let Some(owners) = existing_owners {
            self.plan_add_owners(writes, record, &owners, times.ownership_now);
        }
        self.plan_add_owners(writes, record, &params.owners, times.ownership_now);

        if let Some(list) = existing_connections {
            self.plan_refresh_connections(writes, record, &list, times.connection_now)
                .await?;
        }
        let pairs: Vec<ConnectionPair> = params
            .connections
            .iter()
            .map(|connection| ConnectionPair::new(record, connection))
            .collect();
        self.plan_create_connections(writes, &pairs, times.connection_now);

        match params.public_access {
            Some(true) => {
                writes.set(paths::data_field(t, k, PUBLIC_ACCESS), true);
                writes.set(paths::public_entry(t, k), times.public_now);
            }
            Some(false) => {
                writes.set(paths::data_field(t, k, PUBLIC_ACCESS), false);
                writes.clear(paths::public_entry(t, k));
            }
            None if already_public => {
                writes.set(paths::public_entry(t, k), times.public_now);
            }
            None => {}
        }
        Ok(())
    }

    pub async fn update(&self, record: &RecordRef, params: UpdateParams) -> EngineResult<WriteSet> {
        let mut writes = WriteSet::new();
        self.plan_update(&mut writes, record, &params).await?;
        self.apply(&writes, WriteMode::Merge).await?;
        debug!(record = %record, entries = writes.len(), "updated record");
        Ok(writes)
    }

    // -----------------------------------------------------------------------
    // upsert
    // -----------------------------------------------------------------------

    /// Create the record, or update it if it already has a `createdAt`.
    ///
    /// Not atomic against a competing upsert of the same record.
    pub async fn upsert(&self, record: &RecordRef, params: CreateParams) -> EngineResult<UpsertOutcome> {
        if self.get_field(record, CREATED_AT).await?.is_some() {
            Ok(UpsertOutcome::Updated(self.update(record, params.into()).await?))
        } else {
            Ok(UpsertOutcome::Created(self.create(record, params).await?))
        }
    }

    // -----------------------------------------------------------------------
    // remove
    // -----------------------------------------------------------------------

    /// Plan the full teardown of one record.
    ///
    /// Returns the locator of the blob that must be deleted once the plan
    /// has been applied, if the record's type stores one.
    pub async fn plan_remove(
        &self,
        writes: &mut WriteSet,
        record: &RecordRef,
        params: &RemoveParams,
    ) -> EngineResult<Option<String>> {
        let schema = self.schemas().get(&record.data_type)?;
        if schema.stores_blobs() && self.blob_store().is_none() {
            return Err(EngineError::MissingBlobStore(record.data_type.clone()));
        }

        let owners = async {
            match &params.existing_owners {
                Some(owners) => Ok(owners.clone()),
                None => self.get_owners(record).await,
            }
        };
        let targets = async {
            match &params.existing_connections {
                Some(targets) => Ok(targets.clone()),
                None => self
                    .get_all_connections(record)
                    .await
                    .map(|list| decode::connection_targets(&list)),
            }
        };
        let stored = async {
            if schema.stores_blobs() {
                self.get_record(record).await
            } else {
                Ok(None)
            }
        };
        let (owners, targets, stored) = futures::try_join!(owners, targets, stored)?;

        self.plan_teardown(writes, record, &owners, &targets);
        Ok(stored.and_then(|stored| schema.blob_locator(&record.data_key, &stored)))
    }

    /// Clear the record, its connection subtree, every mirror pointing at
    /// it, its public entry and its owner pairs.
    fn plan_teardown(&self, writes: &mut WriteSet, record: &RecordRef, owners: &[Uid], targets: &[RecordRef]) {
        let (t, k) = (&record.data_type, &record.data_key);
        for target in targets.iter().filter(|target| *target != record) {
            writes.clear(paths::connection_entry(&target.data_type, &target.data_key, t, k));
        }
        writes.clear(paths::connection_key(t, k));
        writes.clear(paths::data_key(t, k));
        writes.clear(paths::public_entry(t, k));
        self.plan_remove_owners(writes, record, owners);
    }

    pub async fn remove(&self, record: &RecordRef, params: RemoveParams) -> EngineResult<WriteSet> {
        let mut writes = WriteSet::new();
        let locator = self.plan_remove(&mut writes, record, &params).await?;
        self.apply(&writes, WriteMode::Delete).await?;

        if let (Some(locator), Some(blobs)) = (locator, self.blob_store()) {
            blobs.delete_blob(&locator).await?;
            debug!(record = %record, locator = %locator, "deleted blob");
        }
        info!(record = %record, entries = writes.len(), "removed record");
        Ok(writes)
    }

    // -----------------------------------------------------------------------
    // remove by type
    // -----------------------------------------------------------------------

    /// Plan the teardown of every record of a type and every index entry
    /// that refers to one. Returns the blob locators to delete afterwards.
    pub async fn plan_remove_data_type(&self, writes: &mut WriteSet, data_type: &DataType) -> EngineResult<Vec<String>> {
        let schema = self.schemas().get(data_type)?;
        if schema.stores_blobs() && self.blob_store().is_none() {
            return Err(EngineError::MissingBlobStore(data_type.clone()));
        }

        let records = async {
            if schema.stores_blobs() {
                self.get_data_type(data_type).await
            } else {
                Ok(Vec::new())
            }
        };
        let (owners, connections, records) = futures::try_join!(
            self.get_owners_by_type(data_type),
            self.get_all_connections_by_type(data_type),
            records
        )?;

        // Same-type mirrors go with the connectionGraph/{t} subtree.
        for (key, list) in &connections {
            for target in decode::connection_targets(list) {
                if target.data_type != *data_type {
                    writes.clear(paths::connection_entry(
                        &target.data_type,
                        &target.data_key,
                        data_type,
                        key,
                    ));
                }
            }
        }
        writes.clear(paths::connection_type(data_type));
        writes.clear(paths::data_type(data_type));
        writes.clear(paths::public_type_list(data_type));
        writes.clear(paths::owners_type(data_type));

        let uids: BTreeSet<&Uid> = owners.values().flatten().collect();
        for uid in uids {
            writes.clear(paths::user_type_list(uid, data_type));
        }

        Ok(records
            .iter()
            .filter_map(|keyed| schema.blob_locator(&keyed.key, &keyed.record))
            .collect())
    }

    /// Irreversibly remove every record of a type.
    ///
    /// The teardown is sent as a paced sequence of bounded batches and is
    /// not atomic: a failure part way leaves the type partially deleted.
    pub async fn remove_data_type(&self, data_type: &DataType) -> EngineResult<BulkReport> {
        let mut writes = WriteSet::new();
        let locators = self.plan_remove_data_type(&mut writes, data_type).await?;
        warn!(data_type = %data_type, entries = writes.len(), "removing every record of type");

        let report = self.writer().apply_bulk(&writes).await?;

        if let Some(blobs) = self.blob_store() {
            for locator in &locators {
                blobs.delete_blob(locator).await?;
            }
        }
        info!(
            data_type = %data_type,
            batches = report.batches,
            operations = report.operations,
            blobs = locators.len(),
            "removed data type"
        );
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // change key
    // -----------------------------------------------------------------------

    /// Move a record to new coordinates, keeping its data, owners,
    /// connections and access descriptors.
    ///
    /// The new record and the old teardown go out as one write-set, so the
    /// record is never absent from both places. Blobs are not moved.
    pub async fn change_data_key(
        &self,
        from: &RecordRef,
        new_type: Option<DataType>,
        new_key: DataKey,
    ) -> EngineResult<ChangeKeyReport> {
        let to = RecordRef::new(new_type.unwrap_or_else(|| from.data_type.clone()), new_key);
        if *from == to {
            return Err(EngineError::SameCoordinates(to));
        }

        let target_path = paths::data_key(&to.data_type, &to.data_key);
        let (existing, owners, connections, occupied) = futures::try_join!(
            self.get_record(from),
            self.get_owners(from),
            self.get_all_connections(from),
            self.read(&target_path),
        )?;
        let existing = existing.ok_or_else(|| EngineError::RecordNotFound(from.clone()))?;
        if occupied.is_some() {
            return Err(EngineError::TargetExists(to));
        }

        let mut data = existing.fields.clone();
        if let Some(deleted_at) = existing.deleted_at {
            data.insert(DELETED_AT.into(), deleted_at.into());
        }
        let times = IndexTimes::now();
        let mut params = CreateParams::new()
            .data(data)
            .owners(owners.iter().cloned())
            .public(existing.public_access)
            .times(times);
        params.connection_access = existing.connection_access.clone();
        params.ownership_access = existing.ownership_access.clone();
        params.created_at = existing.created_at;

        let mut writes = WriteSet::new();
        self.plan_create(&mut writes, &to, &params)?;
        let targets = self
            .plan_moved_connections(&mut writes, from, &to, &connections, times)
            .await?;
        self.plan_teardown(&mut writes, from, &owners, &targets);

        self.apply(&writes, WriteMode::Delete).await?;
        info!(from = %from, to = %to, entries = writes.len(), "changed record key");
        Ok(ChangeKeyReport {
            owners,
            connections: targets,
            write_set: writes,
        })
    }

    /// Re-create each edge of `from` at `to`, keeping the payload of both
    /// mirrored entries. Edges from a record to itself follow it.
    async fn plan_moved_connections(
        &self,
        writes: &mut WriteSet,
        from: &RecordRef,
        to: &RecordRef,
        list: &ConnectionList,
        times: IndexTimes,
    ) -> EngineResult<Vec<RecordRef>> {
        let targets = decode::connection_targets(list);
        let mirrors = self.read_mirrors(from, targets.iter()).await?;
        let ts = times.connection_now;

        for (target, mirror) in targets.iter().zip(mirrors) {
            let entry = list
                .get(&target.data_type)
                .and_then(|entries| entries.get(&target.data_key));
            let moved = if target == from { to } else { target };
            writes.set(
                paths::connection_entry(&to.data_type, &to.data_key, &moved.data_type, &moved.data_key),
                restamp_entry(entry, ts),
            );
            if moved != to {
                writes.set(
                    paths::connection_entry(&moved.data_type, &moved.data_key, &to.data_type, &to.data_key),
                    restamp_entry(mirror.as_ref(), ts),
                );
            }
        }
        Ok(targets)
    }
}
