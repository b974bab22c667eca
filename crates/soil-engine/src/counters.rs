//! Read-modify-write of single record fields.

use serde_json::Value;
use soil_store::TreeStore;
use soil_types::{paths, RecordRef};

use crate::error::EngineResult;
use crate::lifecycle::check_field;
use crate::params::UpdateParams;
use crate::soil::Soil;

impl<S: TreeStore + ?Sized> Soil<S> {
    /// Apply `update` to one payload field under the store's optimistic
    /// retry, then touch the record so `updatedAt` and its index stamps
    /// move with it.
    ///
    /// `update` may run more than once. Returns the value finally stored.
    pub async fn transact_field<F>(&self, record: &RecordRef, field: &str, update: F) -> EngineResult<Option<Value>>
    where
        F: Fn(Option<Value>) -> Option<Value> + Send + Sync,
    {
        check_field(field, true)?;
        let path = paths::data_field(&record.data_type, &record.data_key, field);
        let applied = self.store().run_with_optimistic_retry(&path, &update).await?;
        self.update(record, UpdateParams::new()).await?;
        Ok(applied)
    }

    /// Add `delta` to a numeric field, treating a missing or non-integer
    /// value as zero. The sum saturates at the `i64` bounds.
    pub async fn increment(&self, record: &RecordRef, field: &str, delta: i64) -> EngineResult<i64> {
        let applied = self
            .transact_field(record, field, move |current| {
                let n = current.as_ref().and_then(Value::as_i64).unwrap_or(0);
                Some(Value::from(n.saturating_add(delta)))
            })
            .await?;
        Ok(applied.as_ref().and_then(Value::as_i64).unwrap_or(0))
    }
}
