//! Record readers.

use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use soil_store::TreeStore;
use soil_types::{paths, DataKey, DataType, Record, RecordRef};

use crate::decode;
use crate::error::EngineResult;
use crate::soil::Soil;

/// A record together with its key.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct KeyedRecord {
    pub key: DataKey,
    pub record: Record,
}

impl<S: TreeStore + ?Sized> Soil<S> {
    /// The record at `data/{t}/{k}`, or `None` if it does not exist.
    pub async fn get_record(&self, record: &RecordRef) -> EngineResult<Option<Record>> {
        let path = paths::data_key(&record.data_type, &record.data_key);
        match self.read(&path).await? {
            Some(value) => Ok(Some(Record::from_value(&path, value)?)),
            None => Ok(None),
        }
    }

    pub async fn get_field(&self, record: &RecordRef, field: &str) -> EngineResult<Option<Value>> {
        self.read(&paths::data_field(&record.data_type, &record.data_key, field))
            .await
    }

    /// Every record of a type, in key order.
    pub async fn get_data_type(&self, data_type: &DataType) -> EngineResult<Vec<KeyedRecord>> {
        let path = paths::data_type(data_type);
        decode::children(&path, self.read(&path).await?)?
            .into_iter()
            .map(|(key, value)| {
                let key = DataKey::new(key)?;
                let record = Record::from_value(&format!("{path}/{key}"), value)?;
                Ok(KeyedRecord { key, record })
            })
            .collect()
    }

    /// Keys listed as public for a type, most recently stamped first.
    pub async fn get_public_type_keys(&self, data_type: &DataType) -> EngineResult<Vec<DataKey>> {
        let path = paths::public_type_list(data_type);
        decode::keys_by_recency(&path, self.read(&path).await?)
    }

    pub async fn get_public_type_data(&self, data_type: &DataType) -> EngineResult<Vec<KeyedRecord>> {
        let keys = self.get_public_type_keys(data_type).await?;
        self.fetch_records(data_type, keys).await
    }

    /// Fetch each listed record in parallel, keeping the listing order and
    /// skipping keys whose record is gone.
    pub(crate) async fn fetch_records(
        &self,
        data_type: &DataType,
        keys: Vec<DataKey>,
    ) -> EngineResult<Vec<KeyedRecord>> {
        let reads = keys
            .into_iter()
            .map(|key| self.fetch_keyed(data_type, key));
        join_all(reads)
            .await
            .into_iter()
            .filter_map(Result::transpose)
            .collect()
    }

    async fn fetch_keyed(&self, data_type: &DataType, key: DataKey) -> EngineResult<Option<KeyedRecord>> {
        let found = self
            .get_record(&RecordRef::new(data_type.clone(), key.clone()))
            .await?;
        Ok(found.map(|record| KeyedRecord { key, record }))
    }
}
