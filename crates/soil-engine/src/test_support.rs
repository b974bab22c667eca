use std::sync::Arc;

use soil_store::InMemoryTreeStore;
use soil_types::{DataKey, DataType, RecordRef, Uid};

use crate::config::EngineConfig;
use crate::soil::Soil;

/// An engine over a fresh in-memory store with an unpaced writer.
pub(crate) fn engine() -> (Arc<InMemoryTreeStore>, Soil<InMemoryTreeStore>) {
    let store = Arc::new(InMemoryTreeStore::new());
    let soil = Soil::new(Arc::clone(&store), EngineConfig::permissive()).unwrap();
    (store, soil)
}

pub(crate) fn rec(data_type: &str, data_key: &str) -> RecordRef {
    RecordRef::parse(data_type, data_key).unwrap()
}

pub(crate) fn t(data_type: &str) -> DataType {
    DataType::new(data_type).unwrap()
}

pub(crate) fn key(data_key: &str) -> DataKey {
    DataKey::new(data_key).unwrap()
}

pub(crate) fn uid(uid: &str) -> Uid {
    Uid::new(uid).unwrap()
}
