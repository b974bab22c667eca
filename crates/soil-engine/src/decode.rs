//! Decoding of index subtrees read back from the store.

use std::collections::BTreeMap;

use serde_json::Value;
use soil_types::{entry_stamp, DataKey, DataType, RecordRef, Timestamp, Uid};

use crate::error::{EngineError, EngineResult};

/// Connections of one record: connected type → connected key → entry.
pub type ConnectionList = BTreeMap<DataType, BTreeMap<DataKey, Value>>;

fn malformed(path: &str, reason: impl Into<String>) -> EngineError {
    EngineError::Malformed {
        path: path.to_string(),
        reason: reason.into(),
    }
}

/// Children of an object node; a missing node has none.
pub(crate) fn children(path: &str, value: Option<Value>) -> EngineResult<serde_json::Map<String, Value>> {
    match value {
        None => Ok(serde_json::Map::new()),
        Some(Value::Object(map)) => Ok(map),
        Some(other) => Err(malformed(path, format!("expected an object, found {other}"))),
    }
}

/// Uids under `owners/{t}/{k}`.
pub(crate) fn owners(path: &str, value: Option<Value>) -> EngineResult<Vec<Uid>> {
    children(path, value)?
        .into_iter()
        .map(|(uid, _)| Uid::new(uid).map_err(EngineError::from))
        .collect()
}

/// Keys of a `key → stamp` listing, most recently stamped first.
pub(crate) fn keys_by_recency(path: &str, value: Option<Value>) -> EngineResult<Vec<DataKey>> {
    let mut stamped: Vec<(DataKey, Timestamp)> = children(path, value)?
        .into_iter()
        .map(|(key, entry)| {
            let stamp = entry_stamp(&entry).unwrap_or(Timestamp(0));
            Ok((DataKey::new(key)?, stamp))
        })
        .collect::<EngineResult<_>>()?;
    stamped.sort_by(|(ka, a), (kb, b)| b.cmp(a).then_with(|| ka.cmp(kb)));
    Ok(stamped.into_iter().map(|(key, _)| key).collect())
}

/// The connection subtree of one record.
pub(crate) fn connection_list(path: &str, value: Option<Value>) -> EngineResult<ConnectionList> {
    let mut list = ConnectionList::new();
    for (connection_type, keys) in children(path, value)? {
        let list_path = format!("{path}/{connection_type}");
        let entries = children(&list_path, Some(keys))?
            .into_iter()
            .map(|(key, entry)| Ok((DataKey::new(key)?, entry)))
            .collect::<EngineResult<BTreeMap<_, _>>>()?;
        list.insert(DataType::new(connection_type)?, entries);
    }
    Ok(list)
}

/// Every endpoint named in a connection list.
pub(crate) fn connection_targets(list: &ConnectionList) -> Vec<RecordRef> {
    list.iter()
        .flat_map(|(connection_type, keys)| {
            keys.keys()
                .map(move |key| RecordRef::new(connection_type.clone(), key.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_nodes_are_empty() {
        assert!(owners("owners/widget/w1", None).unwrap().is_empty());
        assert!(connection_list("connectionGraph/widget/w1", None)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn scalar_where_object_expected_is_malformed() {
        let err = owners("owners/widget/w1", Some(json!(3))).unwrap_err();
        assert!(matches!(err, EngineError::Malformed { .. }));
    }

    #[test]
    fn recency_orders_newest_first() {
        let listing = json!({ "a": 1, "b": 3, "c": { "updatedAt": 2, "x": 1 } });
        let keys = keys_by_recency("publicLists/widget", Some(listing)).unwrap();
        let keys: Vec<&str> = keys.iter().map(DataKey::as_str).collect();
        assert_eq!(keys, ["b", "c", "a"]);
    }

    #[test]
    fn connection_targets_flatten_types() {
        let list = connection_list(
            "connectionGraph/widget/w1",
            Some(json!({ "tag": { "t1": 1, "t2": 2 }, "appUser": { "u1": 1 } })),
        )
        .unwrap();
        let targets: Vec<String> = connection_targets(&list)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(targets, ["appUser/u1", "tag/t1", "tag/t2"]);
    }
}
