use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::{DataKey, DataType, RecordRef};
use crate::record::UPDATED_AT;
use crate::temporal::Timestamp;

/// Which mirrored entry of an edge carries a payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Only the entry under the declaring record.
    #[serde(rename = "source")]
    Source,
    /// Only the entry under the connected record.
    #[serde(rename = "target")]
    Target,
    #[serde(rename = "bi-directional")]
    BiDirectional,
}

impl Direction {
    pub fn on_source(self) -> bool {
        matches!(self, Self::Source | Self::BiDirectional)
    }

    pub fn on_target(self) -> bool {
        matches!(self, Self::Target | Self::BiDirectional)
    }
}

/// Display data carried on one or both mirrored entries of an edge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConnectionPayload {
    pub data: Map<String, Value>,
    pub direction: Direction,
}

/// An edge declared from a record being created or updated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub data_type: DataType,
    pub data_key: DataKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<ConnectionPayload>,
}

impl Connection {
    pub fn new(data_type: DataType, data_key: DataKey) -> Self {
        Self {
            data_type,
            data_key,
            payload: None,
        }
    }

    pub fn with_payload(mut self, data: Map<String, Value>, direction: Direction) -> Self {
        self.payload = Some(ConnectionPayload { data, direction });
        self
    }

    pub fn target(&self) -> RecordRef {
        RecordRef::new(self.data_type.clone(), self.data_key.clone())
    }
}

/// A fully specified edge between two records.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionPair {
    pub data_type: DataType,
    pub data_key: DataKey,
    pub connection_type: DataType,
    pub connection_key: DataKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<ConnectionPayload>,
}

impl ConnectionPair {
    pub fn new(source: &RecordRef, connection: &Connection) -> Self {
        Self {
            data_type: source.data_type.clone(),
            data_key: source.data_key.clone(),
            connection_type: connection.data_type.clone(),
            connection_key: connection.data_key.clone(),
            payload: connection.payload.clone(),
        }
    }

    pub fn source(&self) -> RecordRef {
        RecordRef::new(self.data_type.clone(), self.data_key.clone())
    }

    pub fn target(&self) -> RecordRef {
        RecordRef::new(self.connection_type.clone(), self.connection_key.clone())
    }

    /// Entry value stored under the source endpoint.
    pub fn source_entry(&self, ts: Timestamp) -> Value {
        let data = self
            .payload
            .as_ref()
            .filter(|p| p.direction.on_source())
            .map(|p| &p.data);
        edge_entry(ts, data)
    }

    /// Entry value stored under the target endpoint.
    pub fn target_entry(&self, ts: Timestamp) -> Value {
        let data = self
            .payload
            .as_ref()
            .filter(|p| p.direction.on_target())
            .map(|p| &p.data);
        edge_entry(ts, data)
    }
}

/// Build a connection-graph entry: a bare timestamp, or `{updatedAt, ..data}`.
pub fn edge_entry(ts: Timestamp, data: Option<&Map<String, Value>>) -> Value {
    match data {
        None => ts.into(),
        Some(data) => {
            let mut obj = data.clone();
            obj.insert(UPDATED_AT.into(), ts.into());
            Value::Object(obj)
        }
    }
}

/// Re-stamp an existing entry, keeping any payload it carries.
pub fn restamp_entry(existing: Option<&Value>, ts: Timestamp) -> Value {
    match existing {
        Some(Value::Object(obj)) => {
            let mut obj = obj.clone();
            obj.insert(UPDATED_AT.into(), ts.into());
            Value::Object(obj)
        }
        _ => ts.into(),
    }
}

/// The recency stamp of an index entry: the number itself, or `updatedAt`.
pub fn entry_stamp(entry: &Value) -> Option<Timestamp> {
    match entry {
        Value::Object(obj) => obj.get(UPDATED_AT).and_then(Value::as_i64).map(Timestamp),
        other => other.as_i64().map(Timestamp),
    }
}

/// The payload part of an existing entry, if it carries one.
pub fn entry_payload(entry: &Value) -> Option<Map<String, Value>> {
    let mut obj = entry.as_object()?.clone();
    obj.remove(UPDATED_AT);
    Some(obj)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pair(direction: Option<Direction>) -> ConnectionPair {
        let source = RecordRef::parse("widget", "w1").unwrap();
        let mut conn = Connection::new(DataType::new("tag").unwrap(), DataKey::new("t1").unwrap());
        if let Some(direction) = direction {
            let data = json!({ "label": "red" }).as_object().unwrap().clone();
            conn = conn.with_payload(data, direction);
        }
        ConnectionPair::new(&source, &conn)
    }

    #[test]
    fn plain_edges_are_timestamps() {
        let p = pair(None);
        assert_eq!(p.source_entry(Timestamp(5)), json!(5));
        assert_eq!(p.target_entry(Timestamp(5)), json!(5));
    }

    #[test]
    fn source_payload_only_on_source_side() {
        let p = pair(Some(Direction::Source));
        assert_eq!(
            p.source_entry(Timestamp(5)),
            json!({ "label": "red", "updatedAt": 5 })
        );
        assert_eq!(p.target_entry(Timestamp(5)), json!(5));
    }

    #[test]
    fn target_payload_only_on_target_side() {
        let p = pair(Some(Direction::Target));
        assert_eq!(p.source_entry(Timestamp(5)), json!(5));
        assert_eq!(
            p.target_entry(Timestamp(5)),
            json!({ "label": "red", "updatedAt": 5 })
        );
    }

    #[test]
    fn bidirectional_payload_on_both() {
        let p = pair(Some(Direction::BiDirectional));
        assert_eq!(p.source_entry(Timestamp(1)), p.target_entry(Timestamp(1)));
    }

    #[test]
    fn restamp_keeps_payload() {
        let existing = json!({ "label": "red", "updatedAt": 1 });
        assert_eq!(
            restamp_entry(Some(&existing), Timestamp(9)),
            json!({ "label": "red", "updatedAt": 9 })
        );
        assert_eq!(restamp_entry(Some(&json!(1)), Timestamp(9)), json!(9));
        assert_eq!(restamp_entry(None, Timestamp(9)), json!(9));
    }

    #[test]
    fn stamps_of_both_entry_shapes() {
        assert_eq!(entry_stamp(&json!(7)), Some(Timestamp(7)));
        assert_eq!(entry_stamp(&json!({ "updatedAt": 8, "x": 1 })), Some(Timestamp(8)));
        assert_eq!(entry_stamp(&json!("nope")), None);
        assert_eq!(
            entry_payload(&json!({ "updatedAt": 8, "x": 1 })),
            Some(json!({ "x": 1 }).as_object().unwrap().clone())
        );
    }

    #[test]
    fn direction_serde_names() {
        assert_eq!(
            serde_json::to_value(Direction::BiDirectional).unwrap(),
            json!("bi-directional")
        );
    }
}
