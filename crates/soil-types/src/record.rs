use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{TypeError, TypeResult};
use crate::ids::{DataKey, DataType};
use crate::temporal::Timestamp;

pub const CREATED_AT: &str = "createdAt";
pub const UPDATED_AT: &str = "updatedAt";
pub const DELETED_AT: &str = "deletedAt";
pub const PUBLIC_ACCESS: &str = "publicAccess";
pub const CONNECTION_ACCESS: &str = "connectionAccess";
pub const OWNERSHIP_ACCESS: &str = "ownershipAccess";

/// Field names the engine manages itself. Payload fields may not use them.
/// `deletedAt` is left to callers for soft deletion.
pub const RESERVED_FIELDS: &[&str] = &[
    CREATED_AT,
    UPDATED_AT,
    PUBLIC_ACCESS,
    CONNECTION_ACCESS,
    OWNERSHIP_ACCESS,
];

pub fn is_reserved_field(name: &str) -> bool {
    RESERVED_FIELDS.contains(&name)
}

// ---------------------------------------------------------------------------
// Delegated access descriptors
// ---------------------------------------------------------------------------

/// "Whoever is connected to `connectionType/connectionKey` through a record
/// of `uidDataType` keyed by their uid may read/write this record."
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionAccess {
    pub connection_type: DataType,
    pub connection_key: DataKey,
    pub uid_data_type: DataType,
    pub read: bool,
    pub write: bool,
}

/// "Whoever owns `dataType/dataKey` may read/write this record."
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnershipAccess {
    pub data_type: DataType,
    pub data_key: DataKey,
    pub read: bool,
    pub write: bool,
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// A stored record: engine-managed metadata plus arbitrary payload fields.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<Timestamp>,
    #[serde(default)]
    pub public_access: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_access: Option<ConnectionAccess>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ownership_access: Option<OwnershipAccess>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    /// Decode a record read from `path`.
    pub fn from_value(path: &str, value: Value) -> TypeResult<Self> {
        if !value.is_object() {
            return Err(TypeError::MalformedValue {
                path: path.to_string(),
                reason: "record is not an object".into(),
            });
        }
        serde_json::from_value(value).map_err(|err| TypeError::MalformedValue {
            path: path.to_string(),
            reason: err.to_string(),
        })
    }

    pub fn to_value(&self) -> TypeResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// A payload field by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}
