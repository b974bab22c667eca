use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{TypeError, TypeResult};
use crate::paths::validate_segment;

/// Define a validated, string-backed path segment identifier.
macro_rules! segment_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Validate and wrap a segment.
            pub fn new(value: impl Into<String>) -> TypeResult<Self> {
                let value = value.into();
                validate_segment(&value, $kind)?;
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = TypeError;

            fn try_from(value: String) -> TypeResult<Self> {
                Self::new(value)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = TypeError;

            fn try_from(value: &str) -> TypeResult<Self> {
                Self::new(value)
            }
        }

        impl FromStr for $name {
            type Err = TypeError;

            fn from_str(s: &str) -> TypeResult<Self> {
                Self::new(s)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> String {
                value.0
            }
        }
    };
}

segment_id!(
    /// Type namespace of a record (`widget`, `appUser`, ...).
    DataType,
    "data type"
);

segment_id!(
    /// Key of a record within its type namespace.
    DataKey,
    "data key"
);

segment_id!(
    /// Authenticated user identifier.
    Uid,
    "uid"
);

/// Full coordinates of a record.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordRef {
    pub data_type: DataType,
    pub data_key: DataKey,
}

impl RecordRef {
    pub fn new(data_type: DataType, data_key: DataKey) -> Self {
        Self {
            data_type,
            data_key,
        }
    }

    /// Build from raw strings, validating both segments.
    pub fn parse(data_type: &str, data_key: &str) -> TypeResult<Self> {
        Ok(Self::new(DataType::new(data_type)?, DataKey::new(data_key)?))
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.data_type, self.data_key)
    }
}
