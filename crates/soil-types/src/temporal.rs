use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Wall-clock milliseconds since the UNIX epoch.
///
/// Every index entry's value is a `Timestamp` (or absence), which is what
/// makes index writes idempotent: replaying a write only moves the stamp.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    pub const fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    pub const fn as_millis(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Timestamp> for serde_json::Value {
    fn from(ts: Timestamp) -> Self {
        serde_json::Value::from(ts.0)
    }
}

/// Independent stamps for the record itself and each index family.
///
/// Callers replaying or migrating data set these separately; everyone else
/// uses [`IndexTimes::at`] or [`IndexTimes::now`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexTimes {
    /// `createdAt` / `updatedAt` on the record.
    pub now: Timestamp,
    /// Owner pairs.
    pub ownership_now: Timestamp,
    /// Connection graph entries.
    pub connection_now: Timestamp,
    /// Public listing entry.
    pub public_now: Timestamp,
}

impl IndexTimes {
    /// All stamps set to the same instant.
    pub fn at(ts: Timestamp) -> Self {
        Self {
            now: ts,
            ownership_now: ts,
            connection_now: ts,
            public_now: ts,
        }
    }

    pub fn now() -> Self {
        Self::at(Timestamp::now())
    }
}

impl Default for IndexTimes {
    fn default() -> Self {
        Self::now()
    }
}
