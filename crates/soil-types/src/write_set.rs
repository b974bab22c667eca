use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::paths;

/// The flat map of paths to new values computed by an engine operation.
///
/// `Value::Null` means "delete this path". Later writes to the same path
/// replace earlier ones, so composing several operations into one set is
/// last-write-wins per path.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WriteSet {
    entries: BTreeMap<String, Value>,
}

impl WriteSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `path` to `value`. The path is stored without surrounding slashes.
    pub fn set(&mut self, path: impl AsRef<str>, value: impl Into<Value>) {
        self.entries
            .insert(paths::normalize(path.as_ref()).to_string(), value.into());
    }

    /// Mark `path` for deletion.
    pub fn clear(&mut self, path: impl AsRef<str>) {
        self.set(path, Value::Null);
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        self.entries.get(paths::normalize(path))
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(paths::normalize(path))
    }

    /// Returns `true` if `path` is scheduled for deletion.
    pub fn clears(&self, path: &str) -> bool {
        matches!(self.get(path), Some(Value::Null))
    }

    /// Append every entry of `other`, replacing duplicates.
    pub fn extend(&mut self, other: WriteSet) {
        self.entries.extend(other.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    /// Paths whose first segment is `namespace`.
    pub fn in_namespace<'a>(&'a self, namespace: &'a str) -> impl Iterator<Item = (&'a String, &'a Value)> {
        self.entries
            .iter()
            .filter(move |(path, _)| paths::segments(path).next() == Some(namespace))
    }
}

impl IntoIterator for WriteSet {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl FromIterator<(String, Value)> for WriteSet {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut ws = WriteSet::new();
        for (path, value) in iter {
            ws.set(path, value);
        }
        ws
    }
}
