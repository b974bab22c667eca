use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use soil_store::WriteMode;
use soil_types::{paths, WriteSet};

/// Path-prefix group a write belongs to.
///
/// Groups are applied one store batch at a time, in an order that keeps
/// readers from observing access grants and data out of step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PathGroup {
    /// `owners/...` and `userOwnedLists/...`
    Ownership,
    /// `publicLists/...`
    PublicList,
    /// `data/...`
    PrimaryData,
    /// `connectionGraph/...`
    ConnectionGraph,
    /// Everything else (users, usernames, tracking, ...).
    Other,
}

/// Grant-widening groups first, so data is reachable the moment it lands.
const MERGE_ORDER: [PathGroup; 5] = [
    PathGroup::Ownership,
    PathGroup::PublicList,
    PathGroup::PrimaryData,
    PathGroup::ConnectionGraph,
    PathGroup::Other,
];

/// Visibility-narrowing groups first, grants removed last.
const DELETE_ORDER: [PathGroup; 5] = [
    PathGroup::Other,
    PathGroup::ConnectionGraph,
    PathGroup::PrimaryData,
    PathGroup::PublicList,
    PathGroup::Ownership,
];

impl PathGroup {
    /// Classify a path by its first segment.
    pub fn classify(path: &str) -> Self {
        match paths::segments(path).next() {
            Some(paths::OWNERS) | Some(paths::USER_OWNED_LISTS) => Self::Ownership,
            Some(paths::PUBLIC_LISTS) => Self::PublicList,
            Some(paths::DATA) => Self::PrimaryData,
            Some(paths::CONNECTION_GRAPH) => Self::ConnectionGraph,
            _ => Self::Other,
        }
    }

    /// Application order for a write mode.
    pub fn order(mode: WriteMode) -> &'static [PathGroup; 5] {
        match mode {
            WriteMode::Merge => &MERGE_ORDER,
            WriteMode::Delete => &DELETE_ORDER,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Ownership => "ownership",
            Self::PublicList => "public-list",
            Self::PrimaryData => "primary-data",
            Self::ConnectionGraph => "connection-graph",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for PathGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Split a write-set into its groups, in application order for `mode`.
/// Empty groups are omitted.
pub fn ordered_groups(writes: &WriteSet, mode: WriteMode) -> Vec<(PathGroup, WriteSet)> {
    let mut by_group: BTreeMap<PathGroup, WriteSet> = BTreeMap::new();
    for (path, value) in writes.iter() {
        by_group
            .entry(PathGroup::classify(path))
            .or_default()
            .set(path, value.clone());
    }
    PathGroup::order(mode)
        .iter()
        .filter_map(|group| by_group.remove(group).map(|ws| (*group, ws)))
        .collect()
}

/// Flatten a write-set into entries in group order for `mode`.
pub fn ordered_entries(writes: &WriteSet, mode: WriteMode) -> Vec<(String, Value)> {
    ordered_groups(writes, mode)
        .into_iter()
        .flat_map(|(_, ws)| ws.into_iter())
        .collect()
}

/// Cut ordered entries into write-sets of at most `max_ops` entries.
pub fn chunk(entries: Vec<(String, Value)>, max_ops: usize) -> Vec<WriteSet> {
    let max_ops = max_ops.max(1);
    let mut chunks = Vec::with_capacity(entries.len().div_ceil(max_ops));
    let mut current = WriteSet::new();
    for (path, value) in entries {
        current.set(path, value);
        if current.len() == max_ops {
            chunks.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> WriteSet {
        let mut ws = WriteSet::new();
        ws.set("owners/widget/w1/u1", 1);
        ws.set("userOwnedLists/u1/widget/w1", 1);
        ws.set("publicLists/widget/w1", 1);
        ws.set("data/widget/w1", json!({ "a": 1 }));
        ws.set("connectionGraph/widget/w1/tag/t1", 1);
        ws.set("usernames/alice", "u1");
        ws
    }

    #[test]
    fn classification() {
        assert_eq!(PathGroup::classify("owners/a/b/c"), PathGroup::Ownership);
        assert_eq!(PathGroup::classify("userOwnedLists/u/a/b"), PathGroup::Ownership);
        assert_eq!(PathGroup::classify("publicLists/a/b"), PathGroup::PublicList);
        assert_eq!(PathGroup::classify("/data/a/b"), PathGroup::PrimaryData);
        assert_eq!(PathGroup::classify("connectionGraph/a"), PathGroup::ConnectionGraph);
        assert_eq!(PathGroup::classify("tracking/x"), PathGroup::Other);
        assert_eq!(PathGroup::classify(""), PathGroup::Other);
    }

    #[test]
    fn merge_order_widens_grants_first() {
        let groups: Vec<PathGroup> = ordered_groups(&sample(), WriteMode::Merge)
            .into_iter()
            .map(|(g, _)| g)
            .collect();
        assert_eq!(groups, MERGE_ORDER.to_vec());
    }

    #[test]
    fn delete_order_is_reversed() {
        let mut expected = MERGE_ORDER.to_vec();
        expected.reverse();
        assert_eq!(PathGroup::order(WriteMode::Delete).to_vec(), expected);
    }

    #[test]
    fn empty_groups_are_skipped() {
        let mut ws = WriteSet::new();
        ws.set("data/widget/w1", Value::Null);
        ws.set("owners/widget/w1/u1", Value::Null);
        let groups = ordered_groups(&ws, WriteMode::Delete);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, PathGroup::PrimaryData);
        assert_eq!(groups[1].0, PathGroup::Ownership);
    }

    #[test]
    fn chunking_preserves_order_and_bounds() {
        let entries = ordered_entries(&sample(), WriteMode::Delete);
        let chunks = chunk(entries.clone(), 4);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 4);
        assert_eq!(chunks[1].len(), 2);
        // The first chunk starts with the delete-order head (other).
        assert!(chunks[0].contains("usernames/alice"));
        // Ownership entries land in the last chunk.
        assert!(chunks[1].contains("owners/widget/w1/u1"));
        assert_eq!(chunks.iter().map(WriteSet::len).sum::<usize>(), entries.len());
    }

    #[test]
    fn zero_max_ops_is_treated_as_one() {
        let chunks = chunk(ordered_entries(&sample(), WriteMode::Merge), 0);
        assert_eq!(chunks.len(), 6);
    }
}
