use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::RulesResult;
use crate::predicate::Predicate;

/// Domain tag mixed into every artifact digest.
pub const DIGEST_DOMAIN: &str = "soil-rules-v1";

/// One level of the permission tree.
///
/// Child keys are literal segments or `$name` wildcards that capture the
/// segment under `name` for the predicates below them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RuleNode {
    pub read: Option<Predicate>,
    pub write: Option<Predicate>,
    pub validate: Option<Predicate>,
    pub index_on: Option<String>,
    pub children: BTreeMap<String, RuleNode>,
}

impl RuleNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(mut self, predicate: Predicate) -> Self {
        self.read = Some(predicate);
        self
    }

    pub fn write(mut self, predicate: Predicate) -> Self {
        self.write = Some(predicate);
        self
    }

    /// Same predicate for read and write.
    pub fn read_write(self, predicate: Predicate) -> Self {
        self.read(predicate.clone()).write(predicate)
    }

    pub fn validate(mut self, predicate: Predicate) -> Self {
        self.validate = Some(predicate);
        self
    }

    pub fn index_on(mut self, key: impl Into<String>) -> Self {
        self.index_on = Some(key.into());
        self
    }

    pub fn child(mut self, key: impl Into<String>, node: RuleNode) -> Self {
        self.children.insert(key.into(), node);
        self
    }

    /// The child matching `segment`: an exact literal first, then the
    /// wildcard with its variable name.
    pub(crate) fn matching_child(&self, segment: &str) -> Option<(&RuleNode, Option<&str>)> {
        if let Some(node) = self.children.get(segment) {
            return Some((node, None));
        }
        self.children
            .iter()
            .find_map(|(key, node)| key.strip_prefix('$').map(|var| (node, Some(var))))
    }

    fn to_json(&self) -> Value {
        let mut obj = Map::new();
        if let Some(p) = &self.read {
            obj.insert(".read".into(), render(p));
        }
        if let Some(p) = &self.write {
            obj.insert(".write".into(), render(p));
        }
        if let Some(p) = &self.validate {
            obj.insert(".validate".into(), render(p));
        }
        if let Some(key) = &self.index_on {
            obj.insert(".indexOn".into(), Value::String(key.clone()));
        }
        for (key, child) in &self.children {
            obj.insert(key.clone(), child.to_json());
        }
        Value::Object(obj)
    }

    fn count(&self) -> usize {
        1 + self.children.values().map(RuleNode::count).sum::<usize>()
    }
}

fn render(predicate: &Predicate) -> Value {
    match predicate {
        Predicate::True => Value::Bool(true),
        Predicate::False => Value::Bool(false),
        other => Value::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// PermissionTree
// ---------------------------------------------------------------------------

/// A compiled permission tree, ready to be rendered for deployment or
/// evaluated locally.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PermissionTree {
    pub root: RuleNode,
}

impl PermissionTree {
    pub fn new(root: RuleNode) -> Self {
        Self { root }
    }

    /// The deployable artifact `{"rules": {...}}`.
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("rules".into(), self.root.to_json());
        Value::Object(obj)
    }

    pub fn to_json_string(&self, pretty: bool) -> RulesResult<String> {
        let json = self.to_json();
        let rendered = if pretty {
            serde_json::to_string_pretty(&json)?
        } else {
            serde_json::to_string(&json)?
        };
        Ok(rendered)
    }

    /// Hex BLAKE3 digest of the compact artifact, domain separated.
    pub fn digest(&self) -> RulesResult<String> {
        let compact = serde_json::to_vec(&self.to_json())?;
        let mut hasher = blake3::Hasher::new();
        hasher.update(DIGEST_DOMAIN.as_bytes());
        hasher.update(b":");
        hasher.update(&compact);
        Ok(hex::encode(hasher.finalize().as_bytes()))
    }

    /// Number of rule nodes, the root included.
    pub fn node_count(&self) -> usize {
        self.root.count()
    }
}
