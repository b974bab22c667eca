//! Local evaluation of a [`PermissionTree`] against JSON snapshots.
//!
//! Follows the store's rule semantics: a grant anywhere on the way down to
//! the target wins, `validate` runs on every written node that still has
//! data, and reading a missing location yields null.

use std::borrow::Cow;
use std::collections::HashMap;

use serde_json::Value;
use soil_types::paths;
use tracing::debug;

use crate::error::RulesResult;
use crate::predicate::{Base, Node, Operand, Predicate, Segment};
use crate::tree::{PermissionTree, RuleNode};

/// Present child of `value`. Null counts as absent.
fn child<'v>(value: &'v Value, key: &str) -> Option<&'v Value> {
    value.as_object()?.get(key).filter(|v| !v.is_null())
}

fn lookup<'v>(tree: &'v Value, segments: &[&str]) -> Option<&'v Value> {
    let mut current = Some(tree).filter(|v| !v.is_null())?;
    for segment in segments {
        current = child(current, segment)?;
    }
    Some(current)
}

/// A value used as a path segment.
fn as_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Strict equality with null standing in for absence.
fn strict_eq(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x.as_f64() == y.as_f64(),
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

struct Context<'a> {
    root: &'a Value,
    data: Option<&'a Value>,
    new_data: Option<&'a Value>,
    auth: Option<&'a str>,
    bindings: &'a HashMap<String, String>,
}

impl<'a> Context<'a> {
    fn resolve(&self, node: &Node) -> Option<&'a Value> {
        let mut current = match node.base {
            Base::Root => Some(self.root).filter(|v| !v.is_null()),
            Base::Data => self.data,
            Base::NewData => self.new_data,
        }?;
        for segment in &node.path {
            let key: Cow<'_, str> = match segment {
                Segment::Literal(lit) => Cow::Borrowed(lit.as_str()),
                Segment::Var(name) => Cow::Borrowed(self.bindings.get(name)?.as_str()),
                Segment::AuthUid => Cow::Borrowed(self.auth?),
                Segment::ValueOf(inner) => Cow::Owned(as_key(self.resolve(inner)?)?),
            };
            current = child(current, &key)?;
        }
        Some(current)
    }

    fn operand(&self, operand: &Operand) -> Option<Value> {
        match operand {
            Operand::AuthUid => self.auth.map(|uid| Value::String(uid.to_string())),
            Operand::Var(name) => self.bindings.get(name).cloned().map(Value::String),
            Operand::Literal(Value::Null) => None,
            Operand::Literal(value) => Some(value.clone()),
            Operand::Val(node) => self.resolve(node).cloned(),
        }
    }

    fn eval(&self, predicate: &Predicate) -> bool {
        match predicate {
            Predicate::True => true,
            Predicate::False => false,
            Predicate::AuthNotNull => self.auth.is_some(),
            Predicate::Exists(node) => self.resolve(node).is_some(),
            Predicate::IsNumber(node) => self.resolve(node).is_some_and(Value::is_number),
            Predicate::Eq(a, b) => {
                // auth.uid without a signed-in caller fails the comparison
                // instead of matching a missing value.
                let anonymous = self.auth.is_none();
                if anonymous && (matches!(a, Operand::AuthUid) || matches!(b, Operand::AuthUid)) {
                    return false;
                }
                strict_eq(self.operand(a).as_ref(), self.operand(b).as_ref())
            }
            Predicate::Not(inner) => !self.eval(inner),
            Predicate::All(parts) => parts.iter().all(|p| self.eval(p)),
            Predicate::Any(parts) => parts.iter().any(|p| self.eval(p)),
        }
    }
}

#[derive(Clone, Copy)]
enum Access {
    Read,
    Write,
}

/// Where a walk from the root ended up.
struct Walk<'t> {
    granted: bool,
    /// The rule node at the target path, if the tree reaches that deep.
    target: Option<&'t RuleNode>,
    bindings: HashMap<String, String>,
}

impl PermissionTree {
    /// Whether `auth` may read `path` in `snapshot`.
    pub fn can_read(&self, path: &str, snapshot: &Value, auth: Option<&str>) -> RulesResult<bool> {
        let segments = parse(path)?;
        let walk = self.walk(&segments, snapshot, snapshot, auth, Access::Read);
        debug!(path, auth = auth.unwrap_or("-"), granted = walk.granted, "evaluated read");
        Ok(walk.granted)
    }

    /// Whether `auth` may turn `before` into `after` by writing `path`.
    pub fn can_write(&self, path: &str, before: &Value, after: &Value, auth: Option<&str>) -> RulesResult<bool> {
        let segments = parse(path)?;
        let walk = self.walk(&segments, before, after, auth, Access::Write);
        let valid = match walk.target {
            Some(node) if walk.granted => {
                let mut at = segments.clone();
                validates(node, &mut at, &walk.bindings, before, after, auth)
            }
            _ => true,
        };
        let allowed = walk.granted && valid;
        debug!(path, auth = auth.unwrap_or("-"), granted = walk.granted, valid, "evaluated write");
        Ok(allowed)
    }

    fn walk<'t>(
        &'t self,
        segments: &[&str],
        before: &Value,
        after: &Value,
        auth: Option<&str>,
        access: Access,
    ) -> Walk<'t> {
        let mut bindings = HashMap::new();
        let mut granted = false;
        let mut node = &self.root;
        let mut depth = 0;
        loop {
            let rule = match access {
                Access::Read => node.read.as_ref(),
                Access::Write => node.write.as_ref(),
            };
            if let (false, Some(rule)) = (granted, rule) {
                let ctx = Context {
                    root: before,
                    data: lookup(before, &segments[..depth]),
                    new_data: lookup(after, &segments[..depth]),
                    auth,
                    bindings: &bindings,
                };
                granted = ctx.eval(rule);
            }
            if depth == segments.len() {
                return Walk {
                    granted,
                    target: Some(node),
                    bindings,
                };
            }
            match node.matching_child(segments[depth]) {
                Some((next, var)) => {
                    if let Some(var) = var {
                        bindings.insert(var.to_string(), segments[depth].to_string());
                    }
                    node = next;
                    depth += 1;
                }
                None => {
                    return Walk {
                        granted,
                        target: None,
                        bindings,
                    }
                }
            }
        }
    }
}

/// Run `validate` on `node` and on every changed child below it.
fn validates<'p>(
    node: &RuleNode,
    at: &mut Vec<&'p str>,
    bindings: &HashMap<String, String>,
    before: &Value,
    after: &'p Value,
    auth: Option<&str>,
) -> bool {
    let new_data = lookup(after, at);
    let Some(written) = new_data else {
        return true;
    };
    let data = lookup(before, at);
    if let Some(rule) = &node.validate {
        let ctx = Context {
            root: before,
            data,
            new_data,
            auth,
            bindings,
        };
        if !ctx.eval(rule) {
            return false;
        }
    }
    let Some(children) = written.as_object() else {
        return true;
    };
    for (key, value) in children {
        if data.and_then(|d| child(d, key)) == Some(value) {
            continue;
        }
        let Some((next, var)) = node.matching_child(key) else {
            continue;
        };
        let mut scoped = bindings.clone();
        if let Some(var) = var {
            scoped.insert(var.to_string(), key.clone());
        }
        at.push(key.as_str());
        let ok = validates(next, at, &scoped, before, after, auth);
        at.pop();
        if !ok {
            return false;
        }
    }
    true
}

fn parse(path: &str) -> RulesResult<Vec<&str>> {
    let segments: Vec<&str> = paths::segments(path).collect();
    for segment in &segments {
        paths::validate_segment(segment, "path segment")?;
    }
    Ok(segments)
}
