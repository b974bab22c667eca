//! Boolean predicates over the store tree, and their rendering in the
//! store's rule-expression syntax.

use std::fmt;

use serde_json::Value;

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// Which snapshot a node is read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Base {
    /// The whole tree before the operation.
    Root,
    /// The node the rule is attached to, before the operation.
    Data,
    /// The node the rule is attached to, after the operation.
    NewData,
}

/// One step below a node.
#[derive(Clone, Debug, PartialEq)]
pub enum Segment {
    Literal(String),
    /// A path variable captured by a `$name` rule key. Stored without `$`.
    Var(String),
    AuthUid,
    /// The string value stored at another node.
    ValueOf(Box<Node>),
}

impl From<&str> for Segment {
    fn from(value: &str) -> Self {
        Self::Literal(value.to_string())
    }
}

/// A location in one of the snapshots.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub base: Base,
    pub path: Vec<Segment>,
}

impl Node {
    pub fn root() -> Self {
        Self {
            base: Base::Root,
            path: Vec::new(),
        }
    }

    pub fn data() -> Self {
        Self {
            base: Base::Data,
            path: Vec::new(),
        }
    }

    pub fn new_data() -> Self {
        Self {
            base: Base::NewData,
            path: Vec::new(),
        }
    }

    pub fn child(mut self, segment: impl Into<Segment>) -> Self {
        self.path.push(segment.into());
        self
    }

    pub fn var(self, name: &str) -> Self {
        self.child(Segment::Var(name.to_string()))
    }

    pub fn auth_uid(self) -> Self {
        self.child(Segment::AuthUid)
    }

    pub fn value_of(self, node: Node) -> Self {
        self.child(Segment::ValueOf(Box::new(node)))
    }

    pub fn exists(&self) -> Predicate {
        Predicate::Exists(self.clone())
    }

    pub fn is_number(&self) -> Predicate {
        Predicate::IsNumber(self.clone())
    }

    pub fn val(&self) -> Operand {
        Operand::Val(self.clone())
    }
}

// ---------------------------------------------------------------------------
// Operands and predicates
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    AuthUid,
    Var(String),
    Literal(Value),
    Val(Node),
}

impl Operand {
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    pub fn equals(self, other: Operand) -> Predicate {
        Predicate::Eq(self, other)
    }

    pub fn is_true(self) -> Predicate {
        Predicate::Eq(self, Operand::Literal(Value::Bool(true)))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    True,
    False,
    AuthNotNull,
    Exists(Node),
    IsNumber(Node),
    Eq(Operand, Operand),
    Not(Box<Predicate>),
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
}

impl Predicate {
    /// Conjunction, flattening nested conjunctions.
    pub fn all(parts: impl IntoIterator<Item = Predicate>) -> Self {
        let mut flat = Vec::new();
        for part in parts {
            match part {
                Self::All(inner) => flat.extend(inner),
                Self::True => {}
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Self::True,
            1 => flat.remove(0),
            _ => Self::All(flat),
        }
    }

    /// Disjunction, flattening nested disjunctions.
    pub fn any(parts: impl IntoIterator<Item = Predicate>) -> Self {
        let mut flat = Vec::new();
        for part in parts {
            match part {
                Self::Any(inner) => flat.extend(inner),
                Self::False => {}
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Self::False,
            1 => flat.remove(0),
            _ => Self::Any(flat),
        }
    }

    pub fn negate(self) -> Self {
        match self {
            Self::Not(inner) => *inner,
            Self::True => Self::False,
            Self::False => Self::True,
            other => Self::Not(Box::new(other)),
        }
    }

    pub fn and(self, other: Predicate) -> Self {
        Self::all([self, other])
    }

    pub fn or(self, other: Predicate) -> Self {
        Self::any([self, other])
    }

    /// Renders without surrounding parentheses.
    fn is_atomic(&self) -> bool {
        !matches!(self, Self::All(_) | Self::Any(_) | Self::Eq(..))
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self.base {
            Base::Root => "root",
            Base::Data => "data",
            Base::NewData => "newData",
        })?;
        // Consecutive literals collapse into one slash-separated child.
        let mut literals: Vec<&str> = Vec::new();
        for segment in &self.path {
            if let Segment::Literal(lit) = segment {
                literals.push(lit);
                continue;
            }
            if !literals.is_empty() {
                write!(f, ".child({})", quote(&literals.join("/")))?;
                literals.clear();
            }
            match segment {
                Segment::Var(name) => write!(f, ".child(${name})")?,
                Segment::AuthUid => f.write_str(".child(auth.uid)")?,
                Segment::ValueOf(node) => write!(f, ".child({node}.val())")?,
                Segment::Literal(_) => {}
            }
        }
        if !literals.is_empty() {
            write!(f, ".child({})", quote(&literals.join("/")))?;
        }
        Ok(())
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuthUid => f.write_str("auth.uid"),
            Self::Var(name) => write!(f, "${name}"),
            Self::Literal(Value::String(s)) => f.write_str(&quote(s)),
            Self::Literal(value) => write!(f, "{value}"),
            Self::Val(node) => write!(f, "{node}.val()"),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, parts: &[Predicate], op: &str) -> fmt::Result {
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            write!(f, " {op} ")?;
        }
        if part.is_atomic() {
            write!(f, "{part}")?;
        } else {
            write!(f, "({part})")?;
        }
    }
    Ok(())
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::True => f.write_str("true"),
            Self::False => f.write_str("false"),
            Self::AuthNotNull => f.write_str("auth !== null"),
            Self::Exists(node) => write!(f, "{node}.exists()"),
            Self::IsNumber(node) => write!(f, "{node}.isNumber()"),
            Self::Eq(a, b) => write!(f, "{a} === {b}"),
            Self::Not(inner) if inner.is_atomic() => write!(f, "!{inner}"),
            Self::Not(inner) => write!(f, "!({inner})"),
            Self::All(parts) => write_joined(f, parts, "&&"),
            Self::Any(parts) => write_joined(f, parts, "||"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_nodes() {
        let node = Node::root()
            .child("owners")
            .var("dataType")
            .var("dataKey")
            .auth_uid();
        assert_eq!(
            node.exists().to_string(),
            "root.child('owners').child($dataType).child($dataKey).child(auth.uid).exists()"
        );
    }

    #[test]
    fn consecutive_literals_collapse() {
        let node = Node::data().child("ownershipAccess").child("read");
        assert_eq!(node.to_string(), "data.child('ownershipAccess/read')");
    }

    #[test]
    fn renders_value_segments() {
        let access = Node::data().child("ownershipAccess");
        let node = Node::root()
            .child("owners")
            .value_of(access.clone().child("dataType"))
            .auth_uid();
        assert_eq!(
            node.to_string(),
            "root.child('owners').child(data.child('ownershipAccess/dataType').val()).child(auth.uid)"
        );
    }

    #[test]
    fn compound_children_are_parenthesized() {
        let p = Predicate::any([
            Node::data().exists().negate(),
            Predicate::all([Predicate::AuthNotNull, Operand::AuthUid.equals(Operand::Var("uid".into()))]),
        ]);
        assert_eq!(p.to_string(), "!data.exists() || (auth !== null && (auth.uid === $uid))");
    }

    #[test]
    fn constructors_flatten_and_simplify() {
        let p = Predicate::all([Predicate::True, Predicate::all([Predicate::AuthNotNull])]);
        assert_eq!(p, Predicate::AuthNotNull);
        assert_eq!(Predicate::any(Vec::new()), Predicate::False);
        assert_eq!(Predicate::AuthNotNull.negate().negate(), Predicate::AuthNotNull);
    }

    #[test]
    fn literal_strings_are_quoted() {
        assert_eq!(Operand::literal("it's").to_string(), r"'it\'s'");
        assert_eq!(Operand::literal(true).to_string(), "true");
    }
}
