//! Reusable predicate fragments of the relationship model.
//!
//! Fragments take record coordinates as [`Segment`]s so the same check can
//! be aimed at `$dataType/$dataKey`, at the other end of a connection, or at
//! the node a rule is attached to.

use soil_types::paths;
use soil_types::record::{CONNECTION_ACCESS, OWNERSHIP_ACCESS, PUBLIC_ACCESS, UPDATED_AT};

use crate::config::RulesConfig;
use crate::predicate::{Node, Operand, Predicate, Segment};

const DATA_TYPE: &str = "dataType";
const DATA_KEY: &str = "dataKey";
const CONNECTION_TYPE: &str = "connectionType";
const CONNECTION_KEY: &str = "connectionKey";
const UID_DATA_TYPE: &str = "uidDataType";
const READ: &str = "read";
const WRITE: &str = "write";

/// A record's coordinates as seen from inside a rule.
#[derive(Clone, Debug)]
pub struct Coords {
    pub data_type: Segment,
    pub data_key: Segment,
}

impl Coords {
    pub fn vars(data_type: &str, data_key: &str) -> Self {
        Self {
            data_type: Segment::Var(data_type.to_string()),
            data_key: Segment::Var(data_key.to_string()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Access {
    Read,
    Write,
}

impl Access {
    fn flag(self) -> &'static str {
        match self {
            Self::Read => READ,
            Self::Write => WRITE,
        }
    }
}

/// Fragment factory bound to one vocabulary.
#[derive(Clone, Debug)]
pub struct Fragments<'a> {
    config: &'a RulesConfig,
}

impl<'a> Fragments<'a> {
    pub fn new(config: &'a RulesConfig) -> Self {
        Self { config }
    }

    // -- identity ---------------------------------------------------------

    pub fn auth_is_admin(&self) -> Predicate {
        Node::root().child(paths::ADMINS).auth_uid().val().is_true()
    }

    pub fn auth_is_var(&self, var: &str) -> Predicate {
        Operand::AuthUid.equals(Operand::Var(var.to_string()))
    }

    // -- record state -----------------------------------------------------

    pub fn root_data(&self, at: &Coords) -> Node {
        Node::root()
            .child(paths::DATA)
            .child(at.data_type.clone())
            .child(at.data_key.clone())
    }

    pub fn root_data_missing(&self, at: &Coords) -> Predicate {
        self.root_data(at).exists().negate()
    }

    pub fn public_flag(&self, holder: &Node) -> Predicate {
        holder.clone().child(PUBLIC_ACCESS).val().is_true()
    }

    pub fn is_owner(&self, at: &Coords) -> Predicate {
        Node::root()
            .child(paths::OWNERS)
            .child(at.data_type.clone())
            .child(at.data_key.clone())
            .auth_uid()
            .exists()
    }

    /// The caller's identity record is connected to the record.
    pub fn identity_connected(&self, at: &Coords) -> Predicate {
        Node::root()
            .child(paths::CONNECTION_GRAPH)
            .child(self.config.identity_type.as_str())
            .auth_uid()
            .child(at.data_type.clone())
            .child(at.data_key.clone())
            .exists()
    }

    // -- delegated access -------------------------------------------------

    fn ownership_granted(&self, holder: &Node, access: Access) -> Predicate {
        let descriptor = holder.clone().child(OWNERSHIP_ACCESS);
        let via = Node::root()
            .child(paths::OWNERS)
            .value_of(descriptor.clone().child(DATA_TYPE))
            .value_of(descriptor.clone().child(DATA_KEY))
            .auth_uid();
        descriptor.child(access.flag()).val().is_true().and(via.exists())
    }

    fn connection_granted(&self, holder: &Node, access: Access) -> Predicate {
        let descriptor = holder.clone().child(CONNECTION_ACCESS);
        let via = Node::root()
            .child(paths::CONNECTION_GRAPH)
            .value_of(descriptor.clone().child(CONNECTION_TYPE))
            .value_of(descriptor.clone().child(CONNECTION_KEY))
            .value_of(descriptor.clone().child(UID_DATA_TYPE))
            .auth_uid();
        descriptor.child(access.flag()).val().is_true().and(via.exists())
    }

    pub fn read_ownership_access(&self, holder: &Node) -> Predicate {
        self.ownership_granted(holder, Access::Read)
    }

    pub fn write_ownership_access(&self, holder: &Node) -> Predicate {
        self.ownership_granted(holder, Access::Write)
    }

    pub fn read_connection_access(&self, holder: &Node) -> Predicate {
        self.connection_granted(holder, Access::Read)
    }

    pub fn write_connection_access(&self, holder: &Node) -> Predicate {
        self.connection_granted(holder, Access::Write)
    }

    pub fn read_as_owner_or_ownership_access(&self, at: &Coords) -> Predicate {
        self.is_owner(at)
            .or(self.read_ownership_access(&self.root_data(at)))
    }

    pub fn write_as_owner_or_ownership_access(&self, at: &Coords) -> Predicate {
        self.is_owner(at)
            .or(self.write_ownership_access(&self.root_data(at)))
    }

    // -- remote requests --------------------------------------------------

    fn marker(&self, node: Node) -> Node {
        node.child(self.config.remote_request_field.as_str())
    }

    /// The marker is unchanged, newly set to the caller, or the record is
    /// being deleted.
    pub fn safe_remote_request(&self) -> Predicate {
        let same = self
            .marker(Node::data())
            .val()
            .equals(self.marker(Node::new_data()).val());
        let created_yours = Predicate::all([
            self.marker(Node::data()).exists().negate(),
            self.marker(Node::new_data()).exists(),
            self.marker(Node::new_data()).val().equals(Operand::AuthUid),
        ]);
        Predicate::any([same, created_yours, Node::new_data().exists().negate()])
    }

    pub fn new_owned_remote_request(&self) -> Predicate {
        Node::data()
            .exists()
            .negate()
            .and(self.marker(Node::new_data()).val().equals(Operand::AuthUid))
    }

    pub fn existing_owned_remote_request(&self) -> Predicate {
        self.marker(Node::data()).val().equals(Operand::AuthUid)
    }

    // -- connections ------------------------------------------------------

    /// What one endpoint must satisfy for an edge touching it to be
    /// written: public, missing, owned, connected to the caller, or
    /// readable through delegated access.
    pub fn half_of_connection_write(&self, at: &Coords) -> Predicate {
        let holder = self.root_data(at);
        Predicate::any([
            self.public_flag(&holder),
            self.root_data_missing(at),
            self.is_owner(at),
            self.identity_connected(at),
            self.read_connection_access(&holder),
            self.read_ownership_access(&holder),
        ])
    }

    /// A bare timestamp, or a payload object stamped with `updatedAt`.
    pub fn index_entry_shape(&self) -> Predicate {
        Node::new_data()
            .is_number()
            .or(Node::new_data().child(UPDATED_AT).is_number())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frags(config: &RulesConfig) -> Fragments<'_> {
        Fragments::new(config)
    }

    #[test]
    fn owner_check_renders_like_store_rules() {
        let config = RulesConfig::default();
        let p = frags(&config).is_owner(&Coords::vars("dataType", "dataKey"));
        assert_eq!(
            p.to_string(),
            "root.child('owners').child($dataType).child($dataKey).child(auth.uid).exists()"
        );
    }

    #[test]
    fn identity_connection_uses_configured_type() {
        let config = RulesConfig {
            identity_type: "member".into(),
            ..RulesConfig::default()
        };
        let p = frags(&config).identity_connected(&Coords::vars("t", "k"));
        assert_eq!(
            p.to_string(),
            "root.child('connectionGraph/member').child(auth.uid).child($t).child($k).exists()"
        );
    }

    #[test]
    fn ownership_access_dereferences_descriptor() {
        let config = RulesConfig::default();
        let p = frags(&config).read_ownership_access(&Node::data());
        assert_eq!(
            p.to_string(),
            "(data.child('ownershipAccess/read').val() === true) && \
             root.child('owners').child(data.child('ownershipAccess/dataType').val())\
             .child(data.child('ownershipAccess/dataKey').val()).child(auth.uid).exists()"
        );
    }

    #[test]
    fn remote_request_uses_configured_field() {
        let config = RulesConfig {
            remote_request_field: "requester".into(),
            ..RulesConfig::default()
        };
        let p = frags(&config).existing_owned_remote_request();
        assert_eq!(p.to_string(), "data.child('requester').val() === auth.uid");
    }

    #[test]
    fn half_of_connection_write_has_six_alternatives() {
        let config = RulesConfig::default();
        match frags(&config).half_of_connection_write(&Coords::vars("t", "k")) {
            Predicate::Any(parts) => assert_eq!(parts.len(), 6),
            other => panic!("expected a disjunction, got {other}"),
        }
    }
}
