use soil_types::paths;
use tracing::{debug, info};

use crate::config::RulesConfig;
use crate::error::RulesResult;
use crate::fragments::{Coords, Fragments};
use crate::predicate::{Node, Operand, Predicate};
use crate::tree::{PermissionTree, RuleNode};

const INDEX_ON_VALUE: &str = ".value";

/// Turns the relationship vocabulary into a [`PermissionTree`].
///
/// Pure: the same configuration always yields the same tree and digest.
#[derive(Clone, Debug, Default)]
pub struct RulesCompiler {
    config: RulesConfig,
}

impl RulesCompiler {
    pub fn new(config: RulesConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RulesConfig {
        &self.config
    }

    pub fn compile(&self) -> RulesResult<PermissionTree> {
        self.config.validate()?;
        let f = Fragments::new(&self.config);

        let mut root = RuleNode::new().read_write(f.auth_is_admin());
        if self.config.include_usernames {
            root = root.child(paths::USERNAMES, usernames());
        }
        if self.config.include_unverified_users {
            root = root.child(paths::UNVERIFIED_USERS, self_only(&f));
        }
        root = root.child(paths::USERS, self_only(&f));
        if self.config.include_tracking {
            root = root.child(paths::TRACKING, tracking());
        }
        root = root
            .child(paths::OWNERS, owners(&f))
            .child(paths::USER_OWNED_LISTS, user_owned_lists(&f))
            .child(paths::PUBLIC_LISTS, public_lists(&f))
            .child(paths::DATA, data(&f))
            .child(paths::CONNECTION_GRAPH, connection_graph(&f));

        let tree = PermissionTree::new(root);
        debug!(nodes = tree.node_count(), "built permission tree");
        info!(
            identity_type = %self.config.identity_type,
            remote_request_field = %self.config.remote_request_field,
            "compiled permission tree"
        );
        Ok(tree)
    }
}

/// Compile with the given vocabulary.
pub fn compile(config: &RulesConfig) -> RulesResult<PermissionTree> {
    RulesCompiler::new(config.clone()).compile()
}

// ---------------------------------------------------------------------------
// Path families
// ---------------------------------------------------------------------------

fn record() -> Coords {
    Coords::vars("dataType", "dataKey")
}

fn usernames() -> RuleNode {
    let claims = Node::new_data().val().equals(Operand::AuthUid);
    let unclaimed_or_mine = Node::data()
        .exists()
        .negate()
        .or(Node::data().val().equals(Operand::AuthUid));
    RuleNode::new().child(
        "$username",
        RuleNode::new()
            .read(Predicate::True)
            .write(claims.and(unclaimed_or_mine)),
    )
}

fn self_only(f: &Fragments<'_>) -> RuleNode {
    RuleNode::new().child("$uid", RuleNode::new().read_write(f.auth_is_var("uid")))
}

/// Append-only, and only under the caller's own uid.
fn tracking() -> RuleNode {
    RuleNode::new().child(
        "$trackingKey",
        RuleNode::new().write(Predicate::all([
            Node::data().exists().negate(),
            Predicate::AuthNotNull,
            Node::new_data().child("uid").val().equals(Operand::AuthUid),
        ])),
    )
}

fn owners(f: &Fragments<'_>) -> RuleNode {
    let at = record();
    let own_entry = Node::data().auth_uid().exists();
    RuleNode::new().child(
        "$dataType",
        RuleNode::new().child(
            "$dataKey",
            RuleNode::new()
                .read(own_entry.or(f.read_as_owner_or_ownership_access(&at)))
                .write(
                    f.root_data_missing(&at)
                        .or(f.write_as_owner_or_ownership_access(&at)),
                ),
        ),
    )
}

fn user_owned_lists(f: &Fragments<'_>) -> RuleNode {
    let at = record();
    let entry = RuleNode::new()
        .read(f.read_as_owner_or_ownership_access(&at))
        .write(f.write_as_owner_or_ownership_access(&at))
        .validate(Node::new_data().is_number());
    RuleNode::new().child(
        "$uid",
        RuleNode::new().read_write(f.auth_is_var("uid")).child(
            "$dataType",
            RuleNode::new()
                .index_on(INDEX_ON_VALUE)
                .child("$dataKey", entry),
        ),
    )
}

fn public_lists(f: &Fragments<'_>) -> RuleNode {
    let at = record();
    let entry = RuleNode::new()
        .write(
            f.root_data_missing(&at)
                .or(f.write_as_owner_or_ownership_access(&at)),
        )
        .validate(Node::new_data().is_number());
    RuleNode::new().child(
        "$dataType",
        RuleNode::new()
            .read(Predicate::True)
            .index_on(INDEX_ON_VALUE)
            .child("$dataKey", entry),
    )
}

fn data(f: &Fragments<'_>) -> RuleNode {
    let at = record();
    let here = Node::data();
    let read = Predicate::any([
        here.exists().negate(),
        f.public_flag(&here),
        f.existing_owned_remote_request(),
        f.is_owner(&at),
        f.identity_connected(&at),
        f.read_connection_access(&here),
        f.read_ownership_access(&here),
    ]);
    let privileged = Predicate::any([
        f.is_owner(&at),
        f.new_owned_remote_request(),
        f.existing_owned_remote_request(),
        f.write_connection_access(&here),
        f.write_ownership_access(&here),
    ]);
    let write = here
        .exists()
        .negate()
        .or(f.safe_remote_request().and(privileged));
    RuleNode::new().child(
        "$dataType",
        RuleNode::new().child("$dataKey", RuleNode::new().read(read).write(write)),
    )
}

fn connection_graph(f: &Fragments<'_>) -> RuleNode {
    let at = record();
    let other = Coords::vars("connectionType", "connectionKey");
    let edge = RuleNode::new()
        .write(Predicate::all([
            Predicate::AuthNotNull,
            f.half_of_connection_write(&at),
            f.half_of_connection_write(&other),
        ]))
        .validate(f.index_entry_shape());
    let list = RuleNode::new()
        .read(Predicate::AuthNotNull)
        .index_on(INDEX_ON_VALUE)
        .child("$connectionKey", edge);
    let endpoint = RuleNode::new()
        .read(
            f.public_flag(&f.root_data(&at))
                .or(f.read_as_owner_or_ownership_access(&at)),
        )
        .write(f.write_as_owner_or_ownership_access(&at))
        .child("$connectionType", list);
    RuleNode::new().child("$dataType", RuleNode::new().child("$dataKey", endpoint))
}
