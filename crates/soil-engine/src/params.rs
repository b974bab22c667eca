//! Parameter objects for the record lifecycle operations.

use serde_json::{Map, Value};
use soil_types::{
    Connection, ConnectionAccess, IndexTimes, OwnershipAccess, RecordRef, Timestamp, Uid, WriteSet,
};

// ---------------------------------------------------------------------------
// create
// ---------------------------------------------------------------------------

/// Input to [`Soil::create`](crate::Soil::create).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CreateParams {
    pub data: Map<String, Value>,
    pub owners: Vec<Uid>,
    pub public_access: bool,
    pub connections: Vec<Connection>,
    pub connection_access: Option<ConnectionAccess>,
    pub ownership_access: Option<OwnershipAccess>,
    pub times: IndexTimes,
    /// Overrides `createdAt`; `times.now` is used otherwise.
    pub created_at: Option<Timestamp>,
}

impl CreateParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(name.into(), value.into());
        self
    }

    pub fn owner(mut self, uid: Uid) -> Self {
        self.owners.push(uid);
        self
    }

    pub fn owners(mut self, uids: impl IntoIterator<Item = Uid>) -> Self {
        self.owners.extend(uids);
        self
    }

    pub fn public(mut self, public_access: bool) -> Self {
        self.public_access = public_access;
        self
    }

    pub fn connection(mut self, connection: Connection) -> Self {
        self.connections.push(connection);
        self
    }

    pub fn connections(mut self, connections: impl IntoIterator<Item = Connection>) -> Self {
        self.connections.extend(connections);
        self
    }

    pub fn connection_access(mut self, access: ConnectionAccess) -> Self {
        self.connection_access = Some(access);
        self
    }

    pub fn ownership_access(mut self, access: OwnershipAccess) -> Self {
        self.ownership_access = Some(access);
        self
    }

    pub fn times(mut self, times: IndexTimes) -> Self {
        self.times = times;
        self
    }

    pub fn created_at(mut self, ts: Timestamp) -> Self {
        self.created_at = Some(ts);
        self
    }
}

// ---------------------------------------------------------------------------
// update
// ---------------------------------------------------------------------------

/// Which existing index entries an update re-stamps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefreshIndexes {
    pub owners: bool,
    pub connections: bool,
    /// The public entry, when the record is already public.
    pub public: bool,
}

impl RefreshIndexes {
    pub fn all() -> Self {
        Self {
            owners: true,
            connections: true,
            public: true,
        }
    }

    pub fn none() -> Self {
        Self {
            owners: false,
            connections: false,
            public: false,
        }
    }

    pub fn any(&self) -> bool {
        self.owners || self.connections || self.public
    }
}

impl Default for RefreshIndexes {
    fn default() -> Self {
        Self::all()
    }
}

/// Input to [`Soil::update`](crate::Soil::update).
///
/// Owners and connections given here are added; an update never removes
/// either.
#[derive(Clone, Debug, PartialEq)]
pub struct UpdateParams {
    /// Fields merged one by one into the record.
    pub data: Map<String, Value>,
    pub owners: Vec<Uid>,
    pub connections: Vec<Connection>,
    /// `Some` sets the flag and adds or clears the public entry with it.
    pub public_access: Option<bool>,
    pub connection_access: Option<ConnectionAccess>,
    pub ownership_access: Option<OwnershipAccess>,
    pub refresh: RefreshIndexes,
    /// Stamp `updatedAt`. Off for writes that must not wake watchers.
    pub include_updated_at: bool,
    pub times: IndexTimes,
}

impl Default for UpdateParams {
    fn default() -> Self {
        Self {
            data: Map::new(),
            owners: Vec::new(),
            connections: Vec::new(),
            public_access: None,
            connection_access: None,
            ownership_access: None,
            refresh: RefreshIndexes::all(),
            include_updated_at: true,
            times: IndexTimes::now(),
        }
    }
}

impl UpdateParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(name.into(), value.into());
        self
    }

    pub fn owner(mut self, uid: Uid) -> Self {
        self.owners.push(uid);
        self
    }

    pub fn connection(mut self, connection: Connection) -> Self {
        self.connections.push(connection);
        self
    }

    pub fn public(mut self, public_access: bool) -> Self {
        self.public_access = Some(public_access);
        self
    }

    pub fn connection_access(mut self, access: ConnectionAccess) -> Self {
        self.connection_access = Some(access);
        self
    }

    pub fn ownership_access(mut self, access: OwnershipAccess) -> Self {
        self.ownership_access = Some(access);
        self
    }

    pub fn refresh(mut self, refresh: RefreshIndexes) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn without_updated_at(mut self) -> Self {
        self.include_updated_at = false;
        self
    }

    pub fn times(mut self, times: IndexTimes) -> Self {
        self.times = times;
        self
    }
}

impl From<CreateParams> for UpdateParams {
    /// Used by upsert when the record turns out to exist. `created_at` is
    /// dropped so the stored creation time survives.
    fn from(params: CreateParams) -> Self {
        Self {
            data: params.data,
            owners: params.owners,
            connections: params.connections,
            public_access: Some(params.public_access),
            connection_access: params.connection_access,
            ownership_access: params.ownership_access,
            refresh: RefreshIndexes::all(),
            include_updated_at: true,
            times: params.times,
        }
    }
}

// ---------------------------------------------------------------------------
// remove / change key / upsert
// ---------------------------------------------------------------------------

/// Known relationships of a record about to be removed. Anything left as
/// `None` is read from the store.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RemoveParams {
    pub existing_owners: Option<Vec<Uid>>,
    pub existing_connections: Option<Vec<RecordRef>>,
}

impl RemoveParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owners(mut self, uids: Vec<Uid>) -> Self {
        self.existing_owners = Some(uids);
        self
    }

    pub fn connections(mut self, targets: Vec<RecordRef>) -> Self {
        self.existing_connections = Some(targets);
        self
    }
}

/// What `upsert` ended up doing.
#[derive(Clone, Debug, PartialEq)]
pub enum UpsertOutcome {
    Created(WriteSet),
    Updated(WriteSet),
}

impl UpsertOutcome {
    pub fn write_set(&self) -> &WriteSet {
        match self {
            Self::Created(ws) | Self::Updated(ws) => ws,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Result of moving a record to new coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct ChangeKeyReport {
    pub owners: Vec<Uid>,
    pub connections: Vec<RecordRef>,
    pub write_set: WriteSet,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn update_defaults_refresh_everything() {
        let params = UpdateParams::new();
        assert_eq!(params.refresh, RefreshIndexes::all());
        assert!(params.include_updated_at);
        assert!(!RefreshIndexes::none().any());
    }

    #[test]
    fn create_builder_collects_fields() {
        let params = CreateParams::new()
            .field("title", "hello")
            .owner(Uid::new("u1").unwrap())
            .public(true);
        assert_eq!(params.data.get("title"), Some(&json!("hello")));
        assert_eq!(params.owners.len(), 1);
        assert!(params.public_access);
    }

    #[test]
    fn create_converts_to_update() {
        let params = CreateParams::new().field("n", 1).public(false);
        let update = UpdateParams::from(params);
        assert_eq!(update.public_access, Some(false));
        assert_eq!(update.data.get("n"), Some(&json!(1)));
    }
}
