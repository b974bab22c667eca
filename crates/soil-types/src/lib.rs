//! Foundation types for the soil record layer.
//!
//! soil stores many independent data types as flat records in one shared
//! path-addressed tree, and keeps denormalized indexes (owners, per-user
//! lists, public lists, a mirrored connection graph) next to them. This
//! crate holds the vocabulary every other soil crate speaks.
//!
//! # Key Types
//!
//! - [`DataType`], [`DataKey`], [`Uid`] — validated path segments
//! - [`Record`] — engine metadata plus payload fields
//! - [`ConnectionAccess`] / [`OwnershipAccess`] — delegated access descriptors
//! - [`Connection`] / [`ConnectionPair`] — edges and their directional payload
//! - [`Timestamp`] / [`IndexTimes`] — index entry values
//! - [`WriteSet`] — the flat `path -> value | null` map every operation produces
//!
//! The [`paths`] module is the single place tree paths are spelled out.

pub mod connection;
pub mod error;
pub mod ids;
pub mod paths;
pub mod record;
pub mod temporal;
pub mod write_set;

pub use connection::{
    edge_entry, entry_payload, entry_stamp, restamp_entry, Connection, ConnectionPair,
    ConnectionPayload, Direction,
};
pub use error::{TypeError, TypeResult};
pub use ids::{DataKey, DataType, RecordRef, Uid};
pub use record::{ConnectionAccess, OwnershipAccess, Record};
pub use temporal::{IndexTimes, Timestamp};
pub use write_set::WriteSet;
