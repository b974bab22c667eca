//! Record lifecycle engine for soil.
//!
//! Records of many types live side by side in one path-addressed tree, with
//! denormalized indexes next to them: owner pairs, per-user owned lists,
//! public lists and a mirrored connection graph. Every operation here keeps
//! those indexes consistent with the records they point at.
//!
//! # Key Types
//!
//! - [`Soil`] — the engine context; every operation is a method on it
//! - [`CreateParams`] / [`UpdateParams`] / [`RemoveParams`] — operation inputs
//! - [`RecordSchema`] / [`SchemaRegistry`] — per-type behavior by type tag
//! - [`KeyedRecord`] — a record read back with its key
//! - [`EngineConfig`] — type names, logging and writer settings
//!
//! # Design Rules
//!
//! 1. Every mutating operation computes a [`WriteSet`](soil_types::WriteSet)
//!    first; `plan_*` methods stop there.
//! 2. Writes go through the batched writer, never straight to the store.
//! 3. Owner pairs and connection mirrors are written and cleared in pairs.
//! 4. The public entry exists exactly when `publicAccess` is true.
//! 5. Reading a missing path is an empty result, not an error.
//! 6. No ambient state: the acting user is always an explicit argument.

pub mod config;
mod connections;
mod counters;
mod decode;
pub mod error;
mod lifecycle;
mod ownership;
pub mod params;
pub mod read;
pub mod schema;
pub mod soil;
mod tracking;
pub mod users;

#[cfg(test)]
mod test_support;

pub use config::EngineConfig;
pub use decode::ConnectionList;
pub use error::{EngineError, EngineResult};
pub use params::{
    ChangeKeyReport, CreateParams, RefreshIndexes, RemoveParams, UpdateParams, UpsertOutcome,
};
pub use read::KeyedRecord;
pub use schema::{
    FileSchema, IdentitySchema, PlainSchema, RecordSchema, RemoteRequestSchema, SchemaRegistry,
};
pub use soil::Soil;
