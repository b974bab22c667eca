//! Access-control compiler for soil.
//!
//! The store enforces a declarative permission tree at deploy time. This
//! crate derives that tree from the relationship model the engine
//! maintains: owners, delegated ownership and connection access, public
//! records, identity connections and remote-request markers.
//!
//! # Key Types
//!
//! - [`RulesCompiler`] — vocabulary in, [`PermissionTree`] out
//! - [`PermissionTree`] / [`RuleNode`] — the compiled tree, renderable and evaluable
//! - [`Predicate`] — existence and equality checks over the store tree
//! - [`RulesConfig`] — identity type, remote-request field, optional families
//!
//! # Design Rules
//!
//! 1. Compilation is pure and never touches a store.
//! 2. A connection edge may be written when both endpoints are writable
//!    for edges: public, missing, owned, connected or delegated-readable.
//! 3. A missing record is always readable so clients can subscribe early.
//! 4. A remote-request marker never changes once set; only deleting the
//!    whole record removes it.
//! 5. The artifact digest covers the compact JSON rendering only.

pub mod compiler;
pub mod config;
pub mod error;
mod eval;
pub mod fragments;
pub mod predicate;
pub mod tree;

pub use compiler::{compile, RulesCompiler};
pub use config::RulesConfig;
pub use error::{RulesError, RulesResult};
pub use predicate::{Base, Node, Operand, Predicate, Segment};
pub use tree::{PermissionTree, RuleNode, DIGEST_DOMAIN};
