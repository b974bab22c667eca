//! Collaborator contracts for the soil record layer.
//!
//! soil never talks to a concrete database. It consumes two narrow
//! interfaces that per-runtime adapters implement:
//!
//! - [`TreeStore`] — path reads, atomic multi-path batches, key allocation,
//!   optimistic read-modify-write
//! - [`BlobStore`] — deletion of out-of-tree file contents
//!
//! # Backends
//!
//! - [`InMemoryTreeStore`] — JSON tree for tests and embedding; records each
//!   applied batch and supports one-shot failure injection
//! - [`InMemoryBlobStore`] — locator set
//! - [`LoggedTreeStore`] — decorator that logs failed requests with their path
//!   and a truncated payload, then returns the error unchanged
//!
//! # Design Rules
//!
//! 1. Missing data is `Ok(None)`, never an error.
//! 2. One `batch_apply` is atomic; ordering across batches is the caller's job.
//! 3. Root-level paths are refused.
//! 4. Errors are propagated, never swallowed; logging does not change them.

pub mod error;
pub mod logged;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use logged::LoggedTreeStore;
pub use memory::{AppliedBatch, InMemoryBlobStore, InMemoryTreeStore};
pub use traits::{BlobStore, TransactionFn, TreeStore, WriteMode};
