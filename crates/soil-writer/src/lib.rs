//! Ordering-aware batched writer for soil.
//!
//! Every engine operation produces a [`WriteSet`](soil_types::WriteSet) that
//! touches several independent index families at once. The store only
//! guarantees atomicity per `batch_apply`, so this crate decides how a
//! write-set is cut into store batches and in which order they are sent.
//!
//! # Key Types
//!
//! - [`BatchedWriter`] — applies a write-set group by group
//! - [`PathGroup`] — ownership, public-list, primary-data, connection-graph, other
//! - [`RateLimitedQueue`] — token-bucket pacing and retry for bulk teardown
//! - [`WriterConfig`] — batch size, pacing, retry policy, root opt-in
//!
//! # Design Rules
//!
//! 1. Merge batches widen grants before the data they expose:
//!    ownership → public-list → primary-data → connection-graph → other.
//! 2. Delete batches run the exact reverse order.
//! 3. A failed group stops the sequence; nothing is retried by `apply`.
//! 4. Only `apply_bulk` spans multiple rounds, and it says so in its result.
//! 5. Root-level writes are refused unless explicitly enabled.

pub mod config;
pub mod error;
pub mod group;
pub mod queue;
pub mod writer;

pub use config::WriterConfig;
pub use error::{WriterError, WriterResult};
pub use group::PathGroup;
pub use queue::{BulkReport, RateLimitedQueue};
pub use writer::{ApplyReport, BatchedWriter};
