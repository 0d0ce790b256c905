//! Durable offline operation queue for Canopy.
//!
//! The [`OperationLog`] owns the pending-mutation list: an append-only,
//! per-workspace FIFO persisted through an opaque key-value byte store so it
//! survives reloads. Entries leave the queue only when the sync engine
//! confirms them against the backend; the log itself never decides a
//! mutation is done.
//!
//! The queue is bounded. When the cap is exceeded the oldest entries are
//! evicted and reported; accepting new work always wins over keeping old
//! work, but the loss is surfaced, never swallowed.

mod error;
mod kv;
mod log;

pub use error::{OplogError, OplogResult};
pub use kv::{FileStore, MemoryStore, QueueStore};
pub use log::{OperationLog, DEFAULT_CAPACITY};
