//! Error types for the sync layer.
//!
//! The taxonomy drives policy: transient network failures keep operations
//! queued for a later attempt, contention is retried a bounded number of
//! times with jitter, and validation rejections are surfaced immediately
//! with the optimistic change rolled back.

use canopy_types::WorkspaceId;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The backend was unreachable; the operation was not confirmed and is
    /// safe to retry later.
    #[error("network error: {0}")]
    Network(String),

    /// The backend reported a write-conflict/lock contention condition.
    /// Worth a bounded, jittered retry.
    #[error("write contention: {0}")]
    Contention(String),

    /// The backend rejected the payload (invalid or target missing).
    /// Never retried.
    #[error("rejected by backend: {0}")]
    Rejected(String),

    /// The operation log failed underneath us.
    #[error("operation log error: {0}")]
    Oplog(#[from] canopy_oplog::OplogError),

    /// The item store failed underneath us.
    #[error("store error: {0}")]
    Store(#[from] canopy_store::StoreError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// This workspace's queue hit a fatal condition (corrupt payload) and
    /// is no longer processed. Other workspaces are unaffected.
    #[error("queue poisoned for workspace {0}")]
    QueuePoisoned(WorkspaceId),

    /// A bulk-creation plan contains a parent cycle.
    #[error("creation plan has a parent cycle involving {0} proposals")]
    PlanCycle(usize),
}

impl SyncError {
    /// True for failures where the operation was never confirmed and can
    /// simply wait in the queue.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::Network(_))
    }

    /// True for write-conflict failures worth a jittered retry.
    #[must_use]
    pub fn is_contention(&self) -> bool {
        matches!(self, SyncError::Contention(_))
    }
}
