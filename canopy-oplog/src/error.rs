//! Error types for the operation log.

use canopy_types::WorkspaceId;
use thiserror::Error;

/// Result type for operation-log calls.
pub type OplogResult<T> = Result<T, OplogError>;

/// Errors that can occur in operation-log calls.
#[derive(Debug, Error)]
pub enum OplogError {
    /// The underlying key-value store failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// IO error from a file-backed store.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serializing a queue for persistence failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A persisted queue payload failed to decode. Fatal for that
    /// workspace's queue; other workspaces are unaffected.
    #[error("corrupt queue payload for workspace {workspace}: {detail}")]
    Corrupt {
        workspace: WorkspaceId,
        detail: String,
    },
}
