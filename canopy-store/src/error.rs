//! Error types for the store layer.

use canopy_types::ItemId;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The target item is not in the cache.
    #[error("item not found: {0}")]
    NotFound(ItemId),
}
