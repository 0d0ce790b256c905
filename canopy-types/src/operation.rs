//! Pending operations: mutations queued for replay against the backend.
//!
//! Every local mutation that cannot be confirmed synchronously is captured
//! as a [`PendingOperation`] and appended to the offline log. Operations are
//! replayed strictly in enqueue order per workspace, because later entries
//! may reference ids produced by earlier ones (a CREATE followed by a child
//! CREATE naming the first as parent).

use crate::{IdMap, Item, ItemId, ItemPatch, WorkspaceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The mutation a pending operation carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationPayload {
    /// Create a new item. The item's id is the temporary correlation id.
    Create { item: Item },
    /// Patch an existing item's fields.
    Update { patch: ItemPatch },
    /// Soft-delete an item.
    Delete,
    /// Re-parent and/or reorder an item.
    UpdateOrder {
        parent_id: Option<ItemId>,
        order_index: i64,
    },
}

/// A queued mutation awaiting backend confirmation.
///
/// `item_id` doubles as the operation id: the temporary item id for CREATE,
/// the target item id otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOperation {
    pub item_id: ItemId,
    pub workspace_id: WorkspaceId,
    pub payload: OperationPayload,
    pub queued_at: DateTime<Utc>,
}

impl PendingOperation {
    /// Queues the creation of `item`.
    #[must_use]
    pub fn create(item: Item) -> Self {
        Self {
            item_id: item.id.clone(),
            workspace_id: item.workspace_id.clone(),
            payload: OperationPayload::Create { item },
            queued_at: Utc::now(),
        }
    }

    /// Queues a field update for `item_id`.
    #[must_use]
    pub fn update(item_id: ItemId, workspace_id: WorkspaceId, patch: ItemPatch) -> Self {
        Self {
            item_id,
            workspace_id,
            payload: OperationPayload::Update { patch },
            queued_at: Utc::now(),
        }
    }

    /// Queues a soft delete for `item_id`.
    #[must_use]
    pub fn delete(item_id: ItemId, workspace_id: WorkspaceId) -> Self {
        Self {
            item_id,
            workspace_id,
            payload: OperationPayload::Delete,
            queued_at: Utc::now(),
        }
    }

    /// Queues a re-parent/reorder for `item_id`.
    #[must_use]
    pub fn update_order(
        item_id: ItemId,
        workspace_id: WorkspaceId,
        parent_id: Option<ItemId>,
        order_index: i64,
    ) -> Self {
        Self {
            item_id,
            workspace_id,
            payload: OperationPayload::UpdateOrder {
                parent_id,
                order_index,
            },
            queued_at: Utc::now(),
        }
    }

    /// True for CREATE operations.
    #[must_use]
    pub fn is_create(&self) -> bool {
        matches!(self.payload, OperationPayload::Create { .. })
    }

    /// Rewrites every embedded id through the translation table: the target
    /// id, parents inside CREATE payloads, and UPDATE/UPDATE_ORDER parent
    /// references. Ids without a mapping pass through unchanged.
    pub fn remap(&mut self, ids: &IdMap) {
        self.item_id = ids.resolve(&self.item_id);
        match &mut self.payload {
            OperationPayload::Create { item } => {
                item.id = ids.resolve(&item.id);
                if let Some(parent) = &item.parent_id {
                    item.parent_id = Some(ids.resolve(parent));
                }
            }
            OperationPayload::Update { patch } => {
                if let Some(Some(parent)) = &patch.parent_id {
                    patch.parent_id = Some(Some(ids.resolve(parent)));
                }
            }
            OperationPayload::UpdateOrder { parent_id, .. } => {
                if let Some(parent) = parent_id {
                    *parent_id = Some(ids.resolve(parent));
                }
            }
            OperationPayload::Delete => {}
        }
    }
}
