//! Structural moves: re-parent with optimistic update, contention-aware
//! retry, and rollback.

use crate::backend::OrderUpdate;
use crate::engine::SyncEngine;
use crate::error::SyncResult;
use crate::retry::RetryPolicy;
use canopy_store::StoreError;
use canopy_types::{Item, ItemId, ItemPatch, PendingOperation, WorkspaceId};
use std::sync::Arc;
use tracing::{debug, warn};

/// Applies a single re-parent/reorder mutation.
///
/// The cache reflects the move immediately. The backend call retries
/// write-conflict errors a bounded number of times with jittered backoff
/// (concurrent movers racing into the same write lock should not retry in
/// lockstep); any other error class fails without retry. Exhausted retries
/// roll the cache back to the pre-move parent and surface the error. A
/// confirmed move schedules a follow-up workspace re-sync so hierarchy-wide
/// invariants the move disturbed (sibling renumbering on both parents) are
/// reconstituted from server truth.
pub struct MoveCoordinator {
    engine: Arc<SyncEngine>,
    retry: RetryPolicy,
}

impl MoveCoordinator {
    /// Creates a coordinator with the default retry policy (3 attempts,
    /// 50–200 ms jitter, contention only).
    #[must_use]
    pub fn new(engine: Arc<SyncEngine>) -> Self {
        Self::with_retry(engine, RetryPolicy::default())
    }

    /// Creates a coordinator with an explicit retry policy.
    #[must_use]
    pub fn with_retry(engine: Arc<SyncEngine>, retry: RetryPolicy) -> Self {
        Self { engine, retry }
    }

    /// Moves `id` under `new_parent` (`None` = workspace root), appending
    /// it after the target's current children.
    ///
    /// Returns the server-confirmed item, or the optimistic item when the
    /// backend is unreachable and the move rides the offline queue instead.
    pub async fn move_item(
        &self,
        id: &ItemId,
        new_parent: Option<ItemId>,
        workspace: &WorkspaceId,
    ) -> SyncResult<Item> {
        let store = self.engine.store();
        if store.get(id).await.is_none() {
            return Err(StoreError::NotFound(id.clone()).into());
        }

        // Append after the target parent's current children.
        let order_index = store
            .workspace_items(workspace)
            .await
            .iter()
            .filter(|i| i.parent_id == new_parent && i.id != *id)
            .map(|i| i.order_index)
            .max()
            .map_or(0, |m| m + 1);

        let patch = ItemPatch::new().parent(new_parent.clone()).order(order_index);
        let reverse = store.apply_patch(id, &patch).await?;

        // An unconfirmed item cannot be addressed server-side yet; the move
        // rides the queue and is remapped once its CREATE is acknowledged.
        let ids = self.engine.id_map().await;
        let target = ids.resolve(id);
        if target.is_temp() {
            debug!(item = %id, "target unconfirmed, queueing move");
            return self
                .queue_move(id, workspace, new_parent, order_index)
                .await;
        }

        let update = OrderUpdate {
            item_id: target.clone(),
            parent_id: new_parent.as_ref().map(|p| ids.resolve(p)),
            order_index,
        };
        let backend = self.engine.backend();
        let outcome = self
            .retry
            .run(|| backend.update_order(workspace, update.clone()))
            .await;

        match outcome {
            Ok(server_item) => {
                let confirm = ItemPatch::new()
                    .parent(server_item.parent_id.clone())
                    .order(server_item.order_index);
                store
                    .confirm_fields(&target, &confirm, server_item.updated_at)
                    .await;
                self.schedule_resync(workspace);
                Ok(server_item)
            }
            Err(e) if e.is_transient() => {
                debug!(item = %id, "backend unreachable, queueing move for later sync");
                self.queue_move(id, workspace, new_parent, order_index).await
            }
            Err(e) => {
                warn!(item = %id, error = %e, "move failed, rolling back");
                store.rollback(id, &reverse).await;
                Err(e)
            }
        }
    }

    /// Enqueues the move for batch sync, keeping the optimistic state.
    async fn queue_move(
        &self,
        id: &ItemId,
        workspace: &WorkspaceId,
        new_parent: Option<ItemId>,
        order_index: i64,
    ) -> SyncResult<Item> {
        let op = PendingOperation::update_order(
            id.clone(),
            workspace.clone(),
            new_parent,
            order_index,
        );
        self.engine.queue_operation(op).await?;
        self.engine
            .store()
            .get(id)
            .await
            .ok_or_else(|| StoreError::NotFound(id.clone()).into())
    }

    /// Fire-and-forget follow-up drain; failures surface through the
    /// engine's own logging and phase state.
    fn schedule_resync(&self, workspace: &WorkspaceId) {
        let engine = Arc::clone(&self.engine);
        let workspace = workspace.clone();
        tokio::spawn(async move {
            if let Err(e) = engine.sync_workspace(&workspace).await {
                warn!(workspace = %workspace, error = %e, "post-move resync failed");
            }
        });
    }
}
