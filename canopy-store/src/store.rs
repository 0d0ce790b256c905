//! The in-memory item cache.

use crate::{StoreError, StoreResult};
use canopy_types::{IdMap, Item, ItemId, ItemPatch, WorkspaceId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Client-side authoritative cache of items, indexed by id and by workspace.
///
/// Reads return snapshots and never block on the network. Writes fall into
/// three classes with different timestamp discipline:
///
/// - *optimistic* writes ([`apply_optimistic`](Self::apply_optimistic),
///   [`apply_patch`](Self::apply_patch)) stamp `updated_at` with the local
///   time of application;
/// - *reconciliation* ([`reconcile`](Self::reconcile),
///   [`confirm_fields`](Self::confirm_fields)) carries server timestamps,
///   which always win, except that a confirmation older than the item's
///   current `updated_at` is stale (superseded by a newer local mutation)
///   and is ignored;
/// - *rollback* ([`rollback`](Self::rollback)) restores prior field values
///   without pretending to be a fresh mutation.
pub struct ItemStore {
    inner: RwLock<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    items: HashMap<ItemId, Item>,
    /// Per-workspace id lists, insertion-ordered.
    by_workspace: HashMap<WorkspaceId, Vec<ItemId>>,
}

impl ItemStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
        }
    }

    /// Returns a snapshot of one item.
    pub async fn get(&self, id: &ItemId) -> Option<Item> {
        self.inner.read().await.items.get(id).cloned()
    }

    /// Returns a snapshot of every cached item in a workspace, in cache
    /// insertion order. Sibling ordering is the hierarchy builder's job.
    pub async fn workspace_items(&self, workspace: &WorkspaceId) -> Vec<Item> {
        let inner = self.inner.read().await;
        inner
            .by_workspace
            .get(workspace)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| inner.items.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of cached items in a workspace.
    pub async fn len(&self, workspace: &WorkspaceId) -> usize {
        self.inner
            .read()
            .await
            .by_workspace
            .get(workspace)
            .map_or(0, Vec::len)
    }

    /// Inserts or replaces an item ahead of backend confirmation.
    /// Stamps `updated_at` with the time of application.
    pub async fn apply_optimistic(&self, mut item: Item) {
        item.touch();
        let mut inner = self.inner.write().await;
        inner.index(&item);
        debug!(item = %item.id, workspace = %item.workspace_id, "optimistic apply");
        inner.items.insert(item.id.clone(), item);
    }

    /// Patches an item in place ahead of confirmation and returns the
    /// reverse snapshot for rollback.
    pub async fn apply_patch(&self, id: &ItemId, patch: &ItemPatch) -> StoreResult<ItemPatch> {
        let mut inner = self.inner.write().await;
        let item = inner
            .items
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        let reverse = patch.snapshot_of(item);
        patch.apply_to(item);
        item.touch();
        debug!(item = %id, "optimistic patch");
        Ok(reverse)
    }

    /// Restores prior field values after a mutation is confirmed failed.
    /// A no-op when the item no longer exists (deleted server-side in the
    /// interim).
    pub async fn rollback(&self, id: &ItemId, previous: &ItemPatch) {
        let mut inner = self.inner.write().await;
        match inner.items.get_mut(id) {
            Some(item) => {
                previous.apply_to(item);
                warn!(item = %id, "rolled back failed mutation");
            }
            None => debug!(item = %id, "rollback target gone, ignoring"),
        }
    }

    /// Id/field-scoped write-back of a single server confirmation.
    ///
    /// Returns `Ok(true)` when applied. A confirmation whose `updated_at`
    /// predates the item's current one is stale (a newer local mutation has
    /// superseded the call that produced it) and is ignored, as is a
    /// confirmation for an item no longer cached.
    pub async fn confirm_fields(
        &self,
        id: &ItemId,
        fields: &ItemPatch,
        server_updated_at: DateTime<Utc>,
    ) -> bool {
        let mut inner = self.inner.write().await;
        let Some(item) = inner.items.get_mut(id) else {
            debug!(item = %id, "confirmation for uncached item, ignoring");
            return false;
        };
        if server_updated_at < item.updated_at {
            debug!(item = %id, "stale confirmation, ignoring");
            return false;
        }
        fields.apply_to(item);
        item.updated_at = server_updated_at;
        true
    }

    /// Removes an item from the cache entirely (e.g. a failed CREATE whose
    /// optimistic insert must be withdrawn).
    pub async fn remove(&self, id: &ItemId) -> Option<Item> {
        let mut inner = self.inner.write().await;
        let item = inner.items.remove(id)?;
        if let Some(ids) = inner.by_workspace.get_mut(&item.workspace_id) {
            ids.retain(|i| i != id);
        }
        Some(item)
    }

    /// Rewrites temporary ids (keys and parent references) in one workspace
    /// through the translation table.
    pub async fn translate_ids(&self, workspace: &WorkspaceId, ids: &IdMap) {
        let mut inner = self.inner.write().await;
        inner.translate(workspace, ids);
    }

    /// Merges an authoritative server snapshot into the cache.
    ///
    /// Temporary ids are translated first so confirmed items match by their
    /// server id instead of duplicating. Server data replaces cache entries
    /// wholesale (server timestamps win). Cached items absent from the
    /// snapshot are dropped unless they are still-unconfirmed temporaries,
    /// which survive with their optimistic state. Idempotent.
    pub async fn reconcile(&self, workspace: &WorkspaceId, server_items: Vec<Item>, ids: &IdMap) {
        let mut inner = self.inner.write().await;
        inner.translate(workspace, ids);

        let previous = inner.by_workspace.remove(workspace).unwrap_or_default();
        let mut next: Vec<ItemId> = Vec::with_capacity(server_items.len());

        for item in server_items {
            next.push(item.id.clone());
            inner.items.insert(item.id.clone(), item);
        }

        let mut kept = 0usize;
        for id in previous {
            if next.contains(&id) {
                continue;
            }
            if id.is_temp() {
                // Still awaiting confirmation; keep the optimistic entry.
                next.push(id);
                kept += 1;
            } else {
                inner.items.remove(&id);
            }
        }
        debug!(
            workspace = %workspace,
            items = next.len(),
            unconfirmed = kept,
            "reconciled server snapshot"
        );
        inner.by_workspace.insert(workspace.clone(), next);
    }
}

impl Default for ItemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreInner {
    /// Ensures `item` has an index slot in its workspace.
    fn index(&mut self, item: &Item) {
        let ids = self.by_workspace.entry(item.workspace_id.clone()).or_default();
        if !ids.contains(&item.id) {
            ids.push(item.id.clone());
        }
    }

    fn translate(&mut self, workspace: &WorkspaceId, ids: &IdMap) {
        if ids.is_empty() {
            return;
        }
        let Some(index) = self.by_workspace.get_mut(workspace) else {
            return;
        };
        for slot in index.iter_mut() {
            let resolved = ids.resolve(slot);
            if resolved != *slot {
                if let Some(mut item) = self.items.remove(slot) {
                    item.id = resolved.clone();
                    self.items.insert(resolved.clone(), item);
                }
                *slot = resolved;
            }
        }
        // Parent references may name a temp id anywhere in the workspace.
        for id in index.iter() {
            if let Some(item) = self.items.get_mut(id) {
                if let Some(parent) = &item.parent_id {
                    let resolved = ids.resolve(parent);
                    if resolved != *parent {
                        item.parent_id = Some(resolved);
                    }
                }
            }
        }
    }
}
