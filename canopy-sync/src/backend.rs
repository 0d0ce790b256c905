//! Backend collaborator abstraction.
//!
//! The HTTP layer is outside this crate; the sync core talks to an
//! [`ItemBackend`] and treats it as an opaque authority. The batch endpoint
//! acknowledges every submitted operation individually, so partial results
//! never force an all-or-nothing guess about what the server kept.

use crate::error::SyncResult;
use async_trait::async_trait;
use canopy_types::{Item, ItemId, ItemPatch, PendingOperation, WorkspaceId};
use serde::{Deserialize, Serialize};

/// Payload for the order-update endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderUpdate {
    pub item_id: ItemId,
    pub parent_id: Option<ItemId>,
    pub order_index: i64,
}

/// Failure class reported by the backend for a single operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendErrorKind {
    /// Could not reach or complete; retriable.
    Network,
    /// Write lock contention; retriable with jitter.
    Contention,
    /// Structurally invalid payload; not retried.
    Validation,
    /// Target missing server-side; not retried.
    NotFound,
}

/// Per-operation outcome inside a batch response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AckResult {
    /// The operation was applied. CREATEs carry the server-assigned id;
    /// the server may also echo the resulting item state.
    Confirmed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        server_id: Option<ItemId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        item: Option<Item>,
    },
    /// The operation failed.
    Failed {
        error: BackendErrorKind,
        message: String,
    },
}

/// Acknowledgement for one submitted operation, keyed by the operation id
/// it was submitted under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationAck {
    pub item_id: ItemId,
    pub result: AckResult,
}

/// Structured result of a batch-sync call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// True when every operation was confirmed.
    pub success: bool,
    pub synced: usize,
    pub failed: usize,
    /// One acknowledgement per submitted operation, in submission order.
    pub acks: Vec<OperationAck>,
}

/// The backend item API: CRUD scoped to a workspace, an order-update
/// endpoint, and a batch-sync endpoint draining queued operations.
#[async_trait]
pub trait ItemBackend: Send + Sync {
    /// Creates an item; returns the server's version (server id assigned).
    async fn create_item(&self, item: &Item) -> SyncResult<Item>;

    /// Patches an item; returns the server's resulting version.
    async fn update_item(&self, id: &ItemId, patch: &ItemPatch) -> SyncResult<Item>;

    /// Soft-deletes an item.
    async fn delete_item(&self, id: &ItemId) -> SyncResult<()>;

    /// Re-parents/reorders an item; returns the server's resulting version.
    /// May fail with a contention-class error under concurrent moves.
    async fn update_order(&self, workspace: &WorkspaceId, update: OrderUpdate) -> SyncResult<Item>;

    /// Fetches the authoritative item list for a workspace.
    async fn fetch_items(&self, workspace: &WorkspaceId) -> SyncResult<Vec<Item>>;

    /// Applies an ordered list of pending operations in one round trip.
    async fn sync_batch(
        &self,
        workspace: &WorkspaceId,
        operations: Vec<PendingOperation>,
    ) -> SyncResult<BatchOutcome>;
}

/// A scriptable in-memory backend for testing.
pub mod mock {
    use super::*;
    use crate::error::SyncError;
    use canopy_types::OperationPayload;
    use chrono::Utc;
    use std::collections::{HashMap, HashSet, VecDeque};
    use std::sync::Mutex;

    /// Scripted failure consumed by the next backend call.
    #[derive(Debug, Clone)]
    pub struct ScriptedFailure {
        pub kind: BackendErrorKind,
        pub message: String,
    }

    impl ScriptedFailure {
        fn into_error(self) -> SyncError {
            match self.kind {
                BackendErrorKind::Network => SyncError::Network(self.message),
                BackendErrorKind::Contention => SyncError::Contention(self.message),
                BackendErrorKind::Validation => SyncError::Rejected(self.message),
                BackendErrorKind::NotFound => SyncError::Rejected(self.message),
            }
        }
    }

    /// In-memory [`ItemBackend`] holding server-side truth, with failure
    /// injection and call recording.
    #[derive(Default)]
    pub struct MockBackend {
        items: Mutex<HashMap<WorkspaceId, Vec<Item>>>,
        failures: Mutex<VecDeque<ScriptedFailure>>,
        rejected: Mutex<HashSet<ItemId>>,
        calls: Mutex<Vec<String>>,
        next_id: Mutex<u64>,
    }

    impl MockBackend {
        /// Creates an empty backend.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Scripts the next call to fail with `kind`.
        pub fn push_failure(&self, kind: BackendErrorKind, message: impl Into<String>) {
            self.failures.lock().expect("mock lock").push_back(ScriptedFailure {
                kind,
                message: message.into(),
            });
        }

        /// Scripts the next `n` calls to fail with `kind`.
        pub fn push_failures(&self, kind: BackendErrorKind, n: usize) {
            for _ in 0..n {
                self.push_failure(kind, "scripted failure");
            }
        }

        /// Marks a submitted operation id to be rejected inside batch acks.
        pub fn reject_in_batch(&self, id: ItemId) {
            self.rejected.lock().expect("mock lock").insert(id);
        }

        /// Seeds server-side items for a workspace.
        pub fn seed(&self, workspace: &WorkspaceId, items: Vec<Item>) {
            self.items
                .lock()
                .expect("mock lock")
                .insert(workspace.clone(), items);
        }

        /// Names of backend methods invoked, in order.
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("mock lock").clone()
        }

        /// How many times `name` was invoked.
        pub fn call_count(&self, name: &str) -> usize {
            self.calls
                .lock()
                .expect("mock lock")
                .iter()
                .filter(|c| *c == name)
                .count()
        }

        fn record(&self, name: &str) {
            self.calls.lock().expect("mock lock").push(name.to_string());
        }

        fn take_failure(&self) -> Option<ScriptedFailure> {
            self.failures.lock().expect("mock lock").pop_front()
        }

        fn mint_id(&self) -> ItemId {
            let mut next = self.next_id.lock().expect("mock lock");
            *next += 1;
            ItemId::from_server(format!("srv-{next}"))
        }

        fn store_item(&self, mut item: Item) -> Item {
            item.updated_at = Utc::now();
            let mut items = self.items.lock().expect("mock lock");
            let list = items.entry(item.workspace_id.clone()).or_default();
            match list.iter_mut().find(|i| i.id == item.id) {
                Some(slot) => *slot = item.clone(),
                None => list.push(item.clone()),
            }
            item
        }
    }

    #[async_trait]
    impl ItemBackend for MockBackend {
        async fn create_item(&self, item: &Item) -> SyncResult<Item> {
            self.record("create_item");
            if let Some(failure) = self.take_failure() {
                return Err(failure.into_error());
            }
            let mut created = item.clone();
            created.id = self.mint_id();
            Ok(self.store_item(created))
        }

        async fn update_item(&self, id: &ItemId, patch: &ItemPatch) -> SyncResult<Item> {
            self.record("update_item");
            if let Some(failure) = self.take_failure() {
                return Err(failure.into_error());
            }
            let mut items = self.items.lock().expect("mock lock");
            for list in items.values_mut() {
                if let Some(item) = list.iter_mut().find(|i| i.id == *id) {
                    patch.apply_to(item);
                    item.updated_at = Utc::now();
                    return Ok(item.clone());
                }
            }
            Err(SyncError::Rejected(format!("item not found: {id}")))
        }

        async fn delete_item(&self, id: &ItemId) -> SyncResult<()> {
            self.record("delete_item");
            if let Some(failure) = self.take_failure() {
                return Err(failure.into_error());
            }
            let mut items = self.items.lock().expect("mock lock");
            for list in items.values_mut() {
                if let Some(item) = list.iter_mut().find(|i| i.id == *id) {
                    item.soft_delete();
                    return Ok(());
                }
            }
            Err(SyncError::Rejected(format!("item not found: {id}")))
        }

        async fn update_order(
            &self,
            workspace: &WorkspaceId,
            update: OrderUpdate,
        ) -> SyncResult<Item> {
            self.record("update_order");
            if let Some(failure) = self.take_failure() {
                return Err(failure.into_error());
            }
            let mut items = self.items.lock().expect("mock lock");
            let list = items.entry(workspace.clone()).or_default();
            let Some(item) = list.iter_mut().find(|i| i.id == update.item_id) else {
                return Err(SyncError::Rejected(format!(
                    "item not found: {}",
                    update.item_id
                )));
            };
            item.parent_id = update.parent_id;
            item.order_index = update.order_index;
            item.updated_at = Utc::now();
            Ok(item.clone())
        }

        async fn fetch_items(&self, workspace: &WorkspaceId) -> SyncResult<Vec<Item>> {
            self.record("fetch_items");
            if let Some(failure) = self.take_failure() {
                return Err(failure.into_error());
            }
            Ok(self
                .items
                .lock()
                .expect("mock lock")
                .get(workspace)
                .cloned()
                .unwrap_or_default())
        }

        async fn sync_batch(
            &self,
            workspace: &WorkspaceId,
            operations: Vec<PendingOperation>,
        ) -> SyncResult<BatchOutcome> {
            self.record("sync_batch");
            if let Some(failure) = self.take_failure() {
                return Err(failure.into_error());
            }

            // Temp ids resolved within the batch: CREATE before dependents.
            let mut batch_ids = canopy_types::IdMap::new();
            let mut acks = Vec::with_capacity(operations.len());

            for mut op in operations {
                let submitted_id = op.item_id.clone();
                if self.rejected.lock().expect("mock lock").contains(&submitted_id) {
                    acks.push(OperationAck {
                        item_id: submitted_id,
                        result: AckResult::Failed {
                            error: BackendErrorKind::Validation,
                            message: "rejected payload".to_string(),
                        },
                    });
                    continue;
                }
                op.remap(&batch_ids);

                let result = match op.payload {
                    OperationPayload::Create { mut item } => {
                        let server_id = self.mint_id();
                        if item.id.is_temp() {
                            batch_ids.insert(item.id.clone(), server_id.clone());
                        }
                        item.id = server_id.clone();
                        let stored = self.store_item(item);
                        AckResult::Confirmed {
                            server_id: Some(server_id),
                            item: Some(stored),
                        }
                    }
                    OperationPayload::Update { patch } => {
                        match self.apply_patch_locked(workspace, &op.item_id, &patch) {
                            Some(item) => AckResult::Confirmed {
                                server_id: None,
                                item: Some(item),
                            },
                            None => AckResult::Failed {
                                error: BackendErrorKind::NotFound,
                                message: format!("item not found: {}", op.item_id),
                            },
                        }
                    }
                    OperationPayload::Delete => {
                        match self.soft_delete_locked(workspace, &op.item_id) {
                            true => AckResult::Confirmed {
                                server_id: None,
                                item: None,
                            },
                            false => AckResult::Failed {
                                error: BackendErrorKind::NotFound,
                                message: format!("item not found: {}", op.item_id),
                            },
                        }
                    }
                    OperationPayload::UpdateOrder {
                        parent_id,
                        order_index,
                    } => {
                        let update = OrderUpdate {
                            item_id: op.item_id.clone(),
                            parent_id,
                            order_index,
                        };
                        match self.reorder_locked(workspace, update) {
                            Some(item) => AckResult::Confirmed {
                                server_id: None,
                                item: Some(item),
                            },
                            None => AckResult::Failed {
                                error: BackendErrorKind::NotFound,
                                message: format!("item not found: {}", op.item_id),
                            },
                        }
                    }
                };
                acks.push(OperationAck {
                    item_id: submitted_id,
                    result,
                });
            }

            let synced = acks
                .iter()
                .filter(|a| matches!(a.result, AckResult::Confirmed { .. }))
                .count();
            let failed = acks.len() - synced;
            Ok(BatchOutcome {
                success: failed == 0,
                synced,
                failed,
                acks,
            })
        }
    }

    impl MockBackend {
        fn apply_patch_locked(
            &self,
            workspace: &WorkspaceId,
            id: &ItemId,
            patch: &ItemPatch,
        ) -> Option<Item> {
            let mut items = self.items.lock().expect("mock lock");
            let list = items.get_mut(workspace)?;
            let item = list.iter_mut().find(|i| i.id == *id)?;
            patch.apply_to(item);
            item.updated_at = Utc::now();
            Some(item.clone())
        }

        fn soft_delete_locked(&self, workspace: &WorkspaceId, id: &ItemId) -> bool {
            let mut items = self.items.lock().expect("mock lock");
            let Some(list) = items.get_mut(workspace) else {
                return false;
            };
            match list.iter_mut().find(|i| i.id == *id) {
                Some(item) => {
                    item.soft_delete();
                    true
                }
                None => false,
            }
        }

        fn reorder_locked(&self, workspace: &WorkspaceId, update: OrderUpdate) -> Option<Item> {
            let mut items = self.items.lock().expect("mock lock");
            let list = items.get_mut(workspace)?;
            let item = list.iter_mut().find(|i| i.id == update.item_id)?;
            item.parent_id = update.parent_id;
            item.order_index = update.order_index;
            item.updated_at = Utc::now();
            Some(item.clone())
        }
    }
}
