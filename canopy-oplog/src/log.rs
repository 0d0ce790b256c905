//! The bounded, per-workspace FIFO of pending operations.

use crate::{OplogError, OplogResult, QueueStore};
use canopy_types::{IdMap, ItemId, PendingOperation, WorkspaceId};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, warn};

/// Default cap on queued operations per workspace.
pub const DEFAULT_CAPACITY: usize = 100;

/// The durable offline operation queue.
///
/// Operations are retained and replayed in enqueue order per workspace.
/// Every mutation is written through to the backing [`QueueStore`] so the
/// queue survives reloads. Only the sync engine removes entries, and only
/// after a confirmed backend acknowledgement.
pub struct OperationLog {
    store: Box<dyn QueueStore>,
    capacity: usize,
    queues: Mutex<HashMap<WorkspaceId, Vec<PendingOperation>>>,
}

impl OperationLog {
    /// Creates a log over `store` with the default capacity.
    #[must_use]
    pub fn new(store: Box<dyn QueueStore>) -> Self {
        Self::with_capacity(store, DEFAULT_CAPACITY)
    }

    /// Creates a log with an explicit per-workspace capacity.
    #[must_use]
    pub fn with_capacity(store: Box<dyn QueueStore>, capacity: usize) -> Self {
        Self {
            store,
            capacity: capacity.max(1),
            queues: Mutex::new(HashMap::new()),
        }
    }

    fn key_for(workspace: &WorkspaceId) -> String {
        format!("oplog/{workspace}")
    }

    /// Loads a workspace queue into the working set if not already present.
    fn load<'a>(
        &self,
        queues: &'a mut HashMap<WorkspaceId, Vec<PendingOperation>>,
        workspace: &WorkspaceId,
    ) -> OplogResult<&'a mut Vec<PendingOperation>> {
        if !queues.contains_key(workspace) {
            let ops = match self.store.get(&Self::key_for(workspace))? {
                Some(bytes) => serde_json::from_slice::<Vec<PendingOperation>>(&bytes).map_err(
                    |e| OplogError::Corrupt {
                        workspace: workspace.clone(),
                        detail: e.to_string(),
                    },
                )?,
                None => Vec::new(),
            };
            queues.insert(workspace.clone(), ops);
        }
        Ok(queues.get_mut(workspace).expect("loaded above"))
    }

    fn persist(&self, workspace: &WorkspaceId, ops: &[PendingOperation]) -> OplogResult<()> {
        if ops.is_empty() {
            self.store.delete(&Self::key_for(workspace))
        } else {
            let bytes = serde_json::to_vec(ops)?;
            self.store.put(&Self::key_for(workspace), &bytes)
        }
    }

    /// Appends an operation, evicting the oldest entries past the cap.
    ///
    /// Returns the evicted operations (usually none). Evicted mutations are
    /// lost to the backend, a recoverable inconsistency the caller should
    /// surface, not a silent success.
    pub fn enqueue(&self, op: PendingOperation) -> OplogResult<Vec<PendingOperation>> {
        let workspace = op.workspace_id.clone();
        let mut queues = self.queues.lock().expect("queue lock");
        let ops = self.load(&mut queues, &workspace)?;

        ops.push(op);
        let mut evicted = Vec::new();
        while ops.len() > self.capacity {
            evicted.push(ops.remove(0));
        }
        if !evicted.is_empty() {
            warn!(
                workspace = %workspace,
                dropped = evicted.len(),
                "operation queue over capacity, evicted oldest entries"
            );
        }
        let snapshot = ops.clone();
        drop(queues);
        self.persist(&workspace, &snapshot)?;
        Ok(evicted)
    }

    /// Returns the queued operations for a workspace in enqueue order.
    pub fn pending(&self, workspace: &WorkspaceId) -> OplogResult<Vec<PendingOperation>> {
        let mut queues = self.queues.lock().expect("queue lock");
        Ok(self.load(&mut queues, workspace)?.clone())
    }

    /// Number of queued operations for a workspace.
    pub fn len(&self, workspace: &WorkspaceId) -> OplogResult<usize> {
        let mut queues = self.queues.lock().expect("queue lock");
        Ok(self.load(&mut queues, workspace)?.len())
    }

    /// True when nothing is queued for a workspace.
    pub fn is_empty(&self, workspace: &WorkspaceId) -> OplogResult<bool> {
        Ok(self.len(workspace)? == 0)
    }

    /// Removes the first entry whose operation id matches. Returns whether
    /// an entry was removed.
    pub fn remove(&self, workspace: &WorkspaceId, op_id: &ItemId) -> OplogResult<bool> {
        let mut queues = self.queues.lock().expect("queue lock");
        let ops = self.load(&mut queues, workspace)?;
        let before = ops.len();
        if let Some(pos) = ops.iter().position(|op| op.item_id == *op_id) {
            ops.remove(pos);
        }
        let removed = ops.len() != before;
        let snapshot = ops.clone();
        drop(queues);
        if removed {
            self.persist(workspace, &snapshot)?;
        }
        Ok(removed)
    }

    /// Drops every queued operation for a workspace.
    pub fn clear(&self, workspace: &WorkspaceId) -> OplogResult<()> {
        let mut queues = self.queues.lock().expect("queue lock");
        queues.insert(workspace.clone(), Vec::new());
        drop(queues);
        debug!(workspace = %workspace, "cleared operation queue");
        self.persist(workspace, &[])
    }

    /// Rewrites queued operations through the id translation table after
    /// CREATE confirmations (temp targets and temp parent references).
    pub fn remap_ids(&self, workspace: &WorkspaceId, ids: &IdMap) -> OplogResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut queues = self.queues.lock().expect("queue lock");
        let ops = self.load(&mut queues, workspace)?;
        for op in ops.iter_mut() {
            op.remap(ids);
        }
        let snapshot = ops.clone();
        drop(queues);
        self.persist(workspace, &snapshot)
    }
}
