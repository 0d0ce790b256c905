//! The sync engine: drains the offline queue against the backend and
//! reconciles results into the item store.
//!
//! One engine serves every workspace of a session. Each workspace moves
//! through a small state machine:
//!
//! ```text
//! Idle ──trigger──▶ Syncing ──batch ok──▶ Idle
//!                     │  ▲ re-drain while triggers arrived mid-flight
//!                     │
//!                     ├──unreachable──▶ Backoff (re-armed by connectivity)
//!                     └──corrupt queue─▶ Poisoned (that workspace only)
//! ```
//!
//! At most one drain is in flight per workspace; a trigger landing during a
//! drain marks the workspace dirty and the drain re-runs once more with the
//! newest queue snapshot instead of racing a second submission.

use crate::backend::{AckResult, BackendErrorKind, ItemBackend};
use crate::error::{SyncError, SyncResult};
use canopy_oplog::{OperationLog, OplogError};
use canopy_store::ItemStore;
use canopy_types::{IdMap, Item, ItemId, ItemPatch, PendingOperation, WorkspaceId};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Configuration for the sync engine.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Maximum operations submitted per batch call.
    pub batch_limit: usize,
    /// Refetch server truth after a drain completes or drops occur.
    pub refetch_on_drain: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_limit: 100,
            refetch_on_drain: true,
        }
    }
}

/// Where a workspace sits in the sync lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPhase {
    /// Nothing in flight; waiting for a trigger.
    #[default]
    Idle,
    /// A drain is in flight.
    Syncing,
    /// The backend was unreachable; queued work is parked until the next
    /// connectivity signal or explicit trigger.
    Backoff,
    /// The persisted queue failed to decode. Terminal for this workspace.
    Poisoned,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Syncing => write!(f, "syncing"),
            Self::Backoff => write!(f, "backoff"),
            Self::Poisoned => write!(f, "poisoned"),
        }
    }
}

/// What a drain accomplished.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    /// Operations confirmed and removed from the queue.
    pub synced: usize,
    /// Operations that failed transiently and remain queued.
    pub failed: usize,
    /// Operations rejected by the backend, removed and rolled back.
    pub dropped: Vec<ItemId>,
    /// Operations held back because their target id is still unconfirmed.
    pub held_back: usize,
    /// True when the call coalesced into a drain already in flight.
    pub coalesced: bool,
}

#[derive(Default)]
struct WorkspaceState {
    phase: SyncPhase,
    dirty: bool,
}

/// The sync engine. Sole owner of the right to clear queue entries.
pub struct SyncEngine {
    store: Arc<ItemStore>,
    log: Arc<OperationLog>,
    backend: Arc<dyn ItemBackend>,
    ids: Arc<RwLock<IdMap>>,
    workspaces: Arc<RwLock<HashMap<WorkspaceId, WorkspaceState>>>,
    config: SyncConfig,
}

impl SyncEngine {
    /// Creates an engine with the default configuration.
    pub fn new(
        store: Arc<ItemStore>,
        log: Arc<OperationLog>,
        backend: Arc<dyn ItemBackend>,
    ) -> Self {
        Self::with_config(store, log, backend, SyncConfig::default())
    }

    /// Creates an engine with an explicit configuration.
    pub fn with_config(
        store: Arc<ItemStore>,
        log: Arc<OperationLog>,
        backend: Arc<dyn ItemBackend>,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            log,
            backend,
            ids: Arc::new(RwLock::new(IdMap::new())),
            workspaces: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    /// The item store this engine reconciles into.
    pub fn store(&self) -> &Arc<ItemStore> {
        &self.store
    }

    /// The operation log this engine drains.
    pub fn log(&self) -> &Arc<OperationLog> {
        &self.log
    }

    /// The backend collaborator.
    pub fn backend(&self) -> &Arc<dyn ItemBackend> {
        &self.backend
    }

    /// Snapshot of the temp-to-server id translation table.
    pub async fn id_map(&self) -> IdMap {
        self.ids.read().await.clone()
    }

    /// Current phase for a workspace.
    pub async fn phase(&self, workspace: &WorkspaceId) -> SyncPhase {
        self.workspaces
            .read()
            .await
            .get(workspace)
            .map_or(SyncPhase::Idle, |s| s.phase)
    }

    /// Appends an operation to the offline queue. Returns how many old
    /// entries the bounded queue evicted to make room (usually zero).
    ///
    /// Enqueueing never clears anything; only a confirmed acknowledgement
    /// does that, inside [`sync_workspace`](Self::sync_workspace).
    pub async fn queue_operation(&self, op: PendingOperation) -> SyncResult<usize> {
        let workspace = op.workspace_id.clone();
        match self.log.enqueue(op) {
            Ok(evicted) => Ok(evicted.len()),
            Err(e) => Err(self.classify_oplog(&workspace, e).await),
        }
    }

    /// Triggers a drain if the workspace has queued work. The "mount with a
    /// non-empty queue" entry point.
    pub async fn sync_if_pending(&self, workspace: &WorkspaceId) -> SyncResult<Option<SyncReport>> {
        match self.log.is_empty(workspace) {
            Ok(true) => Ok(None),
            Ok(false) => self.sync_workspace(workspace).await.map(Some),
            Err(e) => Err(self.classify_oplog(workspace, e).await),
        }
    }

    /// Connectivity-change signal. Going online re-arms every workspace
    /// parked in backoff and drains it; going offline is a no-op (drains
    /// already in flight fail over to backoff on their own).
    pub async fn network_changed(&self, online: bool) -> Vec<(WorkspaceId, SyncResult<SyncReport>)> {
        if !online {
            return Vec::new();
        }
        let parked: Vec<WorkspaceId> = self
            .workspaces
            .read()
            .await
            .iter()
            .filter(|(_, s)| s.phase == SyncPhase::Backoff)
            .map(|(ws, _)| ws.clone())
            .collect();
        let mut results = Vec::with_capacity(parked.len());
        for ws in parked {
            info!(workspace = %ws, "connectivity regained, re-arming sync");
            let outcome = self.sync_workspace(&ws).await;
            results.push((ws, outcome));
        }
        results
    }

    /// Drains the workspace's queue against the backend.
    ///
    /// Confirmed entries leave the queue; rejected entries are dropped,
    /// rolled back and reported; transient failures stay queued. A trigger
    /// arriving while a drain is in flight coalesces into one follow-up
    /// drain over the newest snapshot.
    pub async fn sync_workspace(&self, workspace: &WorkspaceId) -> SyncResult<SyncReport> {
        {
            let mut workspaces = self.workspaces.write().await;
            let state = workspaces.entry(workspace.clone()).or_default();
            match state.phase {
                SyncPhase::Poisoned => {
                    return Err(SyncError::QueuePoisoned(workspace.clone()));
                }
                SyncPhase::Syncing => {
                    debug!(workspace = %workspace, "drain in flight, coalescing trigger");
                    state.dirty = true;
                    return Ok(SyncReport {
                        coalesced: true,
                        ..SyncReport::default()
                    });
                }
                SyncPhase::Idle | SyncPhase::Backoff => state.phase = SyncPhase::Syncing,
            }
        }

        let mut report = SyncReport::default();
        loop {
            match self.drain_once(workspace, &mut report).await {
                Ok(more) => {
                    let mut workspaces = self.workspaces.write().await;
                    let state = workspaces.entry(workspace.clone()).or_default();
                    let rerun = more || state.dirty;
                    state.dirty = false;
                    if rerun {
                        continue;
                    }
                    state.phase = SyncPhase::Idle;
                    info!(
                        workspace = %workspace,
                        synced = report.synced,
                        failed = report.failed,
                        dropped = report.dropped.len(),
                        "drain complete"
                    );
                    return Ok(report);
                }
                Err(e) => {
                    let mut workspaces = self.workspaces.write().await;
                    let state = workspaces.entry(workspace.clone()).or_default();
                    state.dirty = false;
                    state.phase = match e {
                        SyncError::QueuePoisoned(_) => SyncPhase::Poisoned,
                        _ => SyncPhase::Backoff,
                    };
                    warn!(workspace = %workspace, phase = %state.phase, error = %e, "drain failed");
                    return Err(e);
                }
            }
        }
    }

    /// One pass over the queue. Returns true when another pass should run
    /// immediately (progress was made and work remains).
    async fn drain_once(&self, workspace: &WorkspaceId, report: &mut SyncReport) -> SyncResult<bool> {
        let pending = match self.log.pending(workspace) {
            Ok(ops) => ops,
            Err(e) => return Err(self.classify_oplog(workspace, e).await),
        };
        if pending.is_empty() {
            return Ok(false);
        }

        let ids = self.ids.read().await.clone();

        // Remap through the translation table. A non-CREATE op whose target
        // is still temporary and not created earlier in this very batch
        // cannot be addressed yet; it is held back, never sent raw.
        let mut submitted: Vec<PendingOperation> = Vec::new();
        let mut originals: Vec<ItemId> = Vec::new();
        let mut created_in_batch: HashSet<ItemId> = HashSet::new();
        for op in pending {
            let original_id = op.item_id.clone();
            let mut op = op;
            op.remap(&ids);
            if op.is_create() {
                created_in_batch.insert(op.item_id.clone());
            } else if op.item_id.is_temp() && !created_in_batch.contains(&op.item_id) {
                report.held_back += 1;
                continue;
            }
            originals.push(original_id);
            submitted.push(op);
            if submitted.len() >= self.config.batch_limit {
                break;
            }
        }
        if submitted.is_empty() {
            return Ok(false);
        }

        debug!(workspace = %workspace, operations = submitted.len(), "submitting batch");
        let outcome = self.backend.sync_batch(workspace, submitted.clone()).await?;

        let mut new_ids = IdMap::new();
        let mut confirmed_items: Vec<Item> = Vec::new();
        let mut progress = false;
        let mut refetch_needed = false;

        for (i, ack) in outcome.acks.iter().enumerate() {
            let Some(submitted_op) = submitted.get(i) else {
                warn!(workspace = %workspace, "backend returned more acks than operations");
                break;
            };
            if ack.item_id != submitted_op.item_id {
                warn!(
                    workspace = %workspace,
                    expected = %submitted_op.item_id,
                    got = %ack.item_id,
                    "ack order mismatch, matching by position"
                );
            }
            let original_id = &originals[i];

            match &ack.result {
                AckResult::Confirmed { server_id, item } => {
                    if let Some(server_id) = server_id {
                        if submitted_op.item_id.is_temp() {
                            new_ids.insert(submitted_op.item_id.clone(), server_id.clone());
                        }
                    }
                    if let Some(item) = item {
                        confirmed_items.push(item.clone());
                    }
                    if self.log.remove(workspace, original_id)? {
                        progress = true;
                    }
                    report.synced += 1;
                }
                AckResult::Failed { error, message } => match error {
                    BackendErrorKind::Validation | BackendErrorKind::NotFound => {
                        warn!(
                            workspace = %workspace,
                            operation = %original_id,
                            error = ?error,
                            message,
                            "operation rejected, dropping and rolling back"
                        );
                        self.log.remove(workspace, original_id)?;
                        if submitted_op.is_create() {
                            // Withdraw the optimistic insert entirely.
                            self.store.remove(original_id).await;
                        }
                        report.dropped.push(original_id.clone());
                        progress = true;
                        refetch_needed = true;
                    }
                    BackendErrorKind::Network | BackendErrorKind::Contention => {
                        debug!(
                            workspace = %workspace,
                            operation = %original_id,
                            "operation failed transiently, staying queued"
                        );
                        report.failed += 1;
                    }
                },
            }
        }

        if !new_ids.is_empty() {
            {
                let mut ids = self.ids.write().await;
                ids.extend(&new_ids);
            }
            self.store.translate_ids(workspace, &new_ids).await;
            if let Err(e) = self.log.remap_ids(workspace, &new_ids) {
                return Err(self.classify_oplog(workspace, e).await);
            }
        }

        // Write echoed server state back, field-scoped and stale-guarded.
        for item in confirmed_items {
            self.store
                .confirm_fields(&item.id, &ItemPatch::replacing(&item), item.updated_at)
                .await;
        }

        let queue_empty = self.log.is_empty(workspace)?;

        if self.config.refetch_on_drain && (queue_empty || refetch_needed) {
            let server_items = self.backend.fetch_items(workspace).await?;
            let ids = self.ids.read().await.clone();
            self.store.reconcile(workspace, server_items, &ids).await;
        }

        Ok(progress && !queue_empty)
    }

    async fn classify_oplog(&self, workspace: &WorkspaceId, e: OplogError) -> SyncError {
        if matches!(e, OplogError::Corrupt { .. }) {
            warn!(workspace = %workspace, error = %e, "queue corrupt, poisoning workspace");
            let mut workspaces = self.workspaces.write().await;
            workspaces.entry(workspace.clone()).or_default().phase = SyncPhase::Poisoned;
            SyncError::QueuePoisoned(workspace.clone())
        } else {
            SyncError::Oplog(e)
        }
    }
}
