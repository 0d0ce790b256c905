//! Bulk creation of AI-proposed items.
//!
//! An external generation collaborator proposes a list of items, possibly
//! referencing one another as parents through temporary ids. Creation is
//! planned as an explicit dependency order (parents before children) and
//! executed through the same optimistic-apply + queue path as any other
//! mutation; id translation happens in one shared table as confirmations
//! arrive, never piecemeal per item.

use crate::engine::SyncEngine;
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use canopy_types::{Item, ItemId, ItemKind, PendingOperation, WorkspaceId};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

/// Input to the generation collaborator.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GenerationRequest {
    pub topic: String,
    pub workspace_id: WorkspaceId,
    pub user_id: String,
    pub model: String,
}

/// One proposed item. `parent_ref` may name another proposal's temp id, an
/// existing item, or nothing (workspace root).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ItemProposal {
    pub temp_id: ItemId,
    pub kind: ItemKind,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default)]
    pub parent_ref: Option<ItemId>,
}

/// The external producer of creation proposals (the AI feature). Opaque;
/// only the shape of its output matters here.
#[async_trait]
pub trait ProposalSource: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> SyncResult<Vec<ItemProposal>>;
}

/// A dependency-ordered creation plan: every proposal appears after the
/// proposal it names as parent.
#[derive(Debug, Clone)]
pub struct CreationPlan {
    ordered: Vec<ItemProposal>,
}

impl CreationPlan {
    /// Orders `proposals` parent-before-child (stable within a rank).
    ///
    /// Parent references pointing outside the plan are left to the normal
    /// hierarchy rules (dangling refs render as roots until sync corrects
    /// them). A reference cycle inside the plan is an error, not a
    /// best-effort partial creation.
    pub fn build(proposals: Vec<ItemProposal>) -> SyncResult<Self> {
        for p in &proposals {
            if !p.temp_id.is_temp() {
                return Err(SyncError::Rejected(format!(
                    "proposal id is not temporary: {}",
                    p.temp_id
                )));
            }
        }

        let index: HashMap<&ItemId, usize> = proposals
            .iter()
            .enumerate()
            .map(|(i, p)| (&p.temp_id, i))
            .collect();

        let mut children: Vec<Vec<usize>> = vec![Vec::new(); proposals.len()];
        let mut in_degree: Vec<usize> = vec![0; proposals.len()];
        for (i, p) in proposals.iter().enumerate() {
            if let Some(parent) = p.parent_ref.as_ref().and_then(|r| index.get(r)) {
                if *parent != i {
                    children[*parent].push(i);
                    in_degree[i] += 1;
                }
            }
        }

        let mut queue: VecDeque<usize> = (0..proposals.len())
            .filter(|&i| in_degree[i] == 0)
            .collect();
        let mut order: Vec<usize> = Vec::with_capacity(proposals.len());
        while let Some(i) = queue.pop_front() {
            order.push(i);
            for &c in &children[i] {
                in_degree[c] -= 1;
                if in_degree[c] == 0 {
                    queue.push_back(c);
                }
            }
        }

        if order.len() < proposals.len() {
            return Err(SyncError::PlanCycle(proposals.len() - order.len()));
        }

        let mut slots: Vec<Option<ItemProposal>> = proposals.into_iter().map(Some).collect();
        let ordered = order
            .into_iter()
            .filter_map(|i| slots[i].take())
            .collect();
        Ok(Self { ordered })
    }

    /// The proposals in creation order.
    #[must_use]
    pub fn ordered(&self) -> &[ItemProposal] {
        &self.ordered
    }

    /// Materializes the plan: applies every item optimistically and
    /// enqueues its CREATE, in plan order, so the queue's FIFO guarantee
    /// delivers parents to the backend before their children.
    pub async fn execute(
        &self,
        engine: &SyncEngine,
        workspace: &WorkspaceId,
    ) -> SyncResult<Vec<Item>> {
        let store = engine.store();
        let ids = engine.id_map().await;

        // Next free order index per target parent.
        let mut next_order: HashMap<Option<ItemId>, i64> = HashMap::new();
        for item in store.workspace_items(workspace).await {
            let slot = next_order.entry(item.parent_id.clone()).or_insert(0);
            *slot = (*slot).max(item.order_index + 1);
        }

        let in_plan: HashSet<&ItemId> = self.ordered.iter().map(|p| &p.temp_id).collect();
        let mut created = Vec::with_capacity(self.ordered.len());

        for proposal in &self.ordered {
            // In-plan parents stay temporary (their CREATE precedes ours in
            // the queue); external references go through the shared table.
            let parent = proposal.parent_ref.as_ref().map(|r| {
                if in_plan.contains(r) {
                    r.clone()
                } else {
                    ids.resolve(r)
                }
            });

            let order_index = {
                let slot = next_order.entry(parent.clone()).or_insert(0);
                let v = *slot;
                *slot += 1;
                v
            };

            let mut item = match proposal.kind {
                ItemKind::Folder => Item::folder(workspace.clone(), proposal.title.clone()),
                ItemKind::Page => Item::page(workspace.clone(), proposal.title.clone()),
            };
            item.id = proposal.temp_id.clone();
            item.parent_id = parent;
            item.order_index = order_index;
            item.content = proposal.content.clone();

            store.apply_optimistic(item.clone()).await;
            engine
                .queue_operation(PendingOperation::create(item.clone()))
                .await?;
            created.push(item);
        }

        debug!(
            workspace = %workspace,
            items = created.len(),
            "bulk creation plan queued"
        );
        Ok(created)
    }
}
