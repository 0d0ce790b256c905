//! Flat item collections to render-ready trees.
//!
//! Construction is pure, deterministic, and total: every input item lands in
//! the forest exactly once, whatever the shape of its `parent_id` links. An
//! item pointing at a parent the client has not seen yet (a child synced
//! before its parent, a parent evicted from the cache) is promoted to a root
//! rather than dropped, keeping the tree renderable under transient
//! inconsistency. Parent cycles are broken the same way.
//!
//! Traversal is iterative throughout; tree depth never touches the call
//! stack.

use canopy_types::{Item, ItemId};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};

/// An [`Item`] with its resolved, ordered children.
///
/// Forests are rebuilt from flat snapshots on every read and never mutated
/// in place.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HierarchicalItem {
    pub item: Item,
    pub children: Vec<HierarchicalItem>,
}

/// Builds a forest from the active items in `items`.
///
/// Soft-deleted items are excluded; use [`build_forest_all`] to include
/// them (e.g. for a trash view). Siblings are ordered by `order_index`,
/// ties broken by input position.
#[must_use]
pub fn build_forest(items: &[Item]) -> Vec<HierarchicalItem> {
    forest_from(items.iter().filter(|i| i.active).collect())
}

/// Builds a forest over all items, soft-deleted included.
#[must_use]
pub fn build_forest_all(items: &[Item]) -> Vec<HierarchicalItem> {
    forest_from(items.iter().collect())
}

fn forest_from(flat: Vec<&Item>) -> Vec<HierarchicalItem> {
    let n = flat.len();
    if n == 0 {
        return Vec::new();
    }

    // First occurrence wins when ids collide.
    let mut index: HashMap<&ItemId, usize> = HashMap::with_capacity(n);
    for (i, item) in flat.iter().enumerate() {
        index.entry(&item.id).or_insert(i);
    }

    // Raw parent edges. A missing parent or a self-reference makes a root.
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut natural_roots: Vec<usize> = Vec::new();
    for (i, item) in flat.iter().enumerate() {
        match item.parent_id.as_ref().and_then(|p| index.get(p)).copied() {
            Some(p) if p != i => children[p].push(i),
            _ => natural_roots.push(i),
        }
    }

    // Stable sort keeps input position as the tie-break for equal indexes.
    for list in &mut children {
        list.sort_by_key(|&i| flat[i].order_index);
    }
    natural_roots.sort_by_key(|&i| flat[i].order_index);

    // Breadth-first walk from the roots records the edges actually taken.
    // Items never reached are cycle participants; each becomes a root the
    // moment it is encountered, which breaks its cycle exactly once.
    fn walk(
        start: usize,
        children: &[Vec<usize>],
        visited: &mut [bool],
        order: &mut Vec<usize>,
        tree_children: &mut [Vec<usize>],
    ) {
        let mut queue: VecDeque<usize> = VecDeque::from([start]);
        while let Some(i) = queue.pop_front() {
            order.push(i);
            for &c in &children[i] {
                if !visited[c] {
                    visited[c] = true;
                    tree_children[i].push(c);
                    queue.push_back(c);
                }
            }
        }
    }

    let mut visited = vec![false; n];
    let mut roots: Vec<usize> = Vec::new();
    let mut order: Vec<usize> = Vec::with_capacity(n);
    let mut tree_children: Vec<Vec<usize>> = vec![Vec::new(); n];

    for &r in &natural_roots {
        visited[r] = true;
        roots.push(r);
        walk(r, &children, &mut visited, &mut order, &mut tree_children);
    }
    for i in 0..n {
        if !visited[i] {
            visited[i] = true;
            roots.push(i);
            walk(i, &children, &mut visited, &mut order, &mut tree_children);
        }
    }

    // Children appear after their parent in `order`, so a reverse pass has
    // every child built before its parent consumes it.
    let mut nodes: Vec<Option<HierarchicalItem>> = flat.iter().map(|_| None).collect();
    for &i in order.iter().rev() {
        let kids: Vec<HierarchicalItem> = tree_children[i]
            .iter()
            .filter_map(|&c| nodes[c].take())
            .collect();
        nodes[i] = Some(HierarchicalItem {
            item: flat[i].clone(),
            children: kids,
        });
    }

    roots.iter().filter_map(|&r| nodes[r].take()).collect()
}

/// Depth-first search for `id` over a forest. Returns the first match.
#[must_use]
pub fn find_item<'a>(forest: &'a [HierarchicalItem], id: &ItemId) -> Option<&'a HierarchicalItem> {
    let mut stack: Vec<&HierarchicalItem> = forest.iter().rev().collect();
    while let Some(node) = stack.pop() {
        if node.item.id == *id {
            return Some(node);
        }
        for child in node.children.iter().rev() {
            stack.push(child);
        }
    }
    None
}
