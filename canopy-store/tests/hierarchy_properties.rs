//! Property-based tests for hierarchy construction.
//!
//! The builder must be total: whatever shape the parent links take
//! (dangling references, self-loops, long cycles), every active input item
//! lands in the forest exactly once, and construction is deterministic.

use canopy_store::{build_forest, HierarchicalItem};
use canopy_types::{Item, ItemId, WorkspaceId};
use proptest::prelude::*;
use std::collections::HashSet;

/// Up to 40 items whose parent links point anywhere inside (or just
/// outside) the collection.
fn arbitrary_items() -> impl Strategy<Value = Vec<Item>> {
    (1usize..40).prop_flat_map(|n| {
        let links = prop::collection::vec(prop::option::of(0usize..n + 2), n);
        let orders = prop::collection::vec(-10i64..10, n);
        (links, orders).prop_map(move |(links, orders)| {
            let ws = WorkspaceId::from("prop-ws");
            links
                .into_iter()
                .zip(orders)
                .enumerate()
                .map(|(i, (link, order))| {
                    let mut item = Item::page(ws.clone(), format!("item {i}")).with_order(order);
                    item.id = ItemId::from_server(format!("id-{i}"));
                    // Links past the end are dangling references.
                    item.parent_id = link.map(|p| ItemId::from_server(format!("id-{p}")));
                    item
                })
                .collect()
        })
    })
}

fn collect_ids(forest: &[HierarchicalItem]) -> Vec<ItemId> {
    let mut ids = Vec::new();
    let mut stack: Vec<&HierarchicalItem> = forest.iter().rev().collect();
    while let Some(node) = stack.pop() {
        ids.push(node.item.id.clone());
        for child in node.children.iter().rev() {
            stack.push(child);
        }
    }
    ids
}

proptest! {
    /// Every input item appears in the forest exactly once.
    #[test]
    fn forest_covers_every_item_exactly_once(items in arbitrary_items()) {
        let forest = build_forest(&items);
        let ids = collect_ids(&forest);
        prop_assert_eq!(ids.len(), items.len());

        let unique: HashSet<&ItemId> = ids.iter().collect();
        prop_assert_eq!(unique.len(), items.len());

        let input: HashSet<&ItemId> = items.iter().map(|i| &i.id).collect();
        for id in &ids {
            prop_assert!(input.contains(id));
        }
    }

    /// Construction is deterministic: same input, same forest.
    #[test]
    fn construction_is_deterministic(items in arbitrary_items()) {
        let first = build_forest(&items);
        let second = build_forest(&items);
        prop_assert_eq!(first, second);
    }

    /// Every child edge in the output matches the item's parent link.
    #[test]
    fn child_edges_match_parent_links(items in arbitrary_items()) {
        let forest = build_forest(&items);
        let mut stack: Vec<&HierarchicalItem> = forest.iter().collect();
        while let Some(node) = stack.pop() {
            for child in &node.children {
                prop_assert_eq!(child.item.parent_id.as_ref(), Some(&node.item.id));
            }
            stack.extend(node.children.iter());
        }
    }
}
