use canopy_store::{build_forest, build_forest_all, find_item, HierarchicalItem};
use canopy_types::{Item, ItemId, WorkspaceId};

fn make_item(id: &str, parent: Option<&str>, order: i64, ws: &WorkspaceId) -> Item {
    let mut item = Item::page(ws.clone(), id).with_order(order);
    item.id = ItemId::from_server(id);
    item.parent_id = parent.map(ItemId::from_server);
    item
}

fn collect_ids(forest: &[HierarchicalItem]) -> Vec<String> {
    let mut ids = Vec::new();
    let mut stack: Vec<&HierarchicalItem> = forest.iter().rev().collect();
    while let Some(node) = stack.pop() {
        ids.push(node.item.id.as_str().to_string());
        for child in node.children.iter().rev() {
            stack.push(child);
        }
    }
    ids
}

// ── Basic construction ───────────────────────────────────────────

#[test]
fn parent_and_child() {
    let ws = WorkspaceId::new();
    let items = vec![
        make_item("a", None, 0, &ws),
        make_item("b", Some("a"), 0, &ws),
    ];
    let forest = build_forest(&items);
    assert_eq!(forest.len(), 1);
    assert_eq!(forest[0].item.id.as_str(), "a");
    assert_eq!(forest[0].children.len(), 1);
    assert_eq!(forest[0].children[0].item.id.as_str(), "b");
}

#[test]
fn empty_input_builds_empty_forest() {
    assert!(build_forest(&[]).is_empty());
}

#[test]
fn input_order_does_not_matter() {
    let ws = WorkspaceId::new();
    // Child arrives before its parent (synced out of order).
    let items = vec![
        make_item("b", Some("a"), 0, &ws),
        make_item("a", None, 0, &ws),
    ];
    let forest = build_forest(&items);
    assert_eq!(forest.len(), 1);
    assert_eq!(forest[0].item.id.as_str(), "a");
    assert_eq!(forest[0].children[0].item.id.as_str(), "b");
}

// ── Sibling ordering ─────────────────────────────────────────────

#[test]
fn siblings_sort_by_order_index() {
    let ws = WorkspaceId::new();
    let items = vec![
        make_item("c", Some("root"), 2, &ws),
        make_item("a", Some("root"), 0, &ws),
        make_item("root", None, 0, &ws),
        make_item("b", Some("root"), 1, &ws),
    ];
    let forest = build_forest(&items);
    let names: Vec<&str> = forest[0]
        .children
        .iter()
        .map(|c| c.item.id.as_str())
        .collect();
    assert_eq!(names, ["a", "b", "c"]);
}

#[test]
fn equal_order_indexes_keep_input_position() {
    let ws = WorkspaceId::new();
    let items = vec![
        make_item("root", None, 0, &ws),
        make_item("first", Some("root"), 5, &ws),
        make_item("second", Some("root"), 5, &ws),
        make_item("third", Some("root"), 5, &ws),
    ];
    let forest = build_forest(&items);
    let names: Vec<&str> = forest[0]
        .children
        .iter()
        .map(|c| c.item.id.as_str())
        .collect();
    assert_eq!(names, ["first", "second", "third"]);
}

// ── Totality under bad links ─────────────────────────────────────

#[test]
fn dangling_parent_becomes_root() {
    let ws = WorkspaceId::new();
    let items = vec![
        make_item("orphan", Some("missing"), 0, &ws),
        make_item("a", None, 1, &ws),
    ];
    let forest = build_forest(&items);
    assert_eq!(forest.len(), 2);
    assert!(forest.iter().any(|n| n.item.id.as_str() == "orphan"));
}

#[test]
fn self_parent_becomes_root() {
    let ws = WorkspaceId::new();
    let items = vec![make_item("loop", Some("loop"), 0, &ws)];
    let forest = build_forest(&items);
    assert_eq!(forest.len(), 1);
    assert!(forest[0].children.is_empty());
}

#[test]
fn parent_cycle_is_broken_not_dropped() {
    let ws = WorkspaceId::new();
    let items = vec![
        make_item("a", Some("b"), 0, &ws),
        make_item("b", Some("a"), 0, &ws),
        make_item("c", None, 0, &ws),
    ];
    let forest = build_forest(&items);
    let mut ids = collect_ids(&forest);
    ids.sort();
    assert_eq!(ids, ["a", "b", "c"]);
}

// ── Soft deletion ────────────────────────────────────────────────

#[test]
fn soft_deleted_items_are_excluded_by_default() {
    let ws = WorkspaceId::new();
    let mut trashed = make_item("gone", None, 0, &ws);
    trashed.soft_delete();
    let items = vec![trashed, make_item("kept", None, 1, &ws)];

    let forest = build_forest(&items);
    assert_eq!(collect_ids(&forest), ["kept"]);

    let all = build_forest_all(&items);
    let mut ids = collect_ids(&all);
    ids.sort();
    assert_eq!(ids, ["gone", "kept"]);
}

#[test]
fn children_of_deleted_parent_surface_as_roots() {
    let ws = WorkspaceId::new();
    let mut folder = make_item("folder", None, 0, &ws);
    folder.soft_delete();
    let items = vec![folder, make_item("page", Some("folder"), 0, &ws)];

    let forest = build_forest(&items);
    assert_eq!(collect_ids(&forest), ["page"]);
}

// ── Depth and search ─────────────────────────────────────────────

#[test]
fn deep_chains_do_not_recurse() {
    let ws = WorkspaceId::new();
    let mut items = vec![make_item("n0", None, 0, &ws)];
    for i in 1..2000 {
        items.push(make_item(
            &format!("n{i}"),
            Some(&format!("n{}", i - 1)),
            0,
            &ws,
        ));
    }
    let forest = build_forest(&items);
    assert_eq!(forest.len(), 1);
    assert_eq!(collect_ids(&forest).len(), 2000);

    let deepest = ItemId::from_server("n1999");
    assert!(find_item(&forest, &deepest).is_some());
}

#[test]
fn find_item_returns_first_match_or_none() {
    let ws = WorkspaceId::new();
    let items = vec![
        make_item("root", None, 0, &ws),
        make_item("child", Some("root"), 0, &ws),
    ];
    let forest = build_forest(&items);

    let hit = find_item(&forest, &ItemId::from_server("child")).unwrap();
    assert_eq!(hit.item.id.as_str(), "child");
    assert!(find_item(&forest, &ItemId::from_server("absent")).is_none());
}
