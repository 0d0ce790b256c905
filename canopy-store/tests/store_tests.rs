use canopy_store::ItemStore;
use canopy_types::{IdMap, Item, ItemId, ItemPatch, WorkspaceId};
use chrono::{Duration, Utc};

fn make_item(id: &str, ws: &WorkspaceId) -> Item {
    let mut item = Item::page(ws.clone(), id);
    item.id = ItemId::from_server(id);
    item
}

// ── Optimistic writes ────────────────────────────────────────────

#[tokio::test]
async fn optimistic_insert_is_immediately_visible() {
    let store = ItemStore::new();
    let ws = WorkspaceId::new();
    store.apply_optimistic(make_item("a", &ws)).await;

    let items = store.workspace_items(&ws).await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id.as_str(), "a");
    assert!(store.get(&ItemId::from_server("a")).await.is_some());
}

#[tokio::test]
async fn optimistic_apply_bumps_updated_at() {
    let store = ItemStore::new();
    let ws = WorkspaceId::new();
    let mut item = make_item("a", &ws);
    item.updated_at = Utc::now() - Duration::hours(1);
    let stale = item.updated_at;

    store.apply_optimistic(item).await;
    let cached = store.get(&ItemId::from_server("a")).await.unwrap();
    assert!(cached.updated_at > stale);
}

#[tokio::test]
async fn apply_patch_returns_reverse_snapshot() {
    let store = ItemStore::new();
    let ws = WorkspaceId::new();
    store.apply_optimistic(make_item("a", &ws)).await;
    let id = ItemId::from_server("a");

    let patch = ItemPatch::new().title("Renamed").order(9);
    let reverse = store.apply_patch(&id, &patch).await.unwrap();

    let cached = store.get(&id).await.unwrap();
    assert_eq!(cached.title, "Renamed");
    assert_eq!(cached.order_index, 9);

    store.rollback(&id, &reverse).await;
    let restored = store.get(&id).await.unwrap();
    assert_eq!(restored.title, "a");
    assert_eq!(restored.order_index, 0);
}

#[tokio::test]
async fn patching_missing_item_errors() {
    let store = ItemStore::new();
    let result = store
        .apply_patch(&ItemId::from_server("ghost"), &ItemPatch::new().order(1))
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn rollback_of_missing_item_is_a_noop() {
    let store = ItemStore::new();
    // Item deleted server-side in the interim; nothing to restore.
    store
        .rollback(&ItemId::from_server("ghost"), &ItemPatch::new().order(1))
        .await;
}

// ── Confirmations ────────────────────────────────────────────────

#[tokio::test]
async fn confirm_fields_applies_server_state() {
    let store = ItemStore::new();
    let ws = WorkspaceId::new();
    store.apply_optimistic(make_item("a", &ws)).await;
    let id = ItemId::from_server("a");

    let server_time = Utc::now() + Duration::seconds(5);
    let applied = store
        .confirm_fields(&id, &ItemPatch::new().order(3), server_time)
        .await;
    assert!(applied);

    let cached = store.get(&id).await.unwrap();
    assert_eq!(cached.order_index, 3);
    assert_eq!(cached.updated_at, server_time);
}

#[tokio::test]
async fn stale_confirmation_is_ignored() {
    let store = ItemStore::new();
    let ws = WorkspaceId::new();
    store.apply_optimistic(make_item("a", &ws)).await;
    let id = ItemId::from_server("a");

    // A confirmation from before the optimistic write must not clobber it.
    let stale_time = Utc::now() - Duration::minutes(1);
    let applied = store
        .confirm_fields(&id, &ItemPatch::new().order(99), stale_time)
        .await;
    assert!(!applied);
    assert_eq!(store.get(&id).await.unwrap().order_index, 0);
}

#[tokio::test]
async fn confirmation_for_uncached_item_is_ignored() {
    let store = ItemStore::new();
    let applied = store
        .confirm_fields(
            &ItemId::from_server("ghost"),
            &ItemPatch::new().order(1),
            Utc::now(),
        )
        .await;
    assert!(!applied);
}

// ── Reconciliation ───────────────────────────────────────────────

#[tokio::test]
async fn reconcile_replaces_with_server_truth() {
    let store = ItemStore::new();
    let ws = WorkspaceId::new();
    store.apply_optimistic(make_item("a", &ws)).await;
    store.apply_optimistic(make_item("b", &ws)).await;

    // Server no longer knows "b" and has a renamed "a".
    let mut server_a = make_item("a", &ws);
    server_a.title = "server title".into();
    store.reconcile(&ws, vec![server_a], &IdMap::new()).await;

    let items = store.workspace_items(&ws).await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].title, "server title");
    assert!(store.get(&ItemId::from_server("b")).await.is_none());
}

#[tokio::test]
async fn reconcile_is_idempotent() {
    let store = ItemStore::new();
    let ws = WorkspaceId::new();
    let server_items = vec![make_item("a", &ws), make_item("b", &ws)];
    let ids = IdMap::new();

    store.reconcile(&ws, server_items.clone(), &ids).await;
    let once = store.workspace_items(&ws).await;

    store.reconcile(&ws, server_items, &ids).await;
    let twice = store.workspace_items(&ws).await;

    assert_eq!(once, twice);
}

#[tokio::test]
async fn reconcile_translates_temp_ids_without_duplicating() {
    let store = ItemStore::new();
    let ws = WorkspaceId::new();

    let draft = Item::page(ws.clone(), "Draft");
    let temp_id = draft.id.clone();
    store.apply_optimistic(draft).await;

    let mut ids = IdMap::new();
    ids.insert(temp_id.clone(), ItemId::from_server("srv-1"));

    let mut server_item = make_item("srv-1", &ws);
    server_item.title = "Draft".into();
    store.reconcile(&ws, vec![server_item], &ids).await;

    let items = store.workspace_items(&ws).await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id.as_str(), "srv-1");
    assert!(store.get(&temp_id).await.is_none());
}

#[tokio::test]
async fn reconcile_keeps_unconfirmed_temp_items() {
    let store = ItemStore::new();
    let ws = WorkspaceId::new();

    let draft = Item::page(ws.clone(), "Unconfirmed");
    let temp_id = draft.id.clone();
    store.apply_optimistic(draft).await;

    store.reconcile(&ws, vec![make_item("a", &ws)], &IdMap::new()).await;

    let items = store.workspace_items(&ws).await;
    assert_eq!(items.len(), 2);
    assert!(store.get(&temp_id).await.is_some());
}

#[tokio::test]
async fn translate_ids_rewrites_keys_and_parent_refs() {
    let store = ItemStore::new();
    let ws = WorkspaceId::new();

    let folder = Item::folder(ws.clone(), "Folder");
    let temp_id = folder.id.clone();
    let child = Item::page(ws.clone(), "Child").with_parent(temp_id.clone());
    let child_id = child.id.clone();
    store.apply_optimistic(folder).await;
    store.apply_optimistic(child).await;

    let mut ids = IdMap::new();
    ids.insert(temp_id.clone(), ItemId::from_server("srv-1"));
    store.translate_ids(&ws, &ids).await;

    assert!(store.get(&temp_id).await.is_none());
    assert!(store.get(&ItemId::from_server("srv-1")).await.is_some());
    let child = store.get(&child_id).await.unwrap();
    assert_eq!(child.parent_id.as_ref().unwrap().as_str(), "srv-1");
}

// ── Removal and isolation ────────────────────────────────────────

#[tokio::test]
async fn remove_drops_item_and_index_entry() {
    let store = ItemStore::new();
    let ws = WorkspaceId::new();
    store.apply_optimistic(make_item("a", &ws)).await;

    let removed = store.remove(&ItemId::from_server("a")).await;
    assert!(removed.is_some());
    assert!(store.workspace_items(&ws).await.is_empty());
    assert_eq!(store.len(&ws).await, 0);
}

#[tokio::test]
async fn workspaces_are_isolated() {
    let store = ItemStore::new();
    let ws1 = WorkspaceId::new();
    let ws2 = WorkspaceId::new();
    store.apply_optimistic(make_item("a", &ws1)).await;
    store.apply_optimistic(make_item("b", &ws2)).await;

    assert_eq!(store.workspace_items(&ws1).await.len(), 1);
    assert_eq!(store.workspace_items(&ws2).await.len(), 1);

    store.reconcile(&ws1, vec![], &IdMap::new()).await;
    assert!(store.workspace_items(&ws1).await.is_empty());
    assert_eq!(store.workspace_items(&ws2).await.len(), 1);
}
