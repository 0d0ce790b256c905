//! The item model: folders and pages arranged in a per-workspace hierarchy.

use crate::{ItemId, WorkspaceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of node an item is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    /// A container that may hold children.
    Folder,
    /// A leaf content node.
    Page,
}

/// A single node in a workspace hierarchy.
///
/// `parent_id = None` means the item sits at the workspace root. A dangling
/// `parent_id` (referencing an item the client has not seen yet) is not an
/// error; hierarchy construction treats such items as roots until sync
/// corrects them.
///
/// Soft deletion flips `active` off and stamps `deleted_at`; the item stays
/// addressable for restore but is excluded from normal hierarchy views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub workspace_id: WorkspaceId,
    pub kind: ItemKind,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_ref: Option<String>,
    #[serde(default)]
    pub parent_id: Option<ItemId>,
    pub order_index: i64,
    pub active: bool,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    fn new(workspace_id: WorkspaceId, kind: ItemKind, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ItemId::temp(),
            workspace_id,
            kind,
            title: title.into(),
            content: None,
            external_ref: None,
            parent_id: None,
            order_index: 0,
            active: true,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates an unconfirmed folder at the workspace root.
    #[must_use]
    pub fn folder(workspace_id: WorkspaceId, title: impl Into<String>) -> Self {
        Self::new(workspace_id, ItemKind::Folder, title)
    }

    /// Creates an unconfirmed page at the workspace root.
    #[must_use]
    pub fn page(workspace_id: WorkspaceId, title: impl Into<String>) -> Self {
        Self::new(workspace_id, ItemKind::Page, title)
    }

    /// Sets the parent.
    #[must_use]
    pub fn with_parent(mut self, parent_id: ItemId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Sets the sibling order index.
    #[must_use]
    pub fn with_order(mut self, order_index: i64) -> Self {
        self.order_index = order_index;
        self
    }

    /// Sets the content body.
    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Bumps `updated_at` to now.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Soft-deletes the item: keeps it addressable, hides it from views.
    pub fn soft_delete(&mut self) {
        self.active = false;
        self.deleted_at = Some(Utc::now());
        self.touch();
    }

    /// Reverses a soft delete.
    pub fn restore(&mut self) {
        self.active = true;
        self.deleted_at = None;
        self.touch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_items_have_temp_ids() {
        let item = Item::folder(WorkspaceId::new(), "Inbox");
        assert!(item.id.is_temp());
        assert!(item.active);
        assert!(item.parent_id.is_none());
    }

    #[test]
    fn soft_delete_and_restore() {
        let mut item = Item::page(WorkspaceId::new(), "Notes");
        item.soft_delete();
        assert!(!item.active);
        assert!(item.deleted_at.is_some());

        item.restore();
        assert!(item.active);
        assert!(item.deleted_at.is_none());
    }

    #[test]
    fn kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ItemKind::Folder).unwrap(), "\"folder\"");
        assert_eq!(serde_json::to_string(&ItemKind::Page).unwrap(), "\"page\"");
    }
}
