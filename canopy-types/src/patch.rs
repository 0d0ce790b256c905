//! Partial item updates.
//!
//! An [`ItemPatch`] names only the fields a mutation touches. The same type
//! serves three roles: the payload of a queued UPDATE, the optimistic change
//! applied to the cache, and the reverse snapshot captured for rollback.
//!
//! Nullable fields (`parent_id`, `content`, ...) use a double `Option`:
//! the outer layer means "this patch touches the field", the inner layer is
//! the new value, which may itself be null (move to root, clear content).

use crate::{Item, ItemId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A partial update over an [`Item`]'s mutable fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_ref: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Option<ItemId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<Option<DateTime<Utc>>>,
}

impl ItemPatch {
    /// An empty patch touching nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a new title.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets new content (or clears it with `None`).
    #[must_use]
    pub fn content(mut self, content: Option<String>) -> Self {
        self.content = Some(content);
        self
    }

    /// Re-parents the item (`None` = workspace root).
    #[must_use]
    pub fn parent(mut self, parent_id: Option<ItemId>) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Sets the sibling order index.
    #[must_use]
    pub fn order(mut self, order_index: i64) -> Self {
        self.order_index = Some(order_index);
        self
    }

    /// Sets the active flag.
    #[must_use]
    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    /// True when the patch touches no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// A patch carrying every mutable field of `item`, for writing a
    /// server-confirmed state back wholesale.
    #[must_use]
    pub fn replacing(item: &Item) -> ItemPatch {
        ItemPatch {
            title: Some(item.title.clone()),
            content: Some(item.content.clone()),
            external_ref: Some(item.external_ref.clone()),
            parent_id: Some(item.parent_id.clone()),
            order_index: Some(item.order_index),
            active: Some(item.active),
            deleted_at: Some(item.deleted_at),
        }
    }

    /// Captures the current values of every field this patch touches,
    /// producing the reverse patch used for rollback.
    #[must_use]
    pub fn snapshot_of(&self, item: &Item) -> ItemPatch {
        ItemPatch {
            title: self.title.as_ref().map(|_| item.title.clone()),
            content: self.content.as_ref().map(|_| item.content.clone()),
            external_ref: self.external_ref.as_ref().map(|_| item.external_ref.clone()),
            parent_id: self.parent_id.as_ref().map(|_| item.parent_id.clone()),
            order_index: self.order_index.map(|_| item.order_index),
            active: self.active.map(|_| item.active),
            deleted_at: self.deleted_at.as_ref().map(|_| item.deleted_at),
        }
    }

    /// Writes the touched fields into `item`. Does not bump `updated_at`;
    /// the store owns timestamp discipline.
    pub fn apply_to(&self, item: &mut Item) {
        if let Some(title) = &self.title {
            item.title = title.clone();
        }
        if let Some(content) = &self.content {
            item.content = content.clone();
        }
        if let Some(external_ref) = &self.external_ref {
            item.external_ref = external_ref.clone();
        }
        if let Some(parent_id) = &self.parent_id {
            item.parent_id = parent_id.clone();
        }
        if let Some(order_index) = self.order_index {
            item.order_index = order_index;
        }
        if let Some(active) = self.active {
            item.active = active;
        }
        if let Some(deleted_at) = self.deleted_at {
            item.deleted_at = deleted_at;
        }
    }
}
