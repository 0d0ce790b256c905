//! Temp-to-server id translation.

use crate::ItemId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Translation table from temporary client ids to server-assigned ids.
///
/// Populated as CREATE confirmations arrive; consulted everywhere a
/// temporary id may still be referenced (cached items, queued operations,
/// parent references in bulk-creation plans).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdMap {
    entries: HashMap<ItemId, ItemId>,
}

impl IdMap {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `temp` was confirmed as `server`.
    ///
    /// Mapping a non-temporary key is a caller bug; it is ignored outside
    /// debug builds.
    pub fn insert(&mut self, temp: ItemId, server: ItemId) {
        debug_assert!(temp.is_temp(), "IdMap keys must be temporary ids");
        if temp.is_temp() {
            self.entries.insert(temp, server);
        }
    }

    /// Looks up the server id for a temporary id.
    #[must_use]
    pub fn get(&self, temp: &ItemId) -> Option<&ItemId> {
        self.entries.get(temp)
    }

    /// Translates `id` if a mapping exists, otherwise returns it unchanged.
    #[must_use]
    pub fn resolve(&self, id: &ItemId) -> ItemId {
        self.entries.get(id).cloned().unwrap_or_else(|| id.clone())
    }

    /// Merges another table into this one.
    pub fn extend(&mut self, other: &IdMap) {
        for (temp, server) in &other.entries {
            self.entries.insert(temp.clone(), server.clone());
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(temp, server)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&ItemId, &ItemId)> {
        self.entries.iter()
    }
}
