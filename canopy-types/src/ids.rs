//! Identifier types for workspaces and items.
//!
//! Server ids are opaque strings assigned by the backend. Before an item is
//! confirmed, the client mints a temporary id carrying the reserved `temp-`
//! prefix; temporary ids are correlation keys only and must be translated
//! through an [`crate::IdMap`] before being used as real backend targets.

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Reserved prefix distinguishing client-minted temporary ids from server ids.
pub const TEMP_PREFIX: &str = "temp-";

/// Unique identifier for a workspace (the top-level item container).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkspaceId(String);

impl WorkspaceId {
    /// Mints a new workspace id (UUID v7, time-ordered).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for WorkspaceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for WorkspaceId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<&str> for WorkspaceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Unique identifier for an item: either a server-assigned id or a
/// client-minted temporary id awaiting confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Mints a new temporary id with the reserved prefix.
    #[must_use]
    pub fn temp() -> Self {
        Self(format!("{TEMP_PREFIX}{}", Uuid::now_v7()))
    }

    /// Wraps a server-assigned id.
    #[must_use]
    pub fn from_server(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns true for client-minted temporary ids.
    #[must_use]
    pub fn is_temp(&self) -> bool {
        self.0.starts_with(TEMP_PREFIX)
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ItemId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_ids_carry_prefix() {
        let id = ItemId::temp();
        assert!(id.is_temp());
        assert!(id.as_str().starts_with(TEMP_PREFIX));
    }

    #[test]
    fn server_ids_are_not_temp() {
        let id = ItemId::from_server("srv-42");
        assert!(!id.is_temp());
    }

    #[test]
    fn serde_is_transparent() {
        let id = ItemId::from_server("srv-1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"srv-1\"");
        let back: ItemId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
