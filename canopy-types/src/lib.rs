//! Core type definitions for Canopy.
//!
//! This crate defines the fundamental types shared by the sync core:
//! - Workspace and item identifiers (temporary client ids vs. server ids)
//! - The `Item` hierarchy node model
//! - Pending operations queued for replay against the backend
//! - The temp-to-server id translation table
//!
//! Rendering, transport, and session concerns live outside this workspace;
//! nothing here knows how items are displayed or shipped over the wire.

mod ids;
mod item;
mod operation;
mod patch;
mod translate;

pub use ids::{ItemId, WorkspaceId, TEMP_PREFIX};
pub use item::{Item, ItemKind};
pub use operation::{OperationPayload, PendingOperation};
pub use patch::ItemPatch;
pub use translate::IdMap;
