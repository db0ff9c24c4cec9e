//! Vellum Store -- Immutable, versioned entity/component snapshots with a
//! structural diff engine.
//!
//! A [`Store`](store::Store) maps `(component type, entity id)` to a
//! component value. Every write produces a successor snapshot that shares all
//! untouched structure with its predecessor; a write that changes nothing
//! returns the very same snapshot. The [`diff`](mod@diff) module compares two snapshots
//! per component type and uses that sharing to skip untouched types in O(1).
//!
//! # Quick Start
//!
//! ```
//! use vellum_store::prelude::*;
//!
//! #[derive(Debug, Clone, PartialEq, serde::Serialize)]
//! struct Position { x: i32, y: i32 }
//! impl Component for Position { const NAME: &'static str = "position"; }
//!
//! let before = Store::new().with("p1", Position { x: 0, y: 0 });
//! let after = before.with("p1", Position { x: 5, y: 5 });
//!
//! let d = diff::<Position>(&before, &after);
//! assert_eq!(d.changed, vec![(EntityId::from("p1"), Position { x: 5, y: 5 })]);
//! assert!(d.added.is_empty() && d.removed.is_empty());
//! ```

#![deny(unsafe_code)]

pub mod component;
pub mod diff;
pub mod entity;
pub mod store;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by store operations.
///
/// Reads and writes never fail; absence is `None` and removing something
/// absent is a no-op. Only whole-store serialization can fail.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A component value could not be serialized.
    #[error("failed to serialize store contents: {details}")]
    Serialization {
        details: String,
    },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::component::{Component, ComponentType, ComponentValue};
    pub use crate::diff::{diff, diff_all, diff_type, diff_types, ComponentDiff, TypedDiff};
    pub use crate::entity::{EntityId, CLOCK_ENTITY, EVENTS_ENTITY};
    pub use crate::store::{ComponentMap, Store};
    pub use crate::StoreError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------
