//! Entity identifiers.
//!
//! An [`EntityId`] is an opaque, caller-minted key. The store never allocates
//! ids and keeps no record of which ids are "alive": an entity exists exactly
//! as long as at least one component is bound to its id.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Well-known ids
// ---------------------------------------------------------------------------

/// Id of the pseudo-entity that owns the event queue.
pub const EVENTS_ENTITY: &str = "Events";

/// Id of the pseudo-entity that owns the simulation clock.
pub const CLOCK_ENTITY: &str = "Clock";

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// An opaque entity key backed by a shared string.
///
/// Cloning is a reference-count bump. Ordering is lexicographic on the
/// underlying string and is the deterministic id order used by diffs, change
/// logs and the expiration scheduler.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(Arc<str>);

impl EntityId {
    /// Create an id from anything string-like.
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// The pseudo-entity that owns the event queue.
    pub fn events() -> Self {
        Self::new(EVENTS_ENTITY)
    }

    /// The pseudo-entity that owns the simulation clock.
    pub fn clock() -> Self {
        Self::new(CLOCK_ENTITY)
    }

    /// The id as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({:?})", &*self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

impl From<&String> for EntityId {
    fn from(id: &String) -> Self {
        Self::new(id)
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        Self(Arc::from(id.to_string()))
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for EntityId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from(raw))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
