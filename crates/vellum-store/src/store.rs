//! Immutable, versioned component snapshots.
//!
//! A [`Store`] maps `(component type, entity id)` to a component value. It is
//! never mutated in place: every write returns a successor store that shares
//! all untouched structure with its predecessor.
//!
//! # Sharing rules
//!
//! - The root maps [`ComponentType`] to a per-type [`ComponentMap`]. Both are
//!   persistent ordered maps, so a write copies only the path to the changed
//!   entry.
//! - A write to type `T` leaves every other type's sub-map pointer-identical
//!   to the predecessor's. The diff engine relies on this for its fast path.
//! - A write that would not change anything (same value already bound, or
//!   removing something absent) returns a clone of the *same* store, so
//!   [`Store::ptr_eq`] holds between input and output.
//!
//! # Example
//!
//! ```
//! use vellum_store::prelude::*;
//!
//! #[derive(Debug, Clone, PartialEq, serde::Serialize)]
//! struct Position { x: i32, y: i32 }
//! impl Component for Position { const NAME: &'static str = "position"; }
//!
//! let empty = Store::new();
//! let s1 = empty.with("p1", Position { x: 0, y: 0 });
//! let s2 = s1.with("p1", Position { x: 0, y: 0 });
//! assert!(Store::ptr_eq(&s1, &s2));
//! assert_eq!(s2.get::<Position>(&"p1".into()), Some(&Position { x: 0, y: 0 }));
//! ```

use std::fmt;
use std::sync::{Arc, OnceLock};

use im::OrdMap;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use tracing::trace;

use crate::component::{Component, ComponentType, ComponentValue};
use crate::entity::EntityId;
use crate::StoreError;

/// All values of one component type, keyed by entity id in ascending order.
pub type ComponentMap = OrdMap<EntityId, ComponentValue>;

type TypeMap = OrdMap<ComponentType, ComponentMap>;

/// The map handed out for types a store does not hold. Every caller gets a
/// clone of the same root, so absent types compare `ptr_eq` across versions.
fn empty_component_map() -> ComponentMap {
    static EMPTY: OnceLock<ComponentMap> = OnceLock::new();
    EMPTY.get_or_init(ComponentMap::new).clone()
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// An immutable snapshot of every component of every entity.
///
/// Cloning is O(1) and yields a handle to the same snapshot. Equality is
/// reference equality of the snapshot root, never a deep comparison.
#[derive(Clone)]
pub struct Store {
    root: Arc<TypeMap>,
}

impl Store {
    /// The empty snapshot.
    pub fn new() -> Self {
        Self {
            root: Arc::new(TypeMap::new()),
        }
    }

    fn from_types(types: TypeMap) -> Self {
        Self {
            root: Arc::new(types),
        }
    }

    /// Whether two handles refer to the same snapshot.
    #[inline]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.root, &b.root)
    }

    /// Whether `a` and `b` share the identical sub-map for `ty`.
    ///
    /// Two stores that both lack `ty` also count as sharing it.
    pub fn sub_map_ptr_eq(ty: ComponentType, a: &Self, b: &Self) -> bool {
        if Self::ptr_eq(a, b) {
            return true;
        }
        match (a.root.get(&ty), b.root.get(&ty)) {
            (Some(x), Some(y)) => x.ptr_eq(y),
            (None, None) => true,
            _ => false,
        }
    }

    // -- reads --------------------------------------------------------------

    /// The `T` bound to `entity`, if any.
    pub fn get<T: Component>(&self, entity: &EntityId) -> Option<&T> {
        self.get_value(ComponentType::of::<T>(), entity)?
            .downcast_ref::<T>()
    }

    /// The erased value of type `ty` bound to `entity`, if any.
    pub fn get_value(&self, ty: ComponentType, entity: &EntityId) -> Option<&ComponentValue> {
        self.root.get(&ty)?.get(entity)
    }

    /// Whether `entity` holds a `T`.
    pub fn contains<T: Component>(&self, entity: &EntityId) -> bool {
        self.get_value(ComponentType::of::<T>(), entity).is_some()
    }

    /// Every `T` in the store, keyed by entity id.
    ///
    /// The returned map shares structure with the store; cloning it is O(1).
    pub fn get_all<T: Component>(&self) -> ComponentMap {
        self.get_all_of(ComponentType::of::<T>())
    }

    /// Every value of type `ty`, keyed by entity id.
    ///
    /// A type the store does not hold yields one shared empty map, so the
    /// result is `ptr_eq` between any two stores that both lack `ty`.
    pub fn get_all_of(&self, ty: ComponentType) -> ComponentMap {
        self.root.get(&ty).cloned().unwrap_or_else(empty_component_map)
    }

    /// Borrow the sub-map for `ty` without cloning it.
    pub fn sub_map(&self, ty: ComponentType) -> Option<&ComponentMap> {
        self.root.get(&ty)
    }

    /// Number of entities holding a component of type `ty`.
    pub fn len_of(&self, ty: ComponentType) -> usize {
        self.root.get(&ty).map_or(0, |m| m.len())
    }

    /// Whether the store holds no components at all.
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Every component type with at least one value, in ascending order.
    pub fn component_types(&self) -> Vec<ComponentType> {
        self.root.keys().copied().collect()
    }

    /// Every entity id holding at least one component, ascending.
    pub fn entity_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self
            .root
            .values()
            .flat_map(|m| m.keys().cloned())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Every component bound to `entity`, ordered by component type.
    pub fn entity_components(&self, entity: &EntityId) -> Vec<ComponentValue> {
        self.root
            .values()
            .filter_map(|m| m.get(entity).cloned())
            .collect()
    }

    // -- writes -------------------------------------------------------------

    /// Bind `value` to `entity`, replacing any `T` it already holds.
    ///
    /// Returns the same store if an equal value is already bound.
    pub fn with<T: Component>(&self, entity: impl Into<EntityId>, value: T) -> Store {
        self.with_value(entity, ComponentValue::new(value))
    }

    /// Erased form of [`with`](Self::with).
    pub fn with_value(&self, entity: impl Into<EntityId>, value: ComponentValue) -> Store {
        let entity = entity.into();
        let ty = value.component_type();
        if self.get_value(ty, &entity) == Some(&value) {
            trace!(entity = %entity, component = ty.name(), "write is a no-op");
            return self.clone();
        }

        let mut types = (*self.root).clone();
        let mut sub = types.get(&ty).cloned().unwrap_or_default();
        sub.insert(entity, value);
        types.insert(ty, sub);
        Self::from_types(types)
    }

    /// Bind many `T`s in one copy-on-write step.
    ///
    /// Entries whose value is already bound are skipped. If nothing changes
    /// the same store is returned. Later entries for the same id win.
    pub fn with_batch<T, I>(&self, entries: I) -> Store
    where
        T: Component,
        I: IntoIterator<Item = (EntityId, T)>,
    {
        let ty = ComponentType::of::<T>();
        let mut sub = self.get_all_of(ty);
        let mut changed = false;
        for (entity, value) in entries {
            let value = ComponentValue::new(value);
            if sub.get(&entity) != Some(&value) {
                sub.insert(entity, value);
                changed = true;
            }
        }
        if !changed {
            return self.clone();
        }

        let mut types = (*self.root).clone();
        types.insert(ty, sub);
        Self::from_types(types)
    }

    /// Remove every component bound to `entity`.
    pub fn without(&self, entity: &EntityId) -> Store {
        if !self.root.values().any(|m| m.contains_key(entity)) {
            return self.clone();
        }

        let mut types = (*self.root).clone();
        for ty in self.root.keys() {
            Self::remove_from(&mut types, *ty, entity);
        }
        Self::from_types(types)
    }

    /// Remove the `T` bound to `entity`, if any.
    pub fn without_component<T: Component>(&self, entity: &EntityId) -> Store {
        self.without_type(ComponentType::of::<T>(), entity)
    }

    /// Remove the component of type `ty` bound to `entity`, if any.
    pub fn without_type(&self, ty: ComponentType, entity: &EntityId) -> Store {
        if self.get_value(ty, entity).is_none() {
            return self.clone();
        }

        let mut types = (*self.root).clone();
        Self::remove_from(&mut types, ty, entity);
        Self::from_types(types)
    }

    /// Drop `entity` from the sub-map for `ty`, pruning the sub-map once empty.
    fn remove_from(types: &mut TypeMap, ty: ComponentType, entity: &EntityId) {
        let Some(sub) = types.get(&ty) else {
            return;
        };
        if !sub.contains_key(entity) {
            return;
        }
        let mut sub = sub.clone();
        sub.remove(entity);
        if sub.is_empty() {
            types.remove(&ty);
        } else {
            types.insert(ty, sub);
        }
    }

    // -- hashing ------------------------------------------------------------

    /// BLAKE3 hex digest (64 lowercase hex chars) of the store's contents.
    ///
    /// The digest covers component names, entity ids and JSON-serialized
    /// values in ascending order, so two stores with equal contents hash
    /// equal regardless of how they were built.
    pub fn content_hash(&self) -> Result<String, StoreError> {
        let bytes = serde_json::to_vec(self).map_err(|e| StoreError::Serialization {
            details: e.to_string(),
        })?;
        Ok(blake3::hash(&bytes).to_hex().to_string())
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Store {
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other)
    }
}

impl Eq for Store {}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.root.iter().map(|(ty, m)| (ty.name(), m.len())))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

struct SerializeComponentMap<'a>(&'a ComponentMap);

impl Serialize for SerializeComponentMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (entity, value) in self.0.iter() {
            let json = value.to_json().map_err(serde::ser::Error::custom)?;
            map.serialize_entry(entity.as_str(), &json)?;
        }
        map.end()
    }
}

impl Serialize for Store {
    /// Serializes as `{component_name: {entity_id: value}}`.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.root.len()))?;
        for (ty, sub) in self.root.iter() {
            map.serialize_entry(ty.name(), &SerializeComponentMap(sub))?;
        }
        map.end()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
