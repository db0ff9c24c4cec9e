//! Component typing and type-erased component values.
//!
//! Every component type implements [`Component`], which gives it a stable
//! [`Component::NAME`]. The store keys its per-type sub-maps by
//! [`ComponentType`], a compile-time key built from the Rust `TypeId`, and
//! holds the values themselves as [`ComponentValue`]s.

use std::any::{Any, TypeId};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::ser::{Error as _, SerializeMap};
use serde::{Serialize, Serializer};

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

/// An immutable, value-comparable datum attached to an entity.
///
/// Two values of the same component type are equal iff `PartialEq` says so.
/// `NAME` must be unique across the component types of one application; it is
/// what change logs print and what ignore lists match against.
pub trait Component: Clone + PartialEq + fmt::Debug + Serialize + Send + Sync + 'static {
    /// Stable, human-readable name of the component type.
    const NAME: &'static str;
}

// ---------------------------------------------------------------------------
// ComponentType
// ---------------------------------------------------------------------------

/// Key identifying a component type inside a store.
///
/// Ordered by name first so that iteration over types is reproducible across
/// builds.
#[derive(Clone, Copy)]
pub struct ComponentType {
    type_id: TypeId,
    name: &'static str,
}

impl ComponentType {
    /// The key for component type `T`.
    #[inline]
    pub fn of<T: Component>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: T::NAME,
        }
    }

    /// The component's registered name.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The Rust `TypeId` of the component.
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }
}

impl PartialEq for ComponentType {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ComponentType {}

impl Hash for ComponentType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl PartialOrd for ComponentType {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ComponentType {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(other.name)
            .then_with(|| self.type_id.cmp(&other.type_id))
    }
}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentType({})", self.name)
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Serializes as the component name.
impl Serialize for ComponentType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name)
    }
}

// ---------------------------------------------------------------------------
// Type erasure
// ---------------------------------------------------------------------------

/// Object-safe view of a [`Component`].
trait ErasedComponent: Send + Sync + 'static {
    fn component_type(&self) -> ComponentType;
    fn dyn_eq(&self, other: &dyn ErasedComponent) -> bool;
    fn to_json(&self) -> Result<serde_json::Value, serde_json::Error>;
    fn as_any(&self) -> &dyn Any;
    fn debug_fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

impl<T: Component> ErasedComponent for T {
    fn component_type(&self) -> ComponentType {
        ComponentType::of::<T>()
    }

    fn dyn_eq(&self, other: &dyn ErasedComponent) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }

    fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn debug_fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ---------------------------------------------------------------------------
// ComponentValue
// ---------------------------------------------------------------------------

/// A type-erased, reference-counted component value.
///
/// Cloning shares the underlying allocation. Equality is value equality of
/// the concrete component; values of different types are never equal.
#[derive(Clone)]
pub struct ComponentValue(Arc<dyn ErasedComponent>);

impl ComponentValue {
    /// Wrap a concrete component.
    pub fn new<T: Component>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// The type key of the wrapped component.
    #[inline]
    pub fn component_type(&self) -> ComponentType {
        self.0.component_type()
    }

    /// Borrow the concrete component if it is a `T`.
    pub fn downcast_ref<T: Component>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    /// Serialize the wrapped component to JSON.
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        self.0.to_json()
    }

    /// Whether both handles point at the same allocation.
    #[inline]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }
}

impl<T: Component> From<T> for ComponentValue {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl PartialEq for ComponentValue {
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other) || self.0.dyn_eq(&*other.0)
    }
}

impl fmt::Debug for ComponentValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.debug_fmt(f)
    }
}

impl Serialize for ComponentValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let value = self.to_json().map_err(S::Error::custom)?;
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("type", self.component_type().name())?;
        map.serialize_entry("value", &value)?;
        map.end()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
