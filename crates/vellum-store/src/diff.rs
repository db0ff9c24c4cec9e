//! Structural diff between two snapshots.
//!
//! [`diff_type`] classifies every entity holding a component of one type in
//! either snapshot as added, removed or changed. It is pure: neither snapshot
//! is touched, and the only allocations are the output vectors.
//!
//! Two fast paths make the common case O(1): comparing a store with itself,
//! and comparing two stores that share the sub-map for the requested type
//! (which is what copy-on-write leaves behind for every type a tick did not
//! write).

use std::cmp::Ordering;

use crate::component::{Component, ComponentType, ComponentValue};
use crate::entity::EntityId;
use crate::store::{ComponentMap, Store};

// ---------------------------------------------------------------------------
// ComponentDiff
// ---------------------------------------------------------------------------

/// Added/removed/changed entities for one component type.
///
/// Every list is sorted ascending by entity id, and the three id sets are
/// pairwise disjoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentDiff {
    /// The component type that was compared.
    pub component_type: ComponentType,
    /// Ids present only in `after`, with their new values.
    pub added: Vec<(EntityId, ComponentValue)>,
    /// Ids present only in `before`, with their old values.
    pub removed: Vec<(EntityId, ComponentValue)>,
    /// Ids present in both whose values differ, with their new values.
    pub changed: Vec<(EntityId, ComponentValue)>,
}

impl ComponentDiff {
    fn empty(component_type: ComponentType) -> Self {
        Self {
            component_type,
            added: Vec::new(),
            removed: Vec::new(),
            changed: Vec::new(),
        }
    }

    /// Whether nothing differs.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    /// Total number of differing entities.
    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.changed.len()
    }

    /// Changed entries paired with their value in `before`.
    ///
    /// `before` must be the store this diff was computed from. Entries whose
    /// old value cannot be found are skipped.
    pub fn changed_with_old<'a>(
        &'a self,
        before: &'a Store,
    ) -> impl Iterator<Item = (&'a EntityId, &'a ComponentValue, &'a ComponentValue)> + 'a {
        self.changed.iter().filter_map(move |(id, new)| {
            before
                .get_value(self.component_type, id)
                .map(|old| (id, old, new))
        })
    }
}

// ---------------------------------------------------------------------------
// TypedDiff
// ---------------------------------------------------------------------------

/// A [`ComponentDiff`] with values downcast to their concrete type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedDiff<T> {
    pub added: Vec<(EntityId, T)>,
    pub removed: Vec<(EntityId, T)>,
    pub changed: Vec<(EntityId, T)>,
}

impl<T> TypedDiff<T> {
    /// Whether nothing differs.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

fn downcast_all<T: Component>(entries: &[(EntityId, ComponentValue)]) -> Vec<(EntityId, T)> {
    entries
        .iter()
        .filter_map(|(id, v)| v.downcast_ref::<T>().map(|t| (id.clone(), t.clone())))
        .collect()
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

/// Compare `before` and `after` for component type `T`.
pub fn diff<T: Component>(before: &Store, after: &Store) -> TypedDiff<T> {
    let erased = diff_type(ComponentType::of::<T>(), before, after);
    TypedDiff {
        added: downcast_all(&erased.added),
        removed: downcast_all(&erased.removed),
        changed: downcast_all(&erased.changed),
    }
}

/// Compare `before` and `after` for component type `ty`.
pub fn diff_type(ty: ComponentType, before: &Store, after: &Store) -> ComponentDiff {
    if Store::sub_map_ptr_eq(ty, before, after) {
        return ComponentDiff::empty(ty);
    }

    match (before.sub_map(ty), after.sub_map(ty)) {
        (None, None) => ComponentDiff::empty(ty),
        (None, Some(new)) => ComponentDiff {
            added: collect(new),
            ..ComponentDiff::empty(ty)
        },
        (Some(old), None) => ComponentDiff {
            removed: collect(old),
            ..ComponentDiff::empty(ty)
        },
        (Some(old), Some(new)) => merge_walk(ty, old, new),
    }
}

/// Compare several types; one result per requested type, in request order.
pub fn diff_types(types: &[ComponentType], before: &Store, after: &Store) -> Vec<ComponentDiff> {
    types
        .iter()
        .map(|ty| diff_type(*ty, before, after))
        .collect()
}

/// Compare every type known to either store, in ascending type order.
pub fn diff_all(before: &Store, after: &Store) -> Vec<ComponentDiff> {
    if Store::ptr_eq(before, after) {
        return Vec::new();
    }
    let mut types = before.component_types();
    types.extend(after.component_types());
    types.sort();
    types.dedup();
    diff_types(&types, before, after)
}

fn collect(map: &ComponentMap) -> Vec<(EntityId, ComponentValue)> {
    map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}

/// Single pass over both key sequences, which are already sorted.
fn merge_walk(ty: ComponentType, old: &ComponentMap, new: &ComponentMap) -> ComponentDiff {
    let mut out = ComponentDiff::empty(ty);
    let mut old_iter = old.iter().peekable();
    let mut new_iter = new.iter().peekable();

    loop {
        let step = match (old_iter.peek(), new_iter.peek()) {
            (None, None) => break,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some((ok, _)), Some((nk, _))) => ok.cmp(nk),
        };
        match step {
            Ordering::Less => {
                if let Some((k, v)) = old_iter.next() {
                    out.removed.push((k.clone(), v.clone()));
                }
            }
            Ordering::Greater => {
                if let Some((k, v)) = new_iter.next() {
                    out.added.push((k.clone(), v.clone()));
                }
            }
            Ordering::Equal => {
                if let (Some((_, ov)), Some((k, nv))) = (old_iter.next(), new_iter.next()) {
                    if ov != nv {
                        out.changed.push((k.clone(), nv.clone()));
                    }
                }
            }
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, serde::Serialize)]
    struct Position {
        x: i32,
        y: i32,
    }

    impl Component for Position {
        const NAME: &'static str = "position";
    }

    #[derive(Debug, Clone, PartialEq, serde::Serialize)]
    struct Speed(i32);

    impl Component for Speed {
        const NAME: &'static str = "speed";
    }

    fn id(s: &str) -> EntityId {
        EntityId::from(s)
    }

    #[test]
    fn self_compare_is_empty() {
        let s = Store::new().with("a", Speed(1)).with("b", Speed(2));
        assert!(diff_type(ComponentType::of::<Speed>(), &s, &s).is_empty());
        assert!(diff_all(&s, &s).is_empty());
    }

    #[test]
    fn changed_position_scenario() {
        let before = Store::new().with("p1", Position { x: 0, y: 0 });
        let after = before.with("p1", Position { x: 5, y: 5 });
        let d = diff::<Position>(&before, &after);
        assert_eq!(d.changed, vec![(id("p1"), Position { x: 5, y: 5 })]);
        assert!(d.added.is_empty());
        assert!(d.removed.is_empty());
    }

    #[test]
    fn classifies_added_removed_changed() {
        let before = Store::new()
            .with("a", Speed(1))
            .with("b", Speed(2))
            .with("c", Speed(3));
        let after = before
            .without(&id("a"))
            .with("b", Speed(20))
            .with("d", Speed(4));
        let d = diff::<Speed>(&before, &after);
        assert_eq!(d.removed, vec![(id("a"), Speed(1))]);
        assert_eq!(d.changed, vec![(id("b"), Speed(20))]);
        assert_eq!(d.added, vec![(id("d"), Speed(4))]);
    }

    #[test]
    fn equal_value_in_separate_allocation_is_not_changed() {
        let before = Store::new().with("a", Speed(1)).with("b", Speed(2));
        // Built independently, so no sub-map is shared.
        let after = Store::new().with("a", Speed(1)).with("b", Speed(3));
        let d = diff::<Speed>(&before, &after);
        assert_eq!(d.changed, vec![(id("b"), Speed(3))]);
        assert!(d.added.is_empty() && d.removed.is_empty());
    }

    #[test]
    fn untouched_type_takes_fast_path() {
        let before = Store::new().with("a", Speed(1)).with("a", Position { x: 0, y: 0 });
        let after = before.with("a", Position { x: 1, y: 1 });
        assert!(Store::sub_map_ptr_eq(ComponentType::of::<Speed>(), &before, &after));
        assert!(diff::<Speed>(&before, &after).is_empty());
        assert_eq!(diff::<Position>(&before, &after).changed.len(), 1);
    }

    #[test]
    fn type_appearing_or_vanishing() {
        let before = Store::new();
        let after = before.with("e1", Speed(1)).with("e2", Speed(2));
        let d = diff_type(ComponentType::of::<Speed>(), &before, &after);
        assert_eq!(d.added.len(), 2);
        let back = diff_type(ComponentType::of::<Speed>(), &after, &before);
        assert_eq!(back.removed.len(), 2);
        assert_eq!(back.removed[0].0, id("e1"));
    }

    #[test]
    fn diff_all_covers_union_of_types() {
        let before = Store::new().with("a", Speed(1));
        let after = Store::new().with("a", Position { x: 0, y: 0 });
        let diffs = diff_all(&before, &after);
        assert_eq!(diffs.len(), 2);
        assert_eq!(diffs[0].component_type, ComponentType::of::<Position>());
        assert_eq!(diffs[0].added.len(), 1);
        assert_eq!(diffs[1].component_type, ComponentType::of::<Speed>());
        assert_eq!(diffs[1].removed.len(), 1);
    }

    #[test]
    fn diff_types_preserves_request_order() {
        let before = Store::new();
        let after = before.with("a", Speed(1));
        let types = [ComponentType::of::<Speed>(), ComponentType::of::<Position>()];
        let diffs = diff_types(&types, &before, &after);
        assert_eq!(diffs[0].component_type, types[0]);
        assert_eq!(diffs[1].component_type, types[1]);
        assert!(diffs[1].is_empty());
    }

    #[test]
    fn changed_with_old_pairs_values() {
        let before = Store::new().with("a", Speed(1));
        let after = before.with("a", Speed(2));
        let d = diff_type(ComponentType::of::<Speed>(), &before, &after);
        let pairs: Vec<_> = d.changed_with_old(&before).collect();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].1.downcast_ref::<Speed>(), Some(&Speed(1)));
        assert_eq!(pairs[0].2.downcast_ref::<Speed>(), Some(&Speed(2)));
    }
}
