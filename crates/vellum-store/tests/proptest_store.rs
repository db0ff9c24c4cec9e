//! Property tests for store writes and the diff engine.
//!
//! Random sequences of writes and removals are replayed against both a
//! [`Store`] chain and a plain `BTreeMap` model; the store must agree with the
//! model and every diff between consecutive versions must be complete and
//! disjoint.

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;
use vellum_store::prelude::*;

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
struct Pos {
    x: i32,
    y: i32,
}

impl Component for Pos {
    const NAME: &'static str = "pos";
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
struct Tag(u8);

impl Component for Tag {
    const NAME: &'static str = "tag";
}

/// Operations we can perform on the store.
#[derive(Debug, Clone)]
enum StoreOp {
    WritePos(u8, i32, i32),
    WriteTag(u8, u8),
    RemovePos(u8),
    RemoveEntity(u8),
}

fn entity(i: u8) -> EntityId {
    EntityId::from(format!("e{}", i % 16))
}

fn store_op_strategy() -> impl Strategy<Value = StoreOp> {
    prop_oneof![
        (any::<u8>(), -3i32..3, -3i32..3).prop_map(|(e, x, y)| StoreOp::WritePos(e, x, y)),
        (any::<u8>(), 0u8..4).prop_map(|(e, t)| StoreOp::WriteTag(e, t)),
        any::<u8>().prop_map(StoreOp::RemovePos),
        any::<u8>().prop_map(StoreOp::RemoveEntity),
    ]
}

fn apply(store: &Store, op: &StoreOp) -> Store {
    match op {
        StoreOp::WritePos(e, x, y) => store.with(entity(*e), Pos { x: *x, y: *y }),
        StoreOp::WriteTag(e, t) => store.with(entity(*e), Tag(*t)),
        StoreOp::RemovePos(e) => store.without_component::<Pos>(&entity(*e)),
        StoreOp::RemoveEntity(e) => store.without(&entity(*e)),
    }
}

fn ids(entries: &[(EntityId, ComponentValue)]) -> BTreeSet<EntityId> {
    entries.iter().map(|(id, _)| id.clone()).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2_000))]

    #[test]
    fn store_agrees_with_model(ops in prop::collection::vec(store_op_strategy(), 1..60)) {
        let mut store = Store::new();
        let mut model: BTreeMap<EntityId, Pos> = BTreeMap::new();

        for op in &ops {
            store = apply(&store, op);
            match op {
                StoreOp::WritePos(e, x, y) => {
                    model.insert(entity(*e), Pos { x: *x, y: *y });
                }
                StoreOp::RemovePos(e) | StoreOp::RemoveEntity(e) => {
                    model.remove(&entity(*e));
                }
                StoreOp::WriteTag(..) => {}
            }
        }

        let all = store.get_all::<Pos>();
        prop_assert_eq!(all.len(), model.len());
        for (id, pos) in &model {
            prop_assert_eq!(store.get::<Pos>(id), Some(pos));
        }
    }

    #[test]
    fn repeated_write_is_reference_identical(ops in prop::collection::vec(store_op_strategy(), 0..30),
                                             e in any::<u8>(), x in -3i32..3) {
        let mut store = Store::new();
        for op in &ops {
            store = apply(&store, op);
        }
        let once = store.with(entity(e), Pos { x, y: 0 });
        let twice = once.with(entity(e), Pos { x, y: 0 });
        prop_assert!(Store::ptr_eq(&once, &twice));
    }

    #[test]
    fn writes_share_untouched_types(ops in prop::collection::vec(store_op_strategy(), 0..30),
                                    e in any::<u8>(), x in -3i32..3) {
        let mut store = Store::new();
        for op in &ops {
            store = apply(&store, op);
        }
        let next = store.with(entity(e), Pos { x, y: 1 });
        prop_assert!(Store::sub_map_ptr_eq(ComponentType::of::<Tag>(), &store, &next));
        prop_assert!(store.get_all::<Tag>().ptr_eq(&next.get_all::<Tag>()));
    }

    #[test]
    fn diff_is_complete_and_disjoint(ops in prop::collection::vec(store_op_strategy(), 1..60)) {
        let mut before = Store::new();
        let ty = ComponentType::of::<Pos>();

        for op in &ops {
            let after = apply(&before, op);
            let d = diff_type(ty, &before, &after);

            let added = ids(&d.added);
            let removed = ids(&d.removed);
            let changed = ids(&d.changed);

            prop_assert!(added.is_disjoint(&removed));
            prop_assert!(added.is_disjoint(&changed));
            prop_assert!(removed.is_disjoint(&changed));

            let old_keys: BTreeSet<EntityId> = before.get_all::<Pos>().keys().cloned().collect();
            let new_keys: BTreeSet<EntityId> = after.get_all::<Pos>().keys().cloned().collect();

            // Added ∪ Changed ∪ unchanged == keys(after).
            let unchanged: BTreeSet<EntityId> = old_keys
                .intersection(&new_keys)
                .filter(|id| !changed.contains(*id))
                .cloned()
                .collect();
            let covered: BTreeSet<EntityId> =
                added.union(&changed).cloned().collect::<BTreeSet<_>>().union(&unchanged).cloned().collect();
            prop_assert_eq!(covered, new_keys.clone());

            // Removed == keys(before) − keys(after).
            let expected_removed: BTreeSet<EntityId> = old_keys.difference(&new_keys).cloned().collect();
            prop_assert_eq!(removed, expected_removed);

            // Self-compare is always empty.
            prop_assert!(diff_type(ty, &after, &after).is_empty());

            before = after;
        }
    }
}
