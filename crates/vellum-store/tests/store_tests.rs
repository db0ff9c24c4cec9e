//! Integration tests for snapshot versioning and diffing across many writes.

use vellum_store::prelude::*;

// -- test component types ---------------------------------------------------

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
struct Position {
    x: f64,
    y: f64,
}

impl Component for Position {
    const NAME: &'static str = "position";
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
struct Velocity {
    dx: f64,
    dy: f64,
}

impl Component for Velocity {
    const NAME: &'static str = "velocity";
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
struct Health(u32);

impl Component for Health {
    const NAME: &'static str = "health";
}

fn populated(count: usize) -> Store {
    let mut store = Store::new();
    for i in 0..count {
        let id = EntityId::from(format!("e{i:04}"));
        store = store
            .with(id.clone(), Position { x: i as f64, y: 0.0 })
            .with(id.clone(), Velocity { dx: 1.0, dy: 0.5 })
            .with(id, Health(100));
    }
    store
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn integration_step_commits_as_one_batch() {
    let before = populated(500);

    let moved: Vec<(EntityId, Position)> = before
        .get_all::<Position>()
        .iter()
        .map(|(id, value)| {
            let pos = value.downcast_ref::<Position>().unwrap();
            let vel = before.get::<Velocity>(id).unwrap();
            (
                id.clone(),
                Position {
                    x: pos.x + vel.dx,
                    y: pos.y + vel.dy,
                },
            )
        })
        .collect();
    let after = before.with_batch(moved);

    let d = diff::<Position>(&before, &after);
    assert_eq!(d.changed.len(), 500);
    assert!(d.added.is_empty() && d.removed.is_empty());

    // Velocity and Health were not touched.
    assert!(diff::<Velocity>(&before, &after).is_empty());
    assert!(Store::sub_map_ptr_eq(ComponentType::of::<Health>(), &before, &after));
}

#[test]
fn old_versions_survive_later_writes() {
    let v1 = populated(10);
    let v2 = v1.without(&EntityId::from("e0003"));
    let v3 = v2.with("e0003", Health(1));

    assert_eq!(v1.entity_components(&"e0003".into()).len(), 3);
    assert!(v2.entity_components(&"e0003".into()).is_empty());
    assert_eq!(v3.entity_components(&"e0003".into()).len(), 1);
    assert_eq!(v3.get::<Health>(&"e0003".into()), Some(&Health(1)));
}

#[test]
fn diff_all_reports_every_type_of_a_despawn() {
    let before = populated(3);
    let after = before.without(&EntityId::from("e0001"));
    let diffs = diff_all(&before, &after);

    assert_eq!(diffs.len(), 3);
    for d in &diffs {
        assert_eq!(d.removed.len(), 1, "{:?}", d.component_type);
        assert_eq!(d.removed[0].0, EntityId::from("e0001"));
        assert!(d.added.is_empty() && d.changed.is_empty());
    }
}

#[test]
fn identical_content_hashes_match() {
    let a = populated(50);
    let b = populated(50);
    assert!(!Store::ptr_eq(&a, &b));
    assert_eq!(a.content_hash().unwrap(), b.content_hash().unwrap());
}

#[test]
fn large_store_write_is_cheap_to_compare() {
    let before = populated(2_000);
    let after = before.with("e1000", Health(50));

    let d = diff::<Health>(&before, &after);
    assert_eq!(d.changed, vec![(EntityId::from("e1000"), Health(50))]);
    assert!(diff::<Position>(&before, &after).is_empty());
    assert!(diff::<Velocity>(&before, &after).is_empty());
}
