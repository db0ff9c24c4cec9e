//! Change sets between snapshots, rendered for observability.
//!
//! [`compute_changes`] runs the diff engine over every component type known
//! to either snapshot and flattens the result into [`ComponentChange`]
//! entries, ordered by component name and then entity id so output is
//! reproducible. [`ChangeJournal`] accumulates entries across ticks and
//! offers the same query API the engine's tooling uses.
//!
//! # Example
//!
//! ```
//! use vellum_journal::journal::{compute_changes, render_change, ChangeKind};
//! use vellum_store::prelude::*;
//!
//! #[derive(Debug, Clone, PartialEq, serde::Serialize)]
//! struct Health(u32);
//! impl Component for Health { const NAME: &'static str = "health"; }
//!
//! let before = Store::new().with("p1", Health(100));
//! let after = before.with("p1", Health(75));
//!
//! let changes = compute_changes(&before, &after, &[]);
//! assert_eq!(changes.len(), 1);
//! assert_eq!(changes[0].kind, ChangeKind::Changed);
//! assert_eq!(render_change(&changes[0]), "~ health[p1] 100 -> 75");
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::warn;
use vellum_store::component::ComponentValue;
use vellum_store::diff::diff_all;
use vellum_store::entity::EntityId;
use vellum_store::store::Store;

// ---------------------------------------------------------------------------
// ComponentChange
// ---------------------------------------------------------------------------

/// How a component changed between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Added,
    Removed,
    Changed,
}

/// A single component difference between two snapshots.
///
/// # Value semantics
///
/// - **Added**: `old_value` is `None`, `new_value` is `Some(...)`.
/// - **Changed**: both are `Some(...)`.
/// - **Removed**: `old_value` is `Some(...)`, `new_value` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentChange {
    /// The entity whose component differs.
    pub entity_id: EntityId,
    /// The component's [`NAME`](vellum_store::component::Component::NAME).
    pub component_type_name: String,
    /// Classification of the difference.
    pub kind: ChangeKind,
    /// The value in the earlier snapshot.
    pub old_value: Option<serde_json::Value>,
    /// The value in the later snapshot.
    pub new_value: Option<serde_json::Value>,
}

/// JSON for a component, falling back to its `Debug` form.
fn value_json(value: &ComponentValue) -> serde_json::Value {
    match value.to_json() {
        Ok(json) => json,
        Err(e) => {
            warn!(
                component = value.component_type().name(),
                error = %e,
                "component failed to serialize -- rendering Debug form instead"
            );
            serde_json::Value::String(format!("{value:?}"))
        }
    }
}

/// Every difference between `previous` and `next`, skipping `ignore`d names.
///
/// Entries are grouped by component name (ascending) and ordered by entity id
/// within each component.
pub fn compute_changes(previous: &Store, next: &Store, ignore: &[String]) -> Vec<ComponentChange> {
    let ignore: HashSet<&str> = ignore.iter().map(|s| s.as_str()).collect();
    let mut changes = Vec::new();

    for d in diff_all(previous, next) {
        let name = d.component_type.name();
        if ignore.contains(name) {
            continue;
        }

        let mut per_type: Vec<ComponentChange> = Vec::with_capacity(d.len());
        for (id, value) in &d.added {
            per_type.push(ComponentChange {
                entity_id: id.clone(),
                component_type_name: name.to_owned(),
                kind: ChangeKind::Added,
                old_value: None,
                new_value: Some(value_json(value)),
            });
        }
        for (id, value) in &d.removed {
            per_type.push(ComponentChange {
                entity_id: id.clone(),
                component_type_name: name.to_owned(),
                kind: ChangeKind::Removed,
                old_value: Some(value_json(value)),
                new_value: None,
            });
        }
        for (id, old, new) in d.changed_with_old(previous) {
            per_type.push(ComponentChange {
                entity_id: id.clone(),
                component_type_name: name.to_owned(),
                kind: ChangeKind::Changed,
                old_value: Some(value_json(old)),
                new_value: Some(value_json(new)),
            });
        }

        // The three lists are each sorted and disjoint; a stable sort merges them.
        per_type.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        changes.extend(per_type);
    }
    changes
}

/// Render one change as a single log line.
///
/// `+ name[id] = value`, `- name[id] = value`, `~ name[id] old -> new`.
pub fn render_change(change: &ComponentChange) -> String {
    let show = |v: &Option<serde_json::Value>| {
        v.as_ref()
            .map_or_else(|| "null".to_owned(), |v| v.to_string())
    };
    let name = &change.component_type_name;
    let id = &change.entity_id;
    match change.kind {
        ChangeKind::Added => format!("+ {name}[{id}] = {}", show(&change.new_value)),
        ChangeKind::Removed => format!("- {name}[{id}] = {}", show(&change.old_value)),
        ChangeKind::Changed => format!(
            "~ {name}[{id}] {} -> {}",
            show(&change.old_value),
            show(&change.new_value)
        ),
    }
}

// ---------------------------------------------------------------------------
// ChangeJournal
// ---------------------------------------------------------------------------

/// History of snapshot differences across many logged pairs.
///
/// Entries keep the order they were computed in: pair by pair, and within a
/// pair by component name then entity id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeJournal {
    changes: Vec<ComponentChange>,
}

impl ChangeJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one entry, e.g. a hand-built change from a test.
    pub fn record_change(&mut self, change: ComponentChange) {
        self.changes.push(change);
    }

    /// Append the output of one [`compute_changes`] call.
    pub fn extend(&mut self, changes: impl IntoIterator<Item = ComponentChange>) {
        self.changes.extend(changes);
    }

    pub fn clear(&mut self) {
        self.changes.clear();
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Every entry, oldest first.
    pub fn all_changes(&self) -> &[ComponentChange] {
        &self.changes
    }

    /// The lifecycle of one entity: every component it gained, lost or
    /// had replaced.
    pub fn changes_for_entity<'a>(
        &'a self,
        entity: &'a EntityId,
    ) -> impl Iterator<Item = &'a ComponentChange> {
        self.changes.iter().filter(move |c| &c.entity_id == entity)
    }

    /// Entries whose component has [`NAME`](vellum_store::component::Component::NAME)
    /// `name`.
    pub fn changes_for_component<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a ComponentChange> {
        self.changes
            .iter()
            .filter(move |c| c.component_type_name == name)
    }

    /// Only additions, only removals, or only replacements.
    pub fn changes_of_kind(&self, kind: ChangeKind) -> impl Iterator<Item = &ComponentChange> {
        self.changes.iter().filter(move |c| c.kind == kind)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use vellum_store::component::Component;

    #[derive(Debug, Clone, PartialEq, serde::Serialize)]
    struct Position {
        x: i32,
        y: i32,
    }

    impl Component for Position {
        const NAME: &'static str = "position";
    }

    #[derive(Debug, Clone, PartialEq, serde::Serialize)]
    struct Clock(u64);

    impl Component for Clock {
        const NAME: &'static str = "clock";
    }

    /// Always fails to serialize.
    #[derive(Debug, Clone, PartialEq)]
    struct Opaque(u8);

    impl serde::Serialize for Opaque {
        fn serialize<S: serde::Serializer>(&self, _s: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("opaque"))
        }
    }

    impl Component for Opaque {
        const NAME: &'static str = "opaque";
    }

    fn id(s: &str) -> EntityId {
        EntityId::from(s)
    }

    // -- compute_changes ----------------------------------------------------

    #[test]
    fn identical_snapshots_produce_nothing() {
        let s = Store::new().with("a", Position { x: 0, y: 0 });
        assert!(compute_changes(&s, &s, &[]).is_empty());
    }

    #[test]
    fn entries_ordered_by_entity_within_type() {
        let before = Store::new()
            .with("b", Position { x: 0, y: 0 })
            .with("d", Position { x: 0, y: 0 });
        let after = before
            .with("a", Position { x: 1, y: 1 })
            .with("b", Position { x: 2, y: 2 })
            .with("c", Position { x: 3, y: 3 })
            .without(&id("d"));

        let changes = compute_changes(&before, &after, &[]);
        let order: Vec<(&str, ChangeKind)> = changes
            .iter()
            .map(|c| (c.entity_id.as_str(), c.kind))
            .collect();
        assert_eq!(
            order,
            vec![
                ("a", ChangeKind::Added),
                ("b", ChangeKind::Changed),
                ("c", ChangeKind::Added),
                ("d", ChangeKind::Removed),
            ]
        );
    }

    #[test]
    fn ignored_types_are_skipped() {
        let before = Store::new().with("Clock", Clock(1));
        let after = before
            .with("Clock", Clock(2))
            .with("p1", Position { x: 0, y: 0 });

        let all = compute_changes(&before, &after, &[]);
        assert_eq!(all.len(), 2);

        let filtered = compute_changes(&before, &after, &["clock".to_owned()]);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].component_type_name, "position");
    }

    #[test]
    fn values_carry_old_and_new_json() {
        let before = Store::new().with("p1", Position { x: 0, y: 0 });
        let after = before.with("p1", Position { x: 5, y: 5 });
        let changes = compute_changes(&before, &after, &[]);
        assert_eq!(changes[0].old_value, Some(serde_json::json!({"x": 0, "y": 0})));
        assert_eq!(changes[0].new_value, Some(serde_json::json!({"x": 5, "y": 5})));
    }

    #[test]
    fn unserializable_value_falls_back_to_debug() {
        let before = Store::new();
        let after = before.with("o", Opaque(7));
        let changes = compute_changes(&before, &after, &[]);
        assert_eq!(
            changes[0].new_value,
            Some(serde_json::Value::String("Opaque(7)".to_owned()))
        );
    }

    // -- render_change ------------------------------------------------------

    #[test]
    fn render_line_formats() {
        let before = Store::new().with("r", Position { x: 1, y: 1 });
        let after = before
            .without(&id("r"))
            .with("n", Position { x: 2, y: 3 });
        let lines: Vec<String> = compute_changes(&before, &after, &[])
            .iter()
            .map(render_change)
            .collect();
        assert_eq!(
            lines,
            vec![
                "+ position[n] = {\"x\":2,\"y\":3}".to_owned(),
                "- position[r] = {\"x\":1,\"y\":1}".to_owned(),
            ]
        );
    }

    // -- ChangeJournal ------------------------------------------------------

    #[test]
    fn journal_queries() {
        let before = Store::new().with("a", Position { x: 0, y: 0 });
        let after = before
            .with("a", Position { x: 1, y: 0 })
            .with("b", Position { x: 0, y: 0 })
            .with("Clock", Clock(1));

        let mut journal = ChangeJournal::new();
        assert!(journal.is_empty());
        journal.extend(compute_changes(&before, &after, &[]));

        assert_eq!(journal.len(), 3);
        assert_eq!(journal.changes_for_entity(&id("a")).count(), 1);
        assert_eq!(journal.changes_for_component("position").count(), 2);
        assert_eq!(journal.changes_for_component("clock").count(), 1);
        assert_eq!(journal.changes_of_kind(ChangeKind::Added).count(), 2);

        journal.clear();
        assert!(journal.all_changes().is_empty());
    }
}
