//! The dispatcher: drains the event queue and applies every task.
//!
//! Triples are applied in arrival order and tasks within one event in list
//! order, so a later task can rely on an entity created by an earlier one in
//! the same drain. Targets that do not exist are not an error: writing
//! creates the entity and removing from an absent entity is a no-op.
//!
//! The queue is read once when the drain starts; after every task has run it
//! is replaced by an empty queue in a single write. Anything enqueued by the
//! tasks themselves is discarded along with it.

use tracing::debug;
use vellum_store::entity::EntityId;
use vellum_store::store::Store;

use crate::event::{EventQueue, QueuedEvent, Target, TaskAction};

// ---------------------------------------------------------------------------
// DispatchReport
// ---------------------------------------------------------------------------

/// Summary of one [`dispatch_with_report`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Number of triples drained from the queue.
    pub events: usize,
    /// Number of tasks whose target resolved and which were applied.
    pub tasks_applied: usize,
    /// Number of tasks targeting [`Target::Other`] on a triple with no
    /// counter-party.
    pub tasks_skipped: usize,
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Drain the event queue into the store.
///
/// Returns the input store itself when there is nothing to drain.
pub fn dispatch(store: &Store) -> Store {
    dispatch_with_report(store).0
}

/// [`dispatch`], also reporting what was applied.
pub fn dispatch_with_report(store: &Store) -> (Store, DispatchReport) {
    let events_id = EntityId::events();
    let queue = match store.get::<EventQueue>(&events_id) {
        Some(queue) if !queue.is_empty() => queue.clone(),
        _ => return (store.clone(), DispatchReport::default()),
    };

    let mut report = DispatchReport {
        events: queue.len(),
        ..DispatchReport::default()
    };
    let mut next = store.clone();

    for queued in queue.iter() {
        for task in &queued.event.tasks {
            let Some(target) = resolve(&task.target, queued) else {
                debug!(
                    source = %queued.source,
                    task = task.action.kind(),
                    "task targets Other but the event has no counter-party -- skipped"
                );
                report.tasks_skipped += 1;
                continue;
            };
            debug!(
                source = %queued.source,
                target = %target,
                task = task.action.kind(),
                "applying task"
            );
            next = apply_task(&next, target, &task.action);
            report.tasks_applied += 1;
        }
    }

    (next.with(events_id, EventQueue::new()), report)
}

/// The concrete entity a task acts on, if it can be resolved.
fn resolve<'a>(target: &'a Target, queued: &'a QueuedEvent) -> Option<&'a EntityId> {
    match target {
        Target::This => Some(&queued.source),
        Target::Other => queued.other.as_ref(),
        Target::Entity(id) => Some(id),
    }
}

fn apply_task(store: &Store, target: &EntityId, action: &TaskAction) -> Store {
    match action {
        TaskAction::AddComponent(value) => store.with_value(target.clone(), value.clone()),
        TaskAction::RemoveComponent(ty) => store.without_type(*ty, target),
        TaskAction::AddEntity(components) => components
            .iter()
            .fold(store.clone(), |s, c| s.with_value(target.clone(), c.clone())),
        TaskAction::RemoveEntity => store.without(target),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
