//! Events, tasks, and the per-tick event queue.
//!
//! An [`Event`] is an ordered list of [`Task`]s, each one primitive mutation
//! plus a symbolic [`Target`]. Systems do not mutate the store through events
//! directly; they append a [`QueuedEvent`] to the [`EventQueue`] held by the
//! well-known `"Events"` entity with [`enqueue_event`], and the dispatcher
//! applies the queue later in the same tick.
//!
//! # Example
//!
//! ```
//! use vellum_engine::prelude::*;
//! use vellum_store::prelude::*;
//!
//! #[derive(Debug, Clone, PartialEq, serde::Serialize)]
//! struct Damage(u32);
//! impl Component for Damage { const NAME: &'static str = "damage"; }
//!
//! let hit = Event::new().then(Task::add_component(Target::Other, Damage(5)));
//! let store = enqueue_event(&Store::new(), "bullet", Some("ship".into()), hit);
//! assert_eq!(pending_events(&store), 1);
//! ```

use serde::Serialize;
use vellum_store::component::{Component, ComponentType, ComponentValue};
use vellum_store::entity::EntityId;
use vellum_store::store::Store;

// ---------------------------------------------------------------------------
// Target
// ---------------------------------------------------------------------------

/// Symbolic recipient of a task, resolved against the queued triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Target {
    /// The entity that enqueued the event.
    This,
    /// The counter-party of the interaction that enqueued the event.
    Other,
    /// A concrete entity, independent of who enqueued the event.
    Entity(EntityId),
}

impl Target {
    /// Shorthand for [`Target::Entity`].
    pub fn entity(id: impl Into<EntityId>) -> Self {
        Self::Entity(id.into())
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// The mutation a [`Task`] performs once its target is resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TaskAction {
    /// Write one component onto the target.
    AddComponent(ComponentValue),
    /// Remove one component type from the target.
    RemoveComponent(ComponentType),
    /// Write every listed component onto the target.
    AddEntity(Vec<ComponentValue>),
    /// Remove every component of the target.
    RemoveEntity,
}

impl TaskAction {
    /// Short label used in log output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AddComponent(_) => "add_component",
            Self::RemoveComponent(_) => "remove_component",
            Self::AddEntity(_) => "add_entity",
            Self::RemoveEntity => "remove_entity",
        }
    }
}

/// One deferred primitive mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub target: Target,
    pub action: TaskAction,
}

impl Task {
    pub fn add_component<T: Component>(target: Target, value: T) -> Self {
        Self {
            target,
            action: TaskAction::AddComponent(ComponentValue::new(value)),
        }
    }

    pub fn remove_component<T: Component>(target: Target) -> Self {
        Self {
            target,
            action: TaskAction::RemoveComponent(ComponentType::of::<T>()),
        }
    }

    /// Write all `components` onto `target` in one task. Use with a fresh
    /// explicit id to create an entity.
    pub fn add_entity(target: Target, components: Vec<ComponentValue>) -> Self {
        Self {
            target,
            action: TaskAction::AddEntity(components),
        }
    }

    pub fn remove_entity(target: Target) -> Self {
        Self {
            target,
            action: TaskAction::RemoveEntity,
        }
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// An ordered list of tasks, applied together by the dispatcher.
///
/// `Event` is itself a component, so an entity can carry the event it fires
/// on interaction and a system can enqueue it when the interaction happens.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Event {
    pub tasks: Vec<Task>,
}

impl Component for Event {
    const NAME: &'static str = "event";
}

impl Event {
    /// An event with no tasks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task, builder style.
    pub fn then(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    /// The event that removes the entity that enqueued it.
    pub fn remove_self() -> Self {
        Self::new().then(Task::remove_entity(Target::This))
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

// ---------------------------------------------------------------------------
// EventQueue
// ---------------------------------------------------------------------------

/// One pending `(source, other, event)` triple.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueuedEvent {
    /// Resolves [`Target::This`].
    pub source: EntityId,
    /// Resolves [`Target::Other`]. `None` for events with no counter-party,
    /// such as expirations.
    pub other: Option<EntityId>,
    pub event: Event,
}

/// Pending events in arrival order. Lives on [`EntityId::events`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EventQueue {
    events: im::Vector<QueuedEvent>,
}

impl Component for EventQueue {
    const NAME: &'static str = "event_queue";
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Pending triples, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &QueuedEvent> {
        self.events.iter()
    }

    /// A copy of this queue with `queued` appended.
    pub fn pushed(&self, queued: QueuedEvent) -> Self {
        let mut events = self.events.clone();
        events.push_back(queued);
        Self { events }
    }
}

/// Append one triple to the event queue as a single store write.
pub fn enqueue_event(
    store: &Store,
    source: impl Into<EntityId>,
    other: Option<EntityId>,
    event: Event,
) -> Store {
    let events = EntityId::events();
    let queued = QueuedEvent {
        source: source.into(),
        other,
        event,
    };
    let queue = match store.get::<EventQueue>(&events) {
        Some(queue) => queue.pushed(queued),
        None => EventQueue::new().pushed(queued),
    };
    store.with(events, queue)
}

/// Number of triples waiting for the next dispatch.
pub fn pending_events(store: &Store) -> usize {
    store
        .get::<EventQueue>(&EntityId::events())
        .map_or(0, EventQueue::len)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
