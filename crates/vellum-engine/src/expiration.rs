//! Tick deadlines that fire events.
//!
//! An entity carrying an [`Expiration`] is checked once per tick against the
//! [`Clock`](crate::clock::Clock). When the deadline has been reached the
//! component is removed and its continuation event is enqueued with the
//! entity as source, ready for the dispatcher.

use serde::Serialize;
use tracing::debug;
use vellum_store::component::Component;
use vellum_store::entity::EntityId;
use vellum_store::store::Store;

use crate::clock::current_tick;
use crate::event::{enqueue_event, Event};

/// Fire `event` once the clock reaches `deadline`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expiration {
    pub deadline: u64,
    pub event: Event,
}

impl Component for Expiration {
    const NAME: &'static str = "expiration";
}

impl Expiration {
    pub fn new(deadline: u64, event: Event) -> Self {
        Self { deadline, event }
    }

    /// Remove the owning entity at `deadline`.
    pub fn remove_at(deadline: u64) -> Self {
        Self::new(deadline, Event::remove_self())
    }

    pub fn is_due(&self, tick: u64) -> bool {
        self.deadline <= tick
    }
}

/// Enqueue the continuation of every due expiration, ascending by entity id.
///
/// Returns the input store itself when nothing is due.
pub fn run_expirations(store: &Store) -> Store {
    let now = current_tick(store);
    let due: Vec<(EntityId, Event)> = store
        .get_all::<Expiration>()
        .iter()
        .filter_map(|(id, value)| {
            let expiration = value.downcast_ref::<Expiration>()?;
            expiration
                .is_due(now)
                .then(|| (id.clone(), expiration.event.clone()))
        })
        .collect();

    let mut next = store.clone();
    for (id, event) in due {
        debug!(entity = %id, tick = now, tasks = event.len(), "expiration due");
        next = next.without_component::<Expiration>(&id);
        next = enqueue_event(&next, id, None, event);
    }
    next
}
