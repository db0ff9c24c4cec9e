//! The simulation clock: a singleton tick counter stored in the snapshot.

use serde::Serialize;
use vellum_store::component::Component;
use vellum_store::entity::EntityId;
use vellum_store::store::Store;

/// Number of ticks the simulation has advanced. Lives on [`EntityId::clock`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Clock {
    pub tick: u64,
}

impl Component for Clock {
    const NAME: &'static str = "clock";
}

/// The current tick, or 0 for a store that has never been advanced.
pub fn current_tick(store: &Store) -> u64 {
    store
        .get::<Clock>(&EntityId::clock())
        .map_or(0, |clock| clock.tick)
}

/// Advance the clock by exactly one tick.
pub fn advance_clock(store: &Store) -> Store {
    let tick = current_tick(store) + 1;
    store.with(EntityId::clock(), Clock { tick })
}
