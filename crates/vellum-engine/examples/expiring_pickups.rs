//! Headless demo -- a player walks over timed pickups.
//!
//! Each pickup carries the event it fires when touched and an expiration that
//! removes it after a few ticks. Every tick's changes are written through
//! `tracing`.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example expiring_pickups -p vellum-engine

use tracing_subscriber::EnvFilter;
use vellum_engine::prelude::*;
use vellum_journal::prelude::*;
use vellum_store::prelude::*;

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
struct Position(i64);

impl Component for Position {
    const NAME: &'static str = "position";
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
struct Score(u32);

impl Component for Score {
    const NAME: &'static str = "score";
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
struct Pickup {
    points: u32,
}

impl Component for Pickup {
    const NAME: &'static str = "pickup";
}

const PLAYER: &str = "player";

fn walk(store: &Store) -> Store {
    let player = EntityId::from(PLAYER);
    match store.get::<Position>(&player) {
        Some(pos) => store.with(player, Position(pos.0 + 1)),
        None => store.clone(),
    }
}

fn touch(store: &Store) -> Store {
    let player = EntityId::from(PLAYER);
    let Some(player_pos) = store.get::<Position>(&player) else {
        return store.clone();
    };
    let score = store.get::<Score>(&player).map_or(0, |s| s.0);

    let mut next = store.clone();
    for (id, value) in store.get_all::<Pickup>().iter() {
        let Some(pickup) = value.downcast_ref::<Pickup>() else {
            continue;
        };
        if store.get::<Position>(id) == Some(player_pos) {
            let event = Event::new()
                .then(Task::add_component(Target::Other, Score(score + pickup.points)))
                .then(Task::remove_entity(Target::This));
            next = enqueue_event(&next, id.clone(), Some(player.clone()), event);
        }
    }
    next
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut store = Store::new()
        .with(PLAYER, Position(0))
        .with(PLAYER, Score(0));
    for (i, lifetime) in [(3i64, 5u64), (6, 4), (9, 12), (12, 20)] {
        let id = EntityId::from(format!("pickup-{i}"));
        store = store
            .with(id.clone(), Position(i))
            .with(id.clone(), Pickup { points: i as u32 * 10 })
            .with(id, Expiration::remove_at(lifetime));
    }

    let config = TickConfig {
        log_changes: true,
        change_log: ChangeLogConfig::default().ignoring("event_queue"),
    };
    let mut tick_loop = TickLoop::new(store, config)?;
    tick_loop.add_system("walk", walk);
    tick_loop.add_system_after("touch", &["walk"], touch);

    let applied = tick_loop.run_ticks(15);
    tick_loop.shutdown();

    let final_store = tick_loop.store();
    let score = final_store
        .get::<Score>(&EntityId::from(PLAYER))
        .map_or(0, |s| s.0);
    println!("ticks:          {}", tick_loop.tick_count());
    println!("tasks applied:  {applied}");
    println!("final score:    {score}");
    println!("pickups left:   {}", final_store.get_all::<Pickup>().len());
    println!("content hash:   {}", final_store.content_hash()?);
    Ok(())
}
