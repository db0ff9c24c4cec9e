//! Vellum Engine -- Event dispatch, expirations and the tick loop on top of
//! [`vellum_store`].
//!
//! Game logic is written as systems, plain functions from one snapshot to the
//! next. Mutations that must wait for the end of the tick, or that target the
//! other participant of an interaction, are expressed as [`Event`](event::Event)s
//! and applied by the [`dispatch`](dispatch::dispatch) step.
//!
//! # Quick Start
//!
//! ```
//! use vellum_engine::prelude::*;
//! use vellum_store::prelude::*;
//!
//! #[derive(Debug, Clone, PartialEq, serde::Serialize)]
//! struct Coin(u32);
//! impl Component for Coin { const NAME: &'static str = "coin"; }
//!
//! let store = Store::new()
//!     .with("coin-1", Coin(5))
//!     .with("coin-1", Expiration::remove_at(3));
//!
//! let mut tick_loop = TickLoop::new(store, TickConfig::default()).unwrap();
//! tick_loop.run_ticks(2);
//! assert!(tick_loop.store().contains::<Coin>(&"coin-1".into()));
//!
//! tick_loop.tick();
//! assert!(!tick_loop.store().contains::<Coin>(&"coin-1".into()));
//! ```

#![deny(unsafe_code)]

pub mod clock;
pub mod dispatch;
pub mod event;
pub mod expiration;
pub mod tick;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::clock::{advance_clock, current_tick, Clock};
    pub use crate::dispatch::{dispatch, dispatch_with_report, DispatchReport};
    pub use crate::event::{
        enqueue_event, pending_events, Event, EventQueue, QueuedEvent, Target, Task, TaskAction,
    };
    pub use crate::expiration::{run_expirations, Expiration};
    pub use crate::tick::{SystemFn, TickConfig, TickDiagnostics, TickLoop};
}
