//! Vellum Journal -- Change sets between store snapshots and the background
//! worker that renders them.
//!
//! - [`journal`]: flattens snapshot diffs into [`ComponentChange`](journal::ComponentChange)
//!   entries and accumulates them in a queryable [`ChangeJournal`](journal::ChangeJournal).
//! - [`consumer`]: the [`ChangeLog`](consumer::ChangeLog), a non-blocking FIFO
//!   of snapshot pairs consumed by a dedicated thread.
//! - [`config`]: worker configuration, loadable from JSON.

#![deny(unsafe_code)]

pub mod config;
pub mod consumer;
pub mod journal;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced while configuring or starting the change log.
#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    /// A configuration document could not be parsed.
    #[error("invalid change log configuration: {details}")]
    InvalidConfig {
        details: String,
    },

    /// The operating system refused to spawn the worker thread.
    #[error("failed to spawn change log worker: {details}")]
    WorkerSpawn {
        details: String,
    },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::config::ChangeLogConfig;
    pub use crate::consumer::{ChangeBatch, ChangeLog, ChangeSink, MemorySink, TracingSink};
    pub use crate::journal::{
        compute_changes, render_change, ChangeJournal, ChangeKind, ComponentChange,
    };
    pub use crate::JournalError;
}
