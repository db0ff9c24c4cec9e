//! Non-blocking change log consumer.
//!
//! The [`ChangeLog`] receives `(previous, next)` snapshot pairs from the tick
//! loop and renders their differences on a dedicated worker thread. The
//! producer side only clones two snapshot handles and pushes them onto an
//! unbounded FIFO channel, so it never blocks on a slow consumer and never
//! drops an entry.
//!
//! # Lifecycle
//!
//! 1. [`ChangeLog::start`] spawns the worker.
//! 2. [`ChangeLog::log`] enqueues entries in order. [`ChangeLog::log_ignoring`]
//!    does the same with an ignore list for that entry only.
//! 3. [`ChangeLog::shutdown`] (or `Drop`) closes the channel; the worker
//!    renders every outstanding entry before exiting and is joined.
//!
//! A panic while rendering one entry is caught and logged; the worker moves
//! on to the next entry.
//!
//! # Example
//!
//! ```
//! use vellum_journal::prelude::*;
//! use vellum_store::prelude::*;
//!
//! #[derive(Debug, Clone, PartialEq, serde::Serialize)]
//! struct Health(u32);
//! impl Component for Health { const NAME: &'static str = "health"; }
//!
//! let sink = MemorySink::new();
//! let mut log = ChangeLog::start(ChangeLogConfig::default(), sink.clone()).unwrap();
//!
//! let s0 = Store::new();
//! let s1 = s0.with("p1", Health(10));
//! log.log(&s0, &s1);
//! log.shutdown();
//!
//! assert_eq!(sink.lines(), vec!["+ health[p1] = 10".to_owned()]);
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, error, info};
use vellum_store::store::Store;

use crate::config::ChangeLogConfig;
use crate::journal::{compute_changes, render_change, ChangeJournal, ComponentChange};
use crate::JournalError;

// ---------------------------------------------------------------------------
// ChangeBatch
// ---------------------------------------------------------------------------

/// The rendered differences for one logged snapshot pair.
#[derive(Debug, Clone)]
pub struct ChangeBatch {
    /// Position of the pair in enqueue order, starting at 0.
    pub sequence: u64,
    /// Every non-ignored change, ordered by component name then entity id.
    pub changes: Vec<ComponentChange>,
}

impl ChangeBatch {
    /// One rendered line per change.
    pub fn lines(&self) -> impl Iterator<Item = String> + '_ {
        self.changes.iter().map(render_change)
    }
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Destination for rendered change batches. Runs on the worker thread.
pub trait ChangeSink: Send + 'static {
    /// Handle one batch. Called in enqueue order, once per logged pair.
    fn emit(&mut self, batch: &ChangeBatch);
}

/// Emits each change as an `info` event on target `vellum::changes`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ChangeSink for TracingSink {
    fn emit(&mut self, batch: &ChangeBatch) {
        for line in batch.lines() {
            info!(target: "vellum::changes", sequence = batch.sequence, "{line}");
        }
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    lines: Vec<String>,
    journal: ChangeJournal,
    batches: u64,
}

/// Keeps every rendered line and change in memory.
///
/// Clones share the same buffer, so a test can keep one handle and pass the
/// other to [`ChangeLog::start`].
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    state: Arc<Mutex<MemoryState>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        // A panicking sink call leaves the buffer usable; keep reading it.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// All rendered lines so far.
    pub fn lines(&self) -> Vec<String> {
        self.state().lines.clone()
    }

    /// All changes so far, as a journal.
    pub fn journal(&self) -> ChangeJournal {
        self.state().journal.clone()
    }

    /// Number of batches received, including empty ones.
    pub fn batch_count(&self) -> u64 {
        self.state().batches
    }
}

impl ChangeSink for MemorySink {
    fn emit(&mut self, batch: &ChangeBatch) {
        let mut state = self.state();
        state.lines.extend(batch.lines());
        state.journal.extend(batch.changes.iter().cloned());
        state.batches += 1;
    }
}

// ---------------------------------------------------------------------------
// ChangeLog
// ---------------------------------------------------------------------------

struct LogEntry {
    sequence: u64,
    previous: Store,
    next: Store,
    /// Overrides the configured ignore list when set.
    ignore: Option<Vec<String>>,
}

/// Owner of the change log channel and its worker thread.
pub struct ChangeLog {
    sender: Option<Sender<LogEntry>>,
    worker: Option<JoinHandle<()>>,
    next_sequence: AtomicU64,
    discarded: AtomicU64,
}

impl ChangeLog {
    /// Spawn the worker thread and return the producer handle.
    pub fn start(config: ChangeLogConfig, sink: impl ChangeSink) -> Result<Self, JournalError> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let thread_name = config.thread_name.clone();
        let worker = thread::Builder::new()
            .name(thread_name)
            .spawn(move || run_worker(receiver, config.ignore, sink))
            .map_err(|e| JournalError::WorkerSpawn {
                details: e.to_string(),
            })?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
            next_sequence: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        })
    }

    /// Enqueue a snapshot pair for rendering with the configured ignore
    /// list. Never blocks.
    ///
    /// After [`shutdown`](Self::shutdown) the pair is discarded, counted in
    /// [`discarded`](Self::discarded), and reported at `error` level.
    pub fn log(&self, previous: &Store, next: &Store) {
        self.enqueue(previous, next, None);
    }

    /// Like [`log`](Self::log), but skips the component names in `ignore`
    /// instead of the configured ones for this entry.
    pub fn log_ignoring(&self, previous: &Store, next: &Store, ignore: &[String]) {
        self.enqueue(previous, next, Some(ignore.to_vec()));
    }

    fn enqueue(&self, previous: &Store, next: &Store, ignore: Option<Vec<String>>) {
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        let entry = LogEntry {
            sequence,
            previous: previous.clone(),
            next: next.clone(),
            ignore,
        };

        let sent = match &self.sender {
            Some(sender) => sender.send(entry).is_ok(),
            None => false,
        };
        if !sent {
            self.discarded.fetch_add(1, Ordering::SeqCst);
            error!(sequence, "change log is shut down -- entry discarded");
        }
    }

    /// Number of entries enqueued so far.
    pub fn logged(&self) -> u64 {
        self.next_sequence.load(Ordering::SeqCst)
    }

    /// Number of entries discarded because the log was already shut down.
    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::SeqCst)
    }

    /// Whether the worker is still accepting entries.
    pub fn is_running(&self) -> bool {
        self.sender.is_some()
    }

    /// Close the channel, let the worker drain every outstanding entry, and
    /// join it. Idempotent.
    pub fn shutdown(&mut self) {
        drop(self.sender.take());
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("change log worker terminated abnormally");
            }
        }
    }
}

impl Drop for ChangeLog {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(receiver: Receiver<LogEntry>, default_ignore: Vec<String>, mut sink: impl ChangeSink) {
    debug!("change log worker started");
    // `recv` keeps returning queued entries after the sender is dropped and
    // only errors once the channel is both closed and empty.
    while let Ok(entry) = receiver.recv() {
        let sequence = entry.sequence;
        let ignore = entry.ignore.as_deref().unwrap_or(default_ignore.as_slice());
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let batch = ChangeBatch {
                sequence,
                changes: compute_changes(&entry.previous, &entry.next, ignore),
            };
            sink.emit(&batch);
        }));
        if outcome.is_err() {
            error!(sequence, "rendering change log entry panicked -- skipping entry");
        }
    }
    debug!("change log worker drained and stopped");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
