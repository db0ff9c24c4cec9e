//! The per-tick driving loop.
//!
//! The [`TickLoop`] owns the current snapshot and advances it one tick at a
//! time:
//!
//! 1. The [`Clock`](crate::clock::Clock) advances by one.
//! 2. All registered systems run in dependency order, each taking the
//!    snapshot produced by the previous one. Unconstrained systems keep
//!    their registration order.
//! 3. Due expirations enqueue their continuation events.
//! 4. The dispatcher drains the event queue.
//! 5. The change log, if enabled, receives `(previous, next)`.
//!
//! Systems are plain functions from snapshot to snapshot, so a run is fully
//! determined by the initial store and the registered systems.
//!
//! # Example
//!
//! ```
//! use vellum_engine::prelude::*;
//! use vellum_store::prelude::*;
//!
//! let mut tick_loop = TickLoop::new(Store::new(), TickConfig::default()).unwrap();
//! tick_loop.add_system("noop", |store| store.clone());
//! tick_loop.run_ticks(10);
//!
//! assert_eq!(tick_loop.tick_count(), 10);
//! assert_eq!(current_tick(tick_loop.store()), 10);
//! ```

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use vellum_journal::config::ChangeLogConfig;
use vellum_journal::consumer::{ChangeLog, ChangeSink, TracingSink};
use vellum_journal::JournalError;
use vellum_store::component::ComponentType;
use vellum_store::store::Store;

use crate::clock::advance_clock;
use crate::dispatch::{dispatch_with_report, DispatchReport};
use crate::expiration::{run_expirations, Expiration};

// ---------------------------------------------------------------------------
// TickConfig
// ---------------------------------------------------------------------------

/// Configuration for the tick loop.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// Start a change log that writes every tick's changes through `tracing`.
    pub log_changes: bool,
    /// Settings for the change log worker.
    pub change_log: ChangeLogConfig,
}

// ---------------------------------------------------------------------------
// TickDiagnostics
// ---------------------------------------------------------------------------

/// Timing and dispatch diagnostics for the last tick.
#[derive(Debug, Clone, Default)]
pub struct TickDiagnostics {
    /// Wall-clock time per system (in order of execution).
    pub system_times: Vec<(String, Duration)>,
    /// Time spent scanning expirations.
    pub expiration_time: Duration,
    /// Time spent draining the event queue.
    pub dispatch_time: Duration,
    /// Total time for the tick.
    pub total_time: Duration,
    /// Number of expirations that fired.
    pub expired: usize,
    /// What the dispatcher applied.
    pub dispatch: DispatchReport,
}

// ---------------------------------------------------------------------------
// SystemFn
// ---------------------------------------------------------------------------

/// A system: reads one snapshot and returns its successor.
///
/// Returning the input unchanged is the no-op. Deferred mutations go through
/// [`enqueue_event`](crate::event::enqueue_event).
pub type SystemFn = fn(&Store) -> Store;

#[derive(Debug)]
struct RegisteredSystem {
    name: String,
    func: SystemFn,
    /// Names of systems that must execute before this one.
    after: Vec<String>,
}

// ---------------------------------------------------------------------------
// TickLoop
// ---------------------------------------------------------------------------

/// Drives the store forward one tick at a time.
pub struct TickLoop {
    store: Store,
    systems: Vec<RegisteredSystem>,
    /// Indices into `systems`, in execution order.
    order: Vec<usize>,
    /// Set once every dependency name has been resolved.
    dependencies_checked: bool,
    tick_counter: u64,
    change_log: Option<ChangeLog>,
    last_diagnostics: TickDiagnostics,
}

impl TickLoop {
    /// Create a tick loop over `store`.
    ///
    /// When `config.log_changes` is set a change log is started with a
    /// [`TracingSink`]; failing to spawn its worker is the only error.
    pub fn new(store: Store, config: TickConfig) -> Result<Self, JournalError> {
        let change_log = if config.log_changes {
            Some(ChangeLog::start(config.change_log, TracingSink)?)
        } else {
            None
        };
        Ok(Self::from_parts(store, change_log))
    }

    /// Create a tick loop whose change log feeds `sink`, regardless of
    /// `config.log_changes`.
    pub fn with_sink(
        store: Store,
        config: TickConfig,
        sink: impl ChangeSink,
    ) -> Result<Self, JournalError> {
        let change_log = ChangeLog::start(config.change_log, sink)?;
        Ok(Self::from_parts(store, Some(change_log)))
    }

    fn from_parts(store: Store, change_log: Option<ChangeLog>) -> Self {
        Self {
            store,
            systems: Vec::new(),
            order: Vec::new(),
            dependencies_checked: false,
            tick_counter: 0,
            change_log,
            last_diagnostics: TickDiagnostics::default(),
        }
    }

    /// Register a system with no ordering constraints. Among unconstrained
    /// systems, registration order is execution order.
    ///
    /// # Panics
    ///
    /// Panics if a system with the same name is already registered.
    pub fn add_system(&mut self, name: &str, func: SystemFn) {
        self.add_system_after(name, &[], func);
    }

    /// Register a system that must run after every system named in `after`.
    ///
    /// Dependencies may name systems registered later; they are checked when
    /// the loop first ticks.
    ///
    /// # Panics
    ///
    /// - If a system with this name already exists.
    /// - If the new edges close a dependency cycle.
    pub fn add_system_after(&mut self, name: &str, after: &[&str], func: SystemFn) {
        assert!(
            !self.systems.iter().any(|s| s.name == name),
            "duplicate system name: {name:?}"
        );

        self.systems.push(RegisteredSystem {
            name: name.to_owned(),
            func,
            after: after.iter().map(|s| s.to_string()).collect(),
        });

        self.order = self.execution_order();
        self.dependencies_checked = false;
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.systems.iter().position(|s| s.name == name)
    }

    /// Topological order of the registered systems. Among systems whose
    /// dependencies are satisfied, the earliest registered runs first.
    /// Dependencies on unregistered names are ignored here.
    ///
    /// # Panics
    ///
    /// Panics if the dependency graph has a cycle.
    fn execution_order(&self) -> Vec<usize> {
        let count = self.systems.len();
        let mut blocked_by = vec![0usize; count];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];
        for (idx, system) in self.systems.iter().enumerate() {
            for dep in &system.after {
                if let Some(dep_idx) = self.position(dep) {
                    blocked_by[idx] += 1;
                    dependents[dep_idx].push(idx);
                }
            }
        }

        let mut ready: BTreeSet<usize> = (0..count).filter(|&i| blocked_by[i] == 0).collect();
        let mut order = Vec::with_capacity(count);
        while let Some(idx) = ready.pop_first() {
            order.push(idx);
            for &next in &dependents[idx] {
                blocked_by[next] -= 1;
                if blocked_by[next] == 0 {
                    ready.insert(next);
                }
            }
        }

        if order.len() < count {
            let stuck: Vec<&str> = (0..count)
                .filter(|i| !order.contains(i))
                .map(|i| self.systems[i].name.as_str())
                .collect();
            panic!("cycle detected in system dependencies: {stuck:?}");
        }
        order
    }

    /// # Panics
    ///
    /// Panics if any system depends on a name that was never registered.
    fn check_dependencies(&self) {
        for system in &self.systems {
            for dep in &system.after {
                assert!(
                    self.position(dep).is_some(),
                    "system '{}' declares dependency on '{dep}', but '{dep}' is not registered",
                    system.name
                );
            }
        }
    }

    /// Execute one tick and return the resulting snapshot.
    ///
    /// # Panics
    ///
    /// Panics on the first tick if a system depends on an unregistered name.
    pub fn tick(&mut self) -> &Store {
        let tick_start = Instant::now();
        let previous = self.store.clone();

        let mut store = advance_clock(&previous);

        if !self.dependencies_checked {
            self.check_dependencies();
            self.dependencies_checked = true;
        }

        let mut system_times = Vec::with_capacity(self.systems.len());
        for &idx in &self.order {
            let system = &self.systems[idx];
            let sys_start = Instant::now();
            store = (system.func)(&store);
            system_times.push((system.name.clone(), sys_start.elapsed()));
        }

        let expiration_start = Instant::now();
        let expiration_type = ComponentType::of::<Expiration>();
        let pending_expirations = store.len_of(expiration_type);
        store = run_expirations(&store);
        let expired = pending_expirations - store.len_of(expiration_type);
        let expiration_time = expiration_start.elapsed();

        let dispatch_start = Instant::now();
        let (store, dispatch) = dispatch_with_report(&store);
        let dispatch_time = dispatch_start.elapsed();

        if let Some(log) = &self.change_log {
            log.log(&previous, &store);
        }

        self.store = store;
        self.tick_counter += 1;
        self.last_diagnostics = TickDiagnostics {
            system_times,
            expiration_time,
            dispatch_time,
            total_time: tick_start.elapsed(),
            expired,
            dispatch,
        };

        &self.store
    }

    /// Run `count` ticks. Returns the total number of tasks applied.
    pub fn run_ticks(&mut self, count: u64) -> u64 {
        let mut applied = 0u64;
        for _ in 0..count {
            self.tick();
            applied += self.last_diagnostics.dispatch.tasks_applied as u64;
        }
        applied
    }

    /// The current snapshot.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Replace the current snapshot, e.g. to inject external writes between
    /// ticks. The next tick diffs against this store.
    pub fn set_store(&mut self, store: Store) {
        self.store = store;
    }

    /// Number of ticks executed by this loop.
    pub fn tick_count(&self) -> u64 {
        self.tick_counter
    }

    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// Registered system names, in execution order.
    pub fn system_names(&self) -> Vec<&str> {
        self.order
            .iter()
            .map(|&idx| self.systems[idx].name.as_str())
            .collect()
    }

    pub fn last_diagnostics(&self) -> &TickDiagnostics {
        &self.last_diagnostics
    }

    /// The change log, if one is running.
    pub fn change_log(&self) -> Option<&ChangeLog> {
        self.change_log.as_ref()
    }

    /// Drain and stop the change log. Ticks after this still run, but their
    /// change log entries are discarded.
    pub fn shutdown(&mut self) {
        if let Some(log) = self.change_log.as_mut() {
            log.shutdown();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
