//! Runner registry: delivery point for invalidations and kill signals
//!
//! A runner is registered while it is a valid target for writers' notices:
//! at minimum, for the whole time it is suspended in a yield.
//!
//! ## Delivery
//!
//! ```text
//! 1. writer calls broadcast_invalidation() before moving/removing a record
//! 2. registry snapshots the runners registered on that namespace
//! 3. map lock is released
//! 4. each runner's invalidate() runs, synchronously, in turn
//! 5. writer proceeds
//! ```
//!
//! Delivering outside the map lock lets a runner deregister itself while
//! another runner is still processing a notice, and keeps the registry
//! lock out of any lock ordering with the runners' own state.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use strata_core::{Invalidation, Namespace, RunnerId};
use strata_storage::InvalidationListener;
use tracing::{debug, info};

/// The part of a runner the registry can reach
///
/// Both callbacks may run on a writer's thread while the runner itself is
/// suspended on another thread.
pub trait RegisteredRunner: Send + Sync {
    /// Registry key
    fn id(&self) -> RunnerId;

    /// Collection the runner reads
    fn namespace(&self) -> &Namespace;

    /// A record location in [`namespace`](Self::namespace) is being moved
    /// or removed
    fn invalidate(&self, invalidation: &Invalidation);

    /// Mark the runner dead; must be lock-free and idempotent
    fn kill(&self);
}

type Targets = SmallVec<[Arc<dyn RegisteredRunner>; 8]>;

/// Registry counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryMetrics {
    /// Runners currently registered
    pub registered: usize,
    /// Invalidation notices handed to runners
    pub invalidations_delivered: u64,
    /// Kill signals handed to runners
    pub kills_delivered: u64,
}

/// Set of runners reachable by writers
///
/// Explicitly owned: create one per database instance and share it by
/// `Arc` with every runner and with the record store (as its
/// [`InvalidationListener`]).
#[derive(Default)]
pub struct RunnerRegistry {
    runners: Mutex<FxHashMap<RunnerId, Arc<dyn RegisteredRunner>>>,
    invalidations_delivered: AtomicU64,
    kills_delivered: AtomicU64,
}

impl RunnerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a runner; returns false if it was already registered
    pub fn register(&self, runner: Arc<dyn RegisteredRunner>) -> bool {
        let id = runner.id();
        let inserted = self.runners.lock().insert(id, runner).is_none();
        debug!(runner_id = %id, inserted, "Registered runner");
        inserted
    }

    /// Deregister a runner; returns false if it was not registered
    pub fn deregister(&self, id: RunnerId) -> bool {
        let removed = self.runners.lock().remove(&id).is_some();
        debug!(runner_id = %id, removed, "Deregistered runner");
        removed
    }

    /// Check if a runner is registered
    pub fn is_registered(&self, id: RunnerId) -> bool {
        self.runners.lock().contains_key(&id)
    }

    /// Number of registered runners
    pub fn len(&self) -> usize {
        self.runners.lock().len()
    }

    /// Check if no runner is registered
    pub fn is_empty(&self) -> bool {
        self.runners.lock().is_empty()
    }

    fn targets(&self, namespace: Option<&Namespace>) -> Targets {
        self.runners
            .lock()
            .values()
            .filter(|r| namespace.map_or(true, |ns| r.namespace() == ns))
            .cloned()
            .collect()
    }

    /// Deliver an invalidation to every runner registered on `namespace`
    ///
    /// Returns the number of runners notified. Returns only after every
    /// notified runner has processed the notice.
    pub fn broadcast_invalidation(&self, namespace: &Namespace, invalidation: &Invalidation) -> usize {
        let targets = self.targets(Some(namespace));
        for runner in &targets {
            runner.invalidate(invalidation);
        }
        self.invalidations_delivered
            .fetch_add(targets.len() as u64, Ordering::Relaxed);
        targets.len()
    }

    /// Kill one registered runner; returns false if it is not registered
    pub fn kill(&self, id: RunnerId) -> bool {
        let target = self.runners.lock().get(&id).cloned();
        match target {
            Some(runner) => {
                runner.kill();
                self.kills_delivered.fetch_add(1, Ordering::Relaxed);
                info!(runner_id = %id, "Killed runner");
                true
            }
            None => false,
        }
    }

    /// Kill every runner registered on `namespace`
    pub fn kill_namespace(&self, namespace: &Namespace) -> usize {
        self.kill_targets(self.targets(Some(namespace)), Some(namespace))
    }

    /// Kill every registered runner (shutdown)
    pub fn kill_all(&self) -> usize {
        self.kill_targets(self.targets(None), None)
    }

    fn kill_targets(&self, targets: Targets, namespace: Option<&Namespace>) -> usize {
        for runner in &targets {
            runner.kill();
        }
        self.kills_delivered
            .fetch_add(targets.len() as u64, Ordering::Relaxed);
        if !targets.is_empty() {
            match namespace {
                Some(ns) => info!(namespace = %ns, count = targets.len(), "Killed runners"),
                None => info!(count = targets.len(), "Killed all runners"),
            }
        }
        targets.len()
    }

    /// Snapshot of the registry counters
    pub fn metrics(&self) -> RegistryMetrics {
        RegistryMetrics {
            registered: self.len(),
            invalidations_delivered: self.invalidations_delivered.load(Ordering::Relaxed),
            kills_delivered: self.kills_delivered.load(Ordering::Relaxed),
        }
    }
}

impl InvalidationListener for RunnerRegistry {
    fn invalidate(&self, namespace: &Namespace, invalidation: &Invalidation) {
        self.broadcast_invalidation(namespace, invalidation);
    }

    fn namespace_dropped(&self, namespace: &Namespace) {
        self.kill_namespace(namespace);
    }
}

impl std::fmt::Debug for RunnerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunnerRegistry")
            .field("metrics", &self.metrics())
            .finish()
    }
}
