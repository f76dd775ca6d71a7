//! Yield coordination: how long to suspend and how to give access back
//!
//! A runner decides *when* to yield; the coordinator decides *how long* and
//! performs the release/suspend/reacquire of the shared access hold.

use crate::access::{AccessClaim, SharedAccess};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use strata_core::Namespace;
use tracing::trace;

/// Suspension added per waiting writer
pub const MICROS_PER_WAITING_WRITER: u64 = 100;

/// Waiting writers counted towards the suggestion
pub const MAX_COUNTED_WRITERS: usize = 50;

/// Default upper bound on one suspension (one second)
pub const DEFAULT_MAX_YIELD_MICROS: u64 = 1_000_000;

/// Performs the suspension half of a yield
pub trait YieldCoordinator: Send + Sync {
    /// Suggested suspension in microseconds; 0 means "just let others in"
    fn suggest_yield_micros(&self) -> u64;

    /// Release shared access, suspend for about `micros`, reacquire
    ///
    /// `namespace` names the collection the yielding runner reads and is
    /// only used as a hint.
    fn static_yield(&self, micros: u64, namespace: &Namespace);
}

/// Coordinator backed by an operation's [`SharedAccess`]
///
/// Suggests a longer suspension the more writers are queued on the token:
/// `100µs × min(waiting_writers, 50)`, and nothing when no writer waits.
#[derive(Debug, Clone)]
pub struct ScheduledYield {
    access: Arc<SharedAccess>,
    claim: Option<Arc<AccessClaim>>,
    max_micros: u64,
}

impl ScheduledYield {
    /// Coordinator for one operation's shared hold
    pub fn new(access: Arc<SharedAccess>) -> Self {
        Self {
            access,
            claim: None,
            max_micros: DEFAULT_MAX_YIELD_MICROS,
        }
    }

    /// Coordinator that keeps `claim` until it (and every clone) is dropped
    pub fn for_claim(claim: AccessClaim) -> Self {
        Self {
            access: Arc::clone(claim.access()),
            claim: Some(Arc::new(claim)),
            max_micros: DEFAULT_MAX_YIELD_MICROS,
        }
    }

    /// Clamp every suspension to `max_micros`
    pub fn with_max_micros(mut self, max_micros: u64) -> Self {
        self.max_micros = max_micros;
        self
    }

    /// The shared hold this coordinator releases
    pub fn access(&self) -> &Arc<SharedAccess> {
        &self.access
    }
}

impl YieldCoordinator for ScheduledYield {
    fn suggest_yield_micros(&self) -> u64 {
        let writers = self.access.token().waiting_writers();
        if writers == 0 {
            return 0;
        }
        writers.min(MAX_COUNTED_WRITERS) as u64 * MICROS_PER_WAITING_WRITER
    }

    fn static_yield(&self, micros: u64, namespace: &Namespace) {
        let micros = micros.min(self.max_micros);
        let released = self.access.release();
        trace!(namespace = %namespace, micros, released, "Yielding shared access");

        if micros > 0 {
            thread::sleep(Duration::from_micros(micros));
        } else {
            thread::yield_now();
        }

        // Only take back what we gave up
        if released {
            self.access.reacquire();
        }
    }
}
