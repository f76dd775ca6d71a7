//! When to yield, and draining a runner under that policy

use crate::config::RunnerConfig;
use crate::error::{Error, Result};
use crate::runner::{Runner, RunnerState};
use strata_concurrency::ElapsedTracker;
use strata_core::Document;

/// Decides when a long-running read should yield
///
/// Fires every `yield_iterations` checks or every `yield_period`,
/// whichever comes first.
#[derive(Debug, Clone)]
pub struct YieldPolicy {
    tracker: ElapsedTracker,
}

impl YieldPolicy {
    /// Policy from a runner configuration
    pub fn new(config: &RunnerConfig) -> Self {
        Self {
            tracker: ElapsedTracker::new(config.yield_iterations, config.yield_period()),
        }
    }

    /// Count one unit of work and report whether it is time to yield
    pub fn should_yield(&mut self) -> bool {
        self.tracker.interval_has_elapsed()
    }

    /// Yield `runner` now; returns false if it was killed meanwhile
    pub fn yield_and_check_if_ok<R: Runner + ?Sized>(&mut self, runner: &mut R) -> bool {
        let alive = runner.force_yield();
        self.tracker.reset_last_time();
        alive
    }
}

impl Default for YieldPolicy {
    fn default() -> Self {
        Self::new(&RunnerConfig::default())
    }
}

/// Pull every result from `runner`, yielding as `policy` says
///
/// # Errors
///
/// - [`Error::Killed`] if the runner was killed (during a yield or before)
/// - the executor's error if execution failed
pub fn run_to_completion<R: Runner + ?Sized>(
    runner: &mut R,
    policy: &mut YieldPolicy,
) -> Result<Vec<Document>> {
    let mut results = Vec::new();
    loop {
        if policy.should_yield() && !policy.yield_and_check_if_ok(runner) {
            return Err(Error::Killed(runner.id()));
        }
        match runner.get_next() {
            RunnerState::Advanced(doc) => results.push(doc),
            RunnerState::Exhausted => return Ok(results),
            RunnerState::Dead => return Err(Error::Killed(runner.id())),
            RunnerState::Failed(e) => return Err(e.into()),
        }
    }
}
