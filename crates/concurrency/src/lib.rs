//! Concurrency layer for the Strata query runners
//!
//! This crate implements the pieces runners coordinate through:
//! - AccessToken / SharedAccess: shared/exclusive dataset access with
//!   writer preference
//! - YieldCoordinator / ScheduledYield: release, suspend, reacquire
//! - RunnerRegistry: delivers invalidations and kill signals to
//!   registered runners
//! - ElapsedTracker: paces automatic yields

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod access;
pub mod elapsed;
pub mod registry;
pub mod yield_coordinator;

pub use access::{AccessClaim, AccessToken, ExclusiveAccess, SharedAccess};
pub use elapsed::ElapsedTracker;
pub use registry::{RegisteredRunner, RegistryMetrics, RunnerRegistry};
pub use yield_coordinator::{
    ScheduledYield, YieldCoordinator, DEFAULT_MAX_YIELD_MICROS, MAX_COUNTED_WRITERS,
    MICROS_PER_WAITING_WRITER,
};
