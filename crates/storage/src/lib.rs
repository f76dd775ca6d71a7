//! Storage layer for the Strata query runners
//!
//! This crate implements the in-memory record store the runners read from:
//! - RecordStore: namespace-sharded, location-addressed records
//! - Power-of-two allocations deciding in-place update vs. move
//! - InvalidationListener: writers announce moves and removals before
//!   they happen

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod record_store;

pub use record_store::{
    allocation_for, Collection, InvalidationListener, RecordStore, UpdateOutcome, MIN_ALLOCATION,
};
