//! # strata-query
//!
//! Query runners for an embedded document store: execute one query plan,
//! give up dataset access periodically so writers can run, and stay correct
//! while records move or disappear underneath.
//!
//! ## Quick Start
//!
//! ```ignore
//! use strata_query::prelude::*;
//!
//! let engine = QueryEngine::new()?;
//! let ns = Namespace::parse("app.users")?;
//! engine.insert(&ns, Document::try_from(json!({"_id": 1, "age": 41}))?)?;
//!
//! let query = QueryDescriptor::builder(ns)
//!     .filter(Predicate::gt("age", 30))
//!     .build()?;
//! let results = engine.find(query)?;
//! ```
//!
//! ## Driving a runner by hand
//!
//! ```ignore
//! let access = engine.begin_read();
//! let mut runner = engine.runner(query, &access)?;
//! loop {
//!     match runner.get_next() {
//!         RunnerState::Advanced(doc) => { /* ... */ }
//!         RunnerState::Exhausted => break,
//!         RunnerState::Dead => return Err(Error::Killed(runner.id())),
//!         RunnerState::Failed(e) => return Err(e.into()),
//!     }
//!     if !runner.force_yield() {
//!         // killed while yielding
//!     }
//! }
//! ```
//!
//! ## Layers
//!
//! - `strata-core`: identifiers, documents, queries, solutions
//! - `strata-storage`: record store and invalidation notices
//! - `strata-concurrency`: access token, yield coordination, runner registry
//! - `strata-executor`: stage trees and the plan executor
//! - this crate: [`Runner`], [`SingleSolutionRunner`], plan cache, engine

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod engine;
mod error;
mod plan_cache;
mod runner;
mod single_solution;
mod yield_policy;

pub mod prelude;

pub use config::{RunnerConfig, DEFAULT_YIELD_ITERATIONS, DEFAULT_YIELD_PERIOD_MS};
pub use engine::{QueryEngine, QueryEngineBuilder};
pub use error::{Error, Result};
pub use plan_cache::{InMemoryPlanCache, PlanCache, PlanCacheEntry};
pub use runner::{Runner, RunnerInfo, RunnerState};
pub use single_solution::{RunnerContext, SingleSolutionRunner};
pub use yield_policy::{run_to_completion, YieldPolicy};
