//! The runner interface
//!
//! A runner produces the results of one query and survives the periods in
//! which it gives up access to the dataset. It is driven by one thread at a
//! time; [`Runner::invalidate`] and [`Runner::kill`] may be called from
//! other threads.

use serde::Serialize;
use strata_core::{Document, Invalidation, Namespace, QueryDescriptor, RunnerId};
use strata_executor::PlanStageStats;

/// Outcome of one [`Runner::get_next`] call
#[derive(Debug)]
pub enum RunnerState {
    /// Next result
    Advanced(Document),
    /// Every result has been produced
    Exhausted,
    /// The runner was killed or failed earlier; it produces nothing more
    Dead,
    /// Execution failed; the runner is dead from now on
    Failed(strata_core::Error),
}

impl RunnerState {
    /// The document, if this is a result
    pub fn into_document(self) -> Option<Document> {
        match self {
            RunnerState::Advanced(doc) => Some(doc),
            _ => None,
        }
    }

    /// Whether more results may follow
    pub fn is_advanced(&self) -> bool {
        matches!(self, RunnerState::Advanced(_))
    }
}

/// Explain-style description of a runner
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunnerInfo {
    /// Runner implementation
    pub kind: &'static str,
    /// Registry key
    pub runner_id: RunnerId,
    /// Collection read
    pub namespace: Namespace,
    /// One-line plan description, root first
    pub plan_summary: String,
    /// Stage statistics so far
    pub stats: PlanStageStats,
    /// Whether the runner is dead
    pub killed: bool,
}

/// Produces the results of one query
pub trait Runner: Send {
    /// Registry key of this runner
    fn id(&self) -> RunnerId;

    /// Produce the next result
    ///
    /// Once the runner is dead this returns [`RunnerState::Dead`] without
    /// doing any work.
    fn get_next(&mut self) -> RunnerState;

    /// Whether no more results will be produced
    fn is_eof(&self) -> bool;

    /// Convert held documents to record locations ahead of a yield
    fn save_state(&mut self);

    /// Re-resolve held record locations after a yield
    fn restore_state(&mut self);

    /// A record location in the runner's collection is about to be moved
    /// or removed
    fn invalidate(&self, invalidation: &Invalidation);

    /// The query being answered
    fn query(&self) -> &QueryDescriptor;

    /// Mark the runner dead; idempotent, safe from any thread
    fn kill(&self);

    /// Whether the runner is dead
    fn is_killed(&self) -> bool;

    /// Give up access, let writers run, take access back
    ///
    /// Returns false exactly when the runner was killed while suspended.
    fn force_yield(&mut self) -> bool;

    /// Explain-style description
    fn info(&self) -> RunnerInfo;
}
