//! The stage interface
//!
//! Execution is pull-based: the executor calls [`PlanStage::work`] on the
//! root, which calls `work` on its child, and so on down to the scan. One
//! `work` call does a bounded amount of work and may produce nothing
//! ([`StageState::NeedTime`]).

use crate::stats::{PlanStageStats, StageType};
use crate::working_set::{WorkingSet, WorkingSetId};
use strata_core::{Error, Invalidation};

/// Outcome of one unit of work
#[derive(Debug)]
pub enum StageState {
    /// A result is ready in the working set
    Advanced(WorkingSetId),
    /// Work was done but nothing is ready yet
    NeedTime,
    /// The stage will produce nothing more
    IsEof,
    /// The stage failed; it produces nothing more
    Failure(Error),
}

/// A node of a live execution tree
///
/// Between `prepare_to_yield` and `recover_from_yield` a stage must hold no
/// state that depends on storage staying unchanged, except record
/// locations, which are repaired through `invalidate`.
pub trait PlanStage: Send {
    /// Do one unit of work
    fn work(&mut self, ws: &mut WorkingSet) -> StageState;

    /// Whether the stage has reached end of stream
    fn is_eof(&self) -> bool;

    /// Drop storage-dependent state ahead of a yield
    fn prepare_to_yield(&mut self, ws: &mut WorkingSet);

    /// Resume after a yield
    fn recover_from_yield(&mut self, ws: &mut WorkingSet);

    /// A record location is about to be moved or removed
    fn invalidate(&mut self, ws: &mut WorkingSet, invalidation: &Invalidation);

    /// Statistics for this stage and its subtree
    fn stats(&self) -> PlanStageStats;

    /// Stage kind
    fn stage_type(&self) -> StageType;
}

/// Owned stage tree node
pub type BoxedStage = Box<dyn PlanStage>;
