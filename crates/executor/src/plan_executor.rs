//! Plan executor: drives a stage tree and hands out documents
//!
//! [`PlanExecutor`] is the seam runners depend on. [`StagePlanExecutor`]
//! is the stage-tree implementation; tests substitute their own doubles.

use crate::builder::StageBuilder;
use crate::stage::{BoxedStage, StageState};
use crate::stats::PlanStageStats;
use crate::working_set::WorkingSet;
use std::sync::Arc;
use strata_core::{Document, Error, Invalidation, QuerySolution, Result};
use strata_storage::RecordStore;

/// Outcome of one [`PlanExecutor::get_next`] call
#[derive(Debug)]
pub enum ExecState {
    /// Next result
    Advanced(Document),
    /// No more results
    Eof,
    /// Execution failed; nothing more will be produced
    Failed(Error),
}

/// Executes one plan
///
/// Between `save_state` and `restore_state` the caller may give up shared
/// access; the executor must then hold nothing but record locations, and
/// it learns about moved and removed records only through `invalidate`.
pub trait PlanExecutor: Send {
    /// Produce the next result
    fn get_next(&mut self) -> ExecState;

    /// Whether the plan has produced everything
    fn is_eof(&self) -> bool;

    /// Prepare for a yield
    fn save_state(&mut self);

    /// Resume after a yield
    fn restore_state(&mut self);

    /// A record location is about to be moved or removed
    fn invalidate(&mut self, invalidation: &Invalidation);

    /// Execution statistics so far
    fn stats(&self) -> PlanStageStats;
}

/// Executor over a stage tree and its working set
///
/// End of stream is sticky. Reaching it releases the whole working set,
/// including members a stage buffered but was never asked for (a sort
/// below a satisfied limit).
pub struct StagePlanExecutor {
    ws: WorkingSet,
    root: BoxedStage,
    eof: bool,
}

impl StagePlanExecutor {
    /// Executor for an already-built stage tree
    pub fn new(root: BoxedStage) -> Self {
        Self {
            ws: WorkingSet::new(),
            root,
            eof: false,
        }
    }

    /// Build the stage tree for `solution` over `store`
    pub fn from_solution(solution: &QuerySolution, store: Arc<RecordStore>) -> Result<Self> {
        let root = StageBuilder::new(store).build(solution)?;
        Ok(Self::new(root))
    }

    /// Live working set members (buffered or in flight)
    pub fn working_set_len(&self) -> usize {
        self.ws.len()
    }
}

impl PlanExecutor for StagePlanExecutor {
    fn get_next(&mut self) -> ExecState {
        if self.eof {
            return ExecState::Eof;
        }
        loop {
            match self.root.work(&mut self.ws) {
                StageState::Advanced(id) => {
                    return match self.ws.take(id).and_then(|m| m.into_document()) {
                        Some(doc) => ExecState::Advanced(doc),
                        None => ExecState::Failed(Error::Internal(format!(
                            "result {} has no document",
                            id.index()
                        ))),
                    };
                }
                StageState::NeedTime => continue,
                StageState::IsEof => {
                    self.eof = true;
                    self.ws.clear();
                    return ExecState::Eof;
                }
                StageState::Failure(e) => return ExecState::Failed(e),
            }
        }
    }

    fn is_eof(&self) -> bool {
        self.eof || self.root.is_eof()
    }

    fn save_state(&mut self) {
        self.root.prepare_to_yield(&mut self.ws);
    }

    fn restore_state(&mut self) {
        self.root.recover_from_yield(&mut self.ws);
    }

    fn invalidate(&mut self, invalidation: &Invalidation) {
        if self.eof {
            return;
        }
        self.root.invalidate(&mut self.ws, invalidation);
    }

    fn stats(&self) -> PlanStageStats {
        self.root.stats()
    }
}

impl std::fmt::Debug for StagePlanExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagePlanExecutor")
            .field("root", &self.root.stage_type())
            .field("working_set", &self.ws.len())
            .field("eof", &self.eof)
            .finish()
    }
}
