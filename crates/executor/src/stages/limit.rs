//! Stops after N results

use crate::stage::{BoxedStage, PlanStage, StageState};
use crate::stats::{CommonStats, PlanStageStats, SpecificStats, StageType};
use crate::working_set::WorkingSet;
use strata_core::Invalidation;

/// Limit stage
///
/// Once the limit is reached the child is never worked again.
pub struct LimitStage {
    child: BoxedStage,
    limit: usize,
    remaining: usize,
    common: CommonStats,
}

impl LimitStage {
    /// Return at most `count` results of `child`
    pub fn new(child: BoxedStage, count: usize) -> Self {
        Self {
            child,
            limit: count,
            remaining: count,
            common: CommonStats::default(),
        }
    }
}

impl PlanStage for LimitStage {
    fn work(&mut self, ws: &mut WorkingSet) -> StageState {
        self.common.works += 1;
        if self.remaining == 0 {
            self.common.is_eof = true;
            return StageState::IsEof;
        }
        match self.child.work(ws) {
            StageState::Advanced(id) => {
                self.remaining -= 1;
                self.common.advanced += 1;
                StageState::Advanced(id)
            }
            StageState::NeedTime => {
                self.common.need_time += 1;
                StageState::NeedTime
            }
            StageState::IsEof => {
                self.common.is_eof = true;
                StageState::IsEof
            }
            failure @ StageState::Failure(_) => failure,
        }
    }

    fn is_eof(&self) -> bool {
        self.remaining == 0 || self.child.is_eof()
    }

    fn prepare_to_yield(&mut self, ws: &mut WorkingSet) {
        self.common.yields += 1;
        self.child.prepare_to_yield(ws);
    }

    fn recover_from_yield(&mut self, ws: &mut WorkingSet) {
        self.common.unyields += 1;
        self.child.recover_from_yield(ws);
    }

    fn invalidate(&mut self, ws: &mut WorkingSet, invalidation: &Invalidation) {
        self.common.invalidates += 1;
        self.child.invalidate(ws, invalidation);
    }

    fn stats(&self) -> PlanStageStats {
        PlanStageStats::with_child(
            StageType::Limit,
            self.common.clone(),
            SpecificStats::Limit {
                limit: self.limit as u64,
            },
            self.child.stats(),
        )
    }

    fn stage_type(&self) -> StageType {
        StageType::Limit
    }
}
