//! Discards the first N results of its child

use crate::stage::{BoxedStage, PlanStage, StageState};
use crate::stats::{CommonStats, PlanStageStats, SpecificStats, StageType};
use crate::working_set::WorkingSet;
use strata_core::Invalidation;

/// Skip stage
pub struct SkipStage {
    child: BoxedStage,
    remaining: usize,
    common: CommonStats,
    skipped: u64,
}

impl SkipStage {
    /// Skip the first `count` results of `child`
    pub fn new(child: BoxedStage, count: usize) -> Self {
        Self {
            child,
            remaining: count,
            common: CommonStats::default(),
            skipped: 0,
        }
    }
}

impl PlanStage for SkipStage {
    fn work(&mut self, ws: &mut WorkingSet) -> StageState {
        self.common.works += 1;
        match self.child.work(ws) {
            StageState::Advanced(id) if self.remaining > 0 => {
                self.remaining -= 1;
                self.skipped += 1;
                ws.free(id);
                self.common.need_time += 1;
                StageState::NeedTime
            }
            StageState::Advanced(id) => {
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
        self.child.is_eof()
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
            StageType::Skip,
            self.common.clone(),
            SpecificStats::Skip {
                skipped: self.skipped,
            },
            self.child.stats(),
        )
    }

    fn stage_type(&self) -> StageType {
        StageType::Skip
    }
}
