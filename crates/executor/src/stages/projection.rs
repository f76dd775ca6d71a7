//! Field selection
//!
//! Projected results are computed documents: they are detached from
//! storage and survive yields untouched.

use crate::stage::{BoxedStage, PlanStage, StageState};
use crate::stats::{CommonStats, PlanStageStats, SpecificStats, StageType};
use crate::working_set::WorkingSet;
use strata_core::{Error, Invalidation, Projection};

/// Projection stage
pub struct ProjectionStage {
    child: BoxedStage,
    projection: Projection,
    common: CommonStats,
}

impl ProjectionStage {
    /// Apply `projection` to every result of `child`
    pub fn new(child: BoxedStage, projection: Projection) -> Self {
        Self {
            child,
            projection,
            common: CommonStats::default(),
        }
    }
}

impl PlanStage for ProjectionStage {
    fn work(&mut self, ws: &mut WorkingSet) -> StageState {
        self.common.works += 1;
        match self.child.work(ws) {
            StageState::Advanced(id) => {
                let Some(member) = ws.get_mut(id) else {
                    return StageState::Failure(Error::Internal(format!(
                        "projection input {} is not in the working set",
                        id.index()
                    )));
                };
                let Some(projected) = member.document().map(|d| self.projection.apply(d)) else {
                    return StageState::Failure(Error::Internal(
                        "projection input has no document".to_string(),
                    ));
                };
                member.set_owned(projected);
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
            StageType::Projection,
            self.common.clone(),
            SpecificStats::Projection,
            self.child.stats(),
        )
    }

    fn stage_type(&self) -> StageType {
        StageType::Projection
    }
}
