//! Plan execution for the Strata query runner layer
//!
//! A query solution is turned into a tree of [`PlanStage`]s sharing one
//! [`WorkingSet`]. [`StagePlanExecutor`] pulls results from the root and
//! implements [`PlanExecutor`], the interface runners drive:
//!
//! ```text
//! QuerySolution ──StageBuilder──▶ stage tree ──StagePlanExecutor──▶ Documents
//! ```
//!
//! Stages support the yield protocol: `prepare_to_yield` drops document
//! snapshots, `invalidate` repairs record locations while the plan is
//! suspended, and `recover_from_yield` resumes. Documents that can no longer
//! be resolved after a yield are dropped rather than returned stale.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod builder;
mod plan_executor;
mod stage;
pub mod stages;
mod stats;
mod working_set;

#[cfg(test)]
mod tests;

pub use builder::StageBuilder;
pub use plan_executor::{ExecState, PlanExecutor, StagePlanExecutor};
pub use stage::{BoxedStage, PlanStage, StageState};
pub use stats::{CommonStats, PlanStageStats, SpecificStats, StageType};
pub use working_set::{MemberState, WorkingSet, WorkingSetId, WorkingSetMember};
