//! Per-stage execution statistics
//!
//! Every stage keeps a [`CommonStats`] block plus its own counters. The
//! tree of [`PlanStageStats`] is what a runner reports to the plan cache
//! once execution completes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageType {
    /// Full collection walk
    CollectionScan,
    /// Blocking sort
    Sort,
    /// Result skipping
    Skip,
    /// Result limiting
    Limit,
    /// Field selection
    Projection,
}

impl StageType {
    /// Upper-case label, matching the solution summary labels
    pub fn label(&self) -> &'static str {
        match self {
            StageType::CollectionScan => "COLLSCAN",
            StageType::Sort => "SORT",
            StageType::Skip => "SKIP",
            StageType::Limit => "LIMIT",
            StageType::Projection => "PROJECTION",
        }
    }
}

impl fmt::Display for StageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Counters every stage maintains
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommonStats {
    /// Calls to `work`
    pub works: u64,
    /// Results produced
    pub advanced: u64,
    /// `work` calls that produced nothing yet
    pub need_time: u64,
    /// `prepare_to_yield` calls
    pub yields: u64,
    /// `recover_from_yield` calls
    pub unyields: u64,
    /// Invalidation notices received
    pub invalidates: u64,
    /// Whether the stage reached end of stream
    pub is_eof: bool,
}

/// Stage-specific counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpecificStats {
    /// Collection scan counters
    CollectionScan {
        /// Records examined, matching or not
        docs_tested: u64,
    },
    /// Sort counters
    Sort {
        /// Results buffered from the child
        buffered: u64,
        /// Results dropped because their record was removed or replaced
        dropped: u64,
        /// Records read again after a yield or a move
        refetched: u64,
    },
    /// Skip counters
    Skip {
        /// Results discarded
        skipped: u64,
    },
    /// Limit counters
    Limit {
        /// Configured limit
        limit: u64,
    },
    /// Projection has no counters of its own
    Projection,
}

/// Statistics for a stage and its subtree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStageStats {
    /// Stage kind
    pub stage: StageType,
    /// Common counters
    pub common: CommonStats,
    /// Stage-specific counters
    pub specific: SpecificStats,
    /// Child stage statistics
    pub children: Vec<PlanStageStats>,
}

impl PlanStageStats {
    /// Statistics for a stage without children
    pub fn leaf(stage: StageType, common: CommonStats, specific: SpecificStats) -> Self {
        Self {
            stage,
            common,
            specific,
            children: Vec::new(),
        }
    }

    /// Statistics for a stage with one child
    pub fn with_child(
        stage: StageType,
        common: CommonStats,
        specific: SpecificStats,
        child: PlanStageStats,
    ) -> Self {
        Self {
            stage,
            common,
            specific,
            children: vec![child],
        }
    }

    /// Records examined by every scan in the subtree
    pub fn docs_examined(&self) -> u64 {
        let own = match self.specific {
            SpecificStats::CollectionScan { docs_tested } => docs_tested,
            _ => 0,
        };
        own + self.children.iter().map(Self::docs_examined).sum::<u64>()
    }

    /// Stage labels from root to leaf
    pub fn stage_path(&self) -> Vec<StageType> {
        let mut path = vec![self.stage];
        let mut node = self;
        while let Some(child) = node.children.first() {
            path.push(child.stage);
            node = child;
        }
        path
    }
}
