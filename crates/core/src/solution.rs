//! Query solutions: immutable descriptions of a chosen access path
//!
//! A [`QuerySolution`] is what the plan cache remembers for a query shape.
//! The executor turns it into a live stage tree; the runner keeps the
//! solution itself only so it can be reported once execution completes.

use crate::query::{Predicate, Projection, QueryDescriptor, SortSpec};
use crate::types::Namespace;
use serde::{Deserialize, Serialize};

/// Direction of a collection scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanDirection {
    /// Increasing record location (insertion order)
    Forward,
    /// Decreasing record location
    Backward,
}

/// One node of a solution tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SolutionNode {
    /// Walk every record of a collection, applying an optional filter
    CollectionScan {
        /// Collection to scan
        namespace: Namespace,
        /// Scan direction
        direction: ScanDirection,
        /// Filter evaluated against each record
        filter: Option<Predicate>,
    },
    /// Buffer and sort the child's output
    Sort {
        /// Sort pattern
        pattern: SortSpec,
        /// Input
        child: Box<SolutionNode>,
    },
    /// Discard the first `count` results
    Skip {
        /// Results to discard
        count: usize,
        /// Input
        child: Box<SolutionNode>,
    },
    /// Stop after `count` results
    Limit {
        /// Maximum results
        count: usize,
        /// Input
        child: Box<SolutionNode>,
    },
    /// Apply a projection to each result
    Projection {
        /// Field selection
        projection: Projection,
        /// Input
        child: Box<SolutionNode>,
    },
}

impl SolutionNode {
    /// Upper-case stage label, as printed in plan summaries
    pub fn label(&self) -> &'static str {
        match self {
            SolutionNode::CollectionScan { .. } => "COLLSCAN",
            SolutionNode::Sort { .. } => "SORT",
            SolutionNode::Skip { .. } => "SKIP",
            SolutionNode::Limit { .. } => "LIMIT",
            SolutionNode::Projection { .. } => "PROJECTION",
        }
    }

    /// Child node, if any
    pub fn child(&self) -> Option<&SolutionNode> {
        match self {
            SolutionNode::CollectionScan { .. } => None,
            SolutionNode::Sort { child, .. }
            | SolutionNode::Skip { child, .. }
            | SolutionNode::Limit { child, .. }
            | SolutionNode::Projection { child, .. } => Some(child),
        }
    }
}

/// The single execution plan a runner drives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySolution {
    root: SolutionNode,
}

impl QuerySolution {
    /// Wrap a solution tree
    pub fn new(root: SolutionNode) -> Self {
        Self { root }
    }

    /// Collection-scan solution answering `query`
    ///
    /// Without indexes a collection scan is the only candidate, so this is
    /// the trivially chosen plan: scan with the filter pushed down, then
    /// sort, skip, limit and project as the query asks.
    pub fn for_query(query: &QueryDescriptor) -> Self {
        let filter = match query.filter() {
            Predicate::All => None,
            other => Some(other.clone()),
        };
        let mut node = SolutionNode::CollectionScan {
            namespace: query.namespace().clone(),
            direction: ScanDirection::Forward,
            filter,
        };
        if let Some(sort) = query.sort() {
            node = SolutionNode::Sort {
                pattern: sort.clone(),
                child: Box::new(node),
            };
        }
        if query.skip() > 0 {
            node = SolutionNode::Skip {
                count: query.skip(),
                child: Box::new(node),
            };
        }
        if let Some(limit) = query.limit() {
            node = SolutionNode::Limit {
                count: limit,
                child: Box::new(node),
            };
        }
        if let Some(projection) = query.projection() {
            node = SolutionNode::Projection {
                projection: projection.clone(),
                child: Box::new(node),
            };
        }
        Self::new(node)
    }

    /// Root of the solution tree
    pub fn root(&self) -> &SolutionNode {
        &self.root
    }

    /// One-line summary, root first: `LIMIT <- SORT <- COLLSCAN`
    pub fn summary(&self) -> String {
        let mut labels = Vec::new();
        let mut node = Some(&self.root);
        while let Some(current) = node {
            labels.push(current.label());
            node = current.child();
        }
        labels.join(" <- ")
    }
}

impl std::fmt::Display for QuerySolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.summary())
    }
}
