//! Turns a query solution into a live stage tree

use crate::stage::BoxedStage;
use crate::stages::{CollectionScan, LimitStage, ProjectionStage, SkipStage, SortStage};
use std::sync::Arc;
use strata_core::{Error, Namespace, Predicate, QuerySolution, Result, SolutionNode};
use strata_storage::RecordStore;

/// Where a subtree's records come from and what selected them
struct Source {
    namespace: Namespace,
    filter: Option<Predicate>,
}

/// Builds stage trees reading from one record store
#[derive(Debug, Clone)]
pub struct StageBuilder {
    store: Arc<RecordStore>,
}

impl StageBuilder {
    /// Builder for plans over `store`
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    /// Build the stage tree for `solution`
    pub fn build(&self, solution: &QuerySolution) -> Result<BoxedStage> {
        self.build_node(solution.root()).map(|(stage, _)| stage)
    }

    /// Builds a subtree and reports the collection its records come from
    fn build_node(&self, node: &SolutionNode) -> Result<(BoxedStage, Source)> {
        match node {
            SolutionNode::CollectionScan {
                namespace,
                direction,
                filter,
            } => {
                let scan = CollectionScan::new(
                    Arc::clone(&self.store),
                    namespace.clone(),
                    *direction,
                    filter.clone(),
                );
                let source = Source {
                    namespace: namespace.clone(),
                    filter: filter.clone(),
                };
                Ok((Box::new(scan), source))
            }
            SolutionNode::Sort { pattern, child } => {
                if pattern.is_empty() {
                    return Err(Error::InvalidQuery("sort pattern is empty".to_string()));
                }
                let (child, source) = self.build_node(child)?;
                let stage = SortStage::new(
                    child,
                    Arc::clone(&self.store),
                    source.namespace.clone(),
                    pattern.clone(),
                )
                .with_filter(source.filter.clone());
                Ok((Box::new(stage), source))
            }
            SolutionNode::Skip { count, child } => {
                let (child, source) = self.build_node(child)?;
                Ok((Box::new(SkipStage::new(child, *count)), source))
            }
            SolutionNode::Limit { count, child } => {
                if *count == 0 {
                    return Err(Error::InvalidQuery("limit must be positive".to_string()));
                }
                let (child, source) = self.build_node(child)?;
                Ok((Box::new(LimitStage::new(child, *count)), source))
            }
            SolutionNode::Projection { projection, child } => {
                let (child, source) = self.build_node(child)?;
                Ok((
                    Box::new(ProjectionStage::new(child, projection.clone())),
                    source,
                ))
            }
        }
    }
}
