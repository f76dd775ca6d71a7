//! Plan cache: remembers which plan answered a query shape
//!
//! Runners report `(query, solution, stats)` once they run to completion.
//! Entries are keyed by the query's shape, so queries that differ only in
//! their constants share an entry; the latest report wins.
//!
//! Entries for plans chosen without competition (a single candidate) are
//! stored like any other and are not re-validated when the collection
//! changes. [`InMemoryPlanCache::remove_namespace`] lets whoever changes a
//! collection's access paths evict them.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use strata_core::{Namespace, QueryDescriptor, QueryShape, QuerySolution};
use strata_executor::PlanStageStats;
use tracing::debug;

/// Receives completed-execution reports
pub trait PlanCache: Send + Sync {
    /// Record that `solution` answered `query` with `stats`
    ///
    /// Fire-and-forget; must not fail.
    fn add(&self, query: &QueryDescriptor, solution: &QuerySolution, stats: PlanStageStats);
}

/// One cached plan
#[derive(Debug, Clone)]
pub struct PlanCacheEntry {
    /// Shape the entry is keyed by
    pub shape: QueryShape,
    /// Most recent query reported for this shape
    pub query: QueryDescriptor,
    /// Plan that answered it
    pub solution: QuerySolution,
    /// Execution statistics of that run
    pub stats: PlanStageStats,
    /// When the latest report arrived
    pub recorded_at: DateTime<Utc>,
    /// Reports received for this shape
    pub reports: u64,
}

/// Plan cache held in memory, shared by every runner of an engine
#[derive(Debug, Default)]
pub struct InMemoryPlanCache {
    entries: DashMap<u64, PlanCacheEntry>,
    reports: AtomicU64,
}

impl InMemoryPlanCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry for a shape
    pub fn get(&self, shape: &QueryShape) -> Option<PlanCacheEntry> {
        self.entries
            .get(&shape.cache_key())
            .filter(|e| e.shape == *shape)
            .map(|e| e.value().clone())
    }

    /// Entry for the shape of `query`
    pub fn get_for(&self, query: &QueryDescriptor) -> Option<PlanCacheEntry> {
        self.get(&query.shape())
    }

    /// Number of cached shapes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is cached
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reports received over the cache's lifetime
    pub fn total_reports(&self) -> u64 {
        self.reports.load(Ordering::Relaxed)
    }

    /// Evict every entry for one collection; returns how many were removed
    pub fn remove_namespace(&self, namespace: &Namespace) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.shape.namespace != *namespace);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(namespace = %namespace, removed, "Evicted plan cache entries");
        }
        removed
    }

    /// Evict everything
    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl PlanCache for InMemoryPlanCache {
    fn add(&self, query: &QueryDescriptor, solution: &QuerySolution, stats: PlanStageStats) {
        let shape = query.shape();
        let key = shape.cache_key();
        self.reports.fetch_add(1, Ordering::Relaxed);

        let mut entry = self.entries.entry(key).or_insert_with(|| PlanCacheEntry {
            shape: shape.clone(),
            query: query.clone(),
            solution: solution.clone(),
            stats: stats.clone(),
            recorded_at: Utc::now(),
            reports: 0,
        });
        // A key collision between different shapes: latest shape wins
        entry.shape = shape;
        entry.query = query.clone();
        entry.solution = solution.clone();
        entry.stats = stats;
        entry.recorded_at = Utc::now();
        entry.reports += 1;
        debug!(key, plan = %entry.solution.summary(), "Cached plan");
    }
}
