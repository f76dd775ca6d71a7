//! Query engine: wires storage, runners and their shared services
//!
//! ```ignore
//! let engine = QueryEngine::builder()
//!     .yield_iterations(64)
//!     .build()?;
//!
//! let ns = Namespace::parse("app.users")?;
//! engine.insert(&ns, doc)?;
//!
//! let query = QueryDescriptor::builder(ns).filter(Predicate::gt("age", 30)).build()?;
//! let adults = engine.find(query)?;
//! ```
//!
//! Reads hold the engine's access token shared and yield it periodically;
//! writes take it exclusively. A thread that holds a read must not write
//! through the engine until it has dropped that read.

use crate::config::RunnerConfig;
use crate::error::{Error, Result};
use crate::plan_cache::InMemoryPlanCache;
use crate::single_solution::{RunnerContext, SingleSolutionRunner};
use crate::yield_policy::{run_to_completion, YieldPolicy};
use std::sync::Arc;
use strata_concurrency::{AccessToken, RegistryMetrics, RunnerRegistry, ScheduledYield, SharedAccess};
use strata_core::{Document, Namespace, QueryDescriptor, QuerySolution, RecordLocation};
use strata_executor::StagePlanExecutor;
use strata_storage::{RecordStore, UpdateOutcome};
use tracing::info;

/// Entry point for queries and writes over one record store
pub struct QueryEngine {
    store: Arc<RecordStore>,
    registry: Arc<RunnerRegistry>,
    plan_cache: Arc<InMemoryPlanCache>,
    token: Arc<AccessToken>,
    config: RunnerConfig,
}

impl QueryEngine {
    /// Engine over a fresh store with default settings
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Create a builder for engine configuration
    pub fn builder() -> QueryEngineBuilder {
        QueryEngineBuilder::new()
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Take shared access for a read operation
    ///
    /// Blocks while a writer runs or waits. The hold is released when the
    /// last clone of the returned handle is dropped.
    pub fn begin_read(&self) -> Arc<SharedAccess> {
        Arc::new(SharedAccess::acquire(Arc::clone(&self.token)))
    }

    /// Plan `query` and build a runner whose yields release `access`
    ///
    /// A read handle drives one runner at a time: a yield releases the hold
    /// for everything reading under it, but only the yielding runner is
    /// registered for invalidations. Fails with [`Error::AccessInUse`]
    /// while another runner built on `access` is alive.
    pub fn runner(
        &self,
        query: QueryDescriptor,
        access: &Arc<SharedAccess>,
    ) -> Result<SingleSolutionRunner> {
        let claim = access.claim().ok_or(Error::AccessInUse)?;
        let solution = QuerySolution::for_query(&query);
        let executor = StagePlanExecutor::from_solution(&solution, Arc::clone(&self.store))?;
        let yielder =
            ScheduledYield::for_claim(claim).with_max_micros(self.config.max_yield_micros);
        let context = RunnerContext {
            registry: Arc::clone(&self.registry),
            yielder: Arc::new(yielder),
            plan_cache: self.plan_cache.clone(),
        };
        Ok(SingleSolutionRunner::new(
            query,
            solution,
            Box::new(executor),
            context,
        ))
    }

    /// Run `query` to completion, yielding per the engine's configuration
    pub fn find(&self, query: QueryDescriptor) -> Result<Vec<Document>> {
        let access = self.begin_read();
        let mut runner = self.runner(query, &access)?;
        let mut policy = YieldPolicy::new(&self.config);
        run_to_completion(&mut runner, &mut policy)
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Create a collection; returns false if it already exists
    pub fn create_collection(&self, namespace: &Namespace) -> bool {
        let _guard = self.token.lock_exclusive();
        self.store.create_collection(namespace)
    }

    /// Insert a document
    pub fn insert(&self, namespace: &Namespace, document: Document) -> Result<RecordLocation> {
        let _guard = self.token.lock_exclusive();
        Ok(self.store.insert(namespace, document))
    }

    /// Replace the document at `location`
    ///
    /// Yielded runners holding the record are told before it moves.
    pub fn update(
        &self,
        namespace: &Namespace,
        location: RecordLocation,
        document: Document,
    ) -> Result<UpdateOutcome> {
        let _guard = self.token.lock_exclusive();
        Ok(self.store.update(namespace, location, document)?)
    }

    /// Remove the document at `location`
    ///
    /// Yielded runners holding the record are told before it goes.
    pub fn remove(&self, namespace: &Namespace, location: RecordLocation) -> Result<Document> {
        let _guard = self.token.lock_exclusive();
        Ok(self.store.remove(namespace, location)?)
    }

    /// Drop a collection, killing yielded runners that read it
    pub fn drop_collection(&self, namespace: &Namespace) -> bool {
        let _guard = self.token.lock_exclusive();
        let dropped = self.store.drop_collection(namespace);
        if dropped {
            self.plan_cache.remove_namespace(namespace);
            info!(namespace = %namespace, "Dropped collection");
        }
        dropped
    }

    // ========================================================================
    // Lifecycle and accessors
    // ========================================================================

    /// Kill every runner currently yielding; returns how many were killed
    ///
    /// Only yielding runners are registered, so callers should stop
    /// starting new reads before shutting down.
    pub fn shutdown(&self) -> usize {
        let killed = self.registry.kill_all();
        info!(killed, "Query engine shut down");
        killed
    }

    /// The underlying record store
    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    /// The runner registry
    pub fn registry(&self) -> &Arc<RunnerRegistry> {
        &self.registry
    }

    /// The plan cache
    pub fn plan_cache(&self) -> &Arc<InMemoryPlanCache> {
        &self.plan_cache
    }

    /// The dataset access token
    pub fn token(&self) -> &Arc<AccessToken> {
        &self.token
    }

    /// Active configuration
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Registry counters
    pub fn metrics(&self) -> RegistryMetrics {
        self.registry.metrics()
    }
}

impl std::fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEngine")
            .field("collections", &self.store.namespaces().len())
            .field("cached_plans", &self.plan_cache.len())
            .field("registry", &self.registry.metrics())
            .field("config", &self.config)
            .finish()
    }
}

/// Builder for [`QueryEngine`]
#[derive(Debug, Default)]
pub struct QueryEngineBuilder {
    config: RunnerConfig,
    store: Option<Arc<RecordStore>>,
    plan_cache: Option<Arc<InMemoryPlanCache>>,
}

impl QueryEngineBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole runner configuration
    pub fn config(mut self, config: RunnerConfig) -> Self {
        self.config = config;
        self
    }

    /// Results pulled between automatic yields
    pub fn yield_iterations(mut self, iterations: u32) -> Self {
        self.config.yield_iterations = iterations;
        self
    }

    /// Time between automatic yields
    pub fn yield_period_ms(mut self, period_ms: u64) -> Self {
        self.config.yield_period_ms = period_ms;
        self
    }

    /// Upper bound on one suspension
    pub fn max_yield_micros(mut self, micros: u64) -> Self {
        self.config.max_yield_micros = micros;
        self
    }

    /// Serve an existing store instead of a fresh one
    ///
    /// The engine installs its registry as the store's invalidation
    /// listener, replacing any listener already set.
    pub fn store(mut self, store: Arc<RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Report to an existing plan cache
    pub fn plan_cache(mut self, plan_cache: Arc<InMemoryPlanCache>) -> Self {
        self.plan_cache = Some(plan_cache);
        self
    }

    /// Validate the configuration and build the engine
    pub fn build(self) -> Result<QueryEngine> {
        self.config.validate()?;
        let store = self.store.unwrap_or_default();
        let registry = Arc::new(RunnerRegistry::new());
        store.set_invalidation_listener(registry.clone());
        Ok(QueryEngine {
            store,
            registry,
            plan_cache: self.plan_cache.unwrap_or_default(),
            token: Arc::new(AccessToken::new()),
            config: self.config,
        })
    }
}
