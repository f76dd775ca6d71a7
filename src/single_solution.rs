//! Runner for queries with exactly one candidate plan
//!
//! ## Yield
//!
//! ```text
//! force_yield():
//!   1. save_state()             documents -> record locations
//!   2. registry.register()      writers can now reach this runner
//!   3. static_yield()           release access, suspend, reacquire
//!   4. registry.deregister()
//!   5. killed? -> false         (collection dropped, shutdown, ...)
//!   6. restore_state() -> true
//! ```
//!
//! While suspended the runner is reachable only through its
//! [`RunnerCore`], which the registry holds as a [`RegisteredRunner`]. The
//! core owns the executor behind a mutex: the runner's own thread locks it
//! for each call, a writer's thread locks it to deliver an invalidation.
//! Writers deliver only to registered runners, and a runner is registered
//! only while its own thread is inside step 3, so the two never contend
//! for long.

use crate::plan_cache::PlanCache;
use crate::runner::{Runner, RunnerInfo, RunnerState};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use strata_concurrency::{RegisteredRunner, RunnerRegistry, YieldCoordinator};
use strata_core::{Invalidation, Namespace, QueryDescriptor, QuerySolution, RunnerId};
use strata_executor::{ExecState, PlanExecutor};
use tracing::{debug, warn};

/// Shared services a runner needs beyond its own plan
#[derive(Clone)]
pub struct RunnerContext {
    /// Where the runner registers while yielding
    pub registry: Arc<RunnerRegistry>,
    /// Performs the suspension
    pub yielder: Arc<dyn YieldCoordinator>,
    /// Receives the completed-execution report
    pub plan_cache: Arc<dyn PlanCache>,
}

impl std::fmt::Debug for RunnerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunnerContext")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// The part of a runner writers can reach
struct RunnerCore {
    id: RunnerId,
    namespace: Namespace,
    dead: AtomicBool,
    executor: Mutex<Box<dyn PlanExecutor>>,
}

impl RunnerCore {
    fn is_dead(&self) -> bool {
        self.dead.load(Ordering::Acquire)
    }
}

impl RegisteredRunner for RunnerCore {
    fn id(&self) -> RunnerId {
        self.id
    }

    fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    fn invalidate(&self, invalidation: &Invalidation) {
        if self.is_dead() {
            return;
        }
        self.executor.lock().invalidate(invalidation);
    }

    fn kill(&self) {
        self.dead.store(true, Ordering::Release);
    }
}

/// Drives the single plan chosen for a query
///
/// Owns the query, the solution and (through its core) the executor; none
/// of them are replaced during the runner's life. Statistics are reported
/// to the plan cache once, the first time the plan runs out of results.
pub struct SingleSolutionRunner {
    core: Arc<RunnerCore>,
    query: QueryDescriptor,
    solution: QuerySolution,
    context: RunnerContext,
    stats_reported: bool,
}

impl SingleSolutionRunner {
    /// Runner for `query`, answered by `executor` built from `solution`
    pub fn new(
        query: QueryDescriptor,
        solution: QuerySolution,
        executor: Box<dyn PlanExecutor>,
        context: RunnerContext,
    ) -> Self {
        let core = Arc::new(RunnerCore {
            id: RunnerId::new(),
            namespace: query.namespace().clone(),
            dead: AtomicBool::new(false),
            executor: Mutex::new(executor),
        });
        debug!(runner_id = %core.id, namespace = %core.namespace, plan = %solution.summary(), "Created runner");
        Self {
            core,
            query,
            solution,
            context,
            stats_reported: false,
        }
    }

    /// The plan being executed
    pub fn solution(&self) -> &QuerySolution {
        &self.solution
    }

    /// Whether statistics have been sent to the plan cache
    pub fn stats_reported(&self) -> bool {
        self.stats_reported
    }

    fn report_stats(&mut self) {
        if self.stats_reported {
            return;
        }
        let stats = self.core.executor.lock().stats();
        self.context.plan_cache.add(&self.query, &self.solution, stats);
        self.stats_reported = true;
        debug!(runner_id = %self.core.id, "Reported plan statistics");
    }
}

impl Runner for SingleSolutionRunner {
    fn id(&self) -> RunnerId {
        self.core.id
    }

    fn get_next(&mut self) -> RunnerState {
        if self.core.is_dead() {
            return RunnerState::Dead;
        }
        let state = self.core.executor.lock().get_next();
        match state {
            ExecState::Advanced(doc) => RunnerState::Advanced(doc),
            ExecState::Eof => {
                self.report_stats();
                RunnerState::Exhausted
            }
            ExecState::Failed(error) => {
                warn!(runner_id = %self.core.id, error = %error, "Plan execution failed");
                self.core.kill();
                RunnerState::Failed(error)
            }
        }
    }

    fn is_eof(&self) -> bool {
        self.core.is_dead() || self.core.executor.lock().is_eof()
    }

    fn save_state(&mut self) {
        if self.core.is_dead() {
            return;
        }
        self.core.executor.lock().save_state();
    }

    fn restore_state(&mut self) {
        if self.core.is_dead() {
            return;
        }
        self.core.executor.lock().restore_state();
    }

    fn invalidate(&self, invalidation: &Invalidation) {
        RegisteredRunner::invalidate(self.core.as_ref(), invalidation);
    }

    fn query(&self) -> &QueryDescriptor {
        &self.query
    }

    fn kill(&self) {
        RegisteredRunner::kill(self.core.as_ref());
    }

    fn is_killed(&self) -> bool {
        self.core.is_dead()
    }

    fn force_yield(&mut self) -> bool {
        self.save_state();

        let registered: Arc<dyn RegisteredRunner> = self.core.clone();
        self.context.registry.register(registered);

        let micros = self.context.yielder.suggest_yield_micros();
        self.context
            .yielder
            .static_yield(micros, &self.core.namespace);

        self.context.registry.deregister(self.core.id);

        if self.core.is_dead() {
            debug!(runner_id = %self.core.id, "Runner killed while yielding");
            return false;
        }
        self.restore_state();
        true
    }

    fn info(&self) -> RunnerInfo {
        RunnerInfo {
            kind: "SingleSolutionRunner",
            runner_id: self.core.id,
            namespace: self.core.namespace.clone(),
            plan_summary: self.solution.summary(),
            stats: self.core.executor.lock().stats(),
            killed: self.core.is_dead(),
        }
    }
}

impl std::fmt::Debug for SingleSolutionRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleSolutionRunner")
            .field("id", &self.core.id)
            .field("namespace", &self.core.namespace)
            .field("plan", &self.solution.summary())
            .field("killed", &self.core.is_dead())
            .field("stats_reported", &self.stats_reported)
            .finish()
    }
}
