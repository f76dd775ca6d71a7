//! Runner Test Suite
//!
//! End-to-end behaviour of query runners across yields, invalidations and
//! kills, driven both by scripted doubles (single-threaded, deterministic)
//! and by the real access token (threaded).
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test runner
//! cargo test --test runner invalidation::
//! ```

use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use strata_concurrency::{RunnerRegistry, YieldCoordinator};
use strata_core::{
    Document, Invalidation, Namespace, QueryDescriptor, QuerySolution, RecordLocation,
};
use strata_executor::{
    CommonStats, ExecState, PlanExecutor, PlanStageStats, SpecificStats, StagePlanExecutor,
    StageType,
};
use strata_storage::RecordStore;
use strata_query::{InMemoryPlanCache, Runner, RunnerContext, RunnerState, SingleSolutionRunner};

// Test modules
pub mod invalidation;
pub mod lifecycle;
pub mod plan_cache;
pub mod yielding;

// =============================================================================
// SHARED TEST UTILITIES
// =============================================================================

/// Route runner logs to the test harness output
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn ns() -> Namespace {
    Namespace::parse("test.items").unwrap()
}

pub fn doc(value: Value) -> Document {
    Document::try_from(value).unwrap()
}

pub fn ids(docs: &[Document]) -> Vec<Value> {
    docs.iter().map(|d| d.id().cloned().unwrap()).collect()
}

pub fn all_query() -> QueryDescriptor {
    QueryDescriptor::builder(ns()).build().unwrap()
}

/// Store, registry and plan cache wired the way the engine wires them
pub struct Harness {
    pub store: Arc<RecordStore>,
    pub registry: Arc<RunnerRegistry>,
    pub cache: Arc<InMemoryPlanCache>,
}

impl Harness {
    pub fn new() -> Self {
        init_tracing();
        let store = Arc::new(RecordStore::new());
        let registry = Arc::new(RunnerRegistry::new());
        store.set_invalidation_listener(registry.clone());
        Self {
            store,
            registry,
            cache: Arc::new(InMemoryPlanCache::new()),
        }
    }

    /// Insert `{_id: i, n: i}` for `i in 0..count`
    pub fn seed(&self, count: i64) -> Vec<RecordLocation> {
        (0..count)
            .map(|i| self.store.insert(&ns(), doc(json!({"_id": i, "n": i}))))
            .collect()
    }

    pub fn context(&self, yielder: Arc<dyn YieldCoordinator>) -> RunnerContext {
        RunnerContext {
            registry: self.registry.clone(),
            yielder,
            plan_cache: self.cache.clone(),
        }
    }

    /// Runner over the real stage executor
    pub fn runner(
        &self,
        query: QueryDescriptor,
        yielder: Arc<dyn YieldCoordinator>,
    ) -> SingleSolutionRunner {
        let solution = QuerySolution::for_query(&query);
        let executor = StagePlanExecutor::from_solution(&solution, self.store.clone()).unwrap();
        SingleSolutionRunner::new(query, solution, Box::new(executor), self.context(yielder))
    }

    /// Runner over a counting executor double
    pub fn counting_runner(
        &self,
        results: usize,
        yielder: Arc<dyn YieldCoordinator>,
    ) -> (SingleSolutionRunner, Arc<ExecutorCalls>) {
        let calls = Arc::new(ExecutorCalls::default());
        let executor = CountingExecutor {
            remaining: results,
            fail_with: None,
            calls: calls.clone(),
        };
        let query = all_query();
        let solution = QuerySolution::for_query(&query);
        let runner =
            SingleSolutionRunner::new(query, solution, Box::new(executor), self.context(yielder));
        (runner, calls)
    }
}

/// Per-method call counts seen by [`CountingExecutor`]
#[derive(Debug, Default)]
pub struct ExecutorCalls {
    pub get_next: AtomicUsize,
    pub save_state: AtomicUsize,
    pub restore_state: AtomicUsize,
    pub invalidate: AtomicUsize,
}

impl ExecutorCalls {
    pub fn total(&self) -> usize {
        self.get_next.load(Ordering::SeqCst)
            + self.save_state.load(Ordering::SeqCst)
            + self.restore_state.load(Ordering::SeqCst)
            + self.invalidate.load(Ordering::SeqCst)
    }
}

/// Executor double producing `remaining` documents `{_id: k}`
pub struct CountingExecutor {
    pub remaining: usize,
    pub fail_with: Option<String>,
    pub calls: Arc<ExecutorCalls>,
}

impl PlanExecutor for CountingExecutor {
    fn get_next(&mut self) -> ExecState {
        self.calls.get_next.fetch_add(1, Ordering::SeqCst);
        if let Some(msg) = self.fail_with.take() {
            return ExecState::Failed(strata_core::Error::Storage(msg));
        }
        if self.remaining == 0 {
            return ExecState::Eof;
        }
        self.remaining -= 1;
        ExecState::Advanced(doc(json!({"_id": self.remaining})))
    }

    fn is_eof(&self) -> bool {
        self.remaining == 0
    }

    fn save_state(&mut self) {
        self.calls.save_state.fetch_add(1, Ordering::SeqCst);
    }

    fn restore_state(&mut self) {
        self.calls.restore_state.fetch_add(1, Ordering::SeqCst);
    }

    fn invalidate(&mut self, _invalidation: &Invalidation) {
        self.calls.invalidate.fetch_add(1, Ordering::SeqCst);
    }

    fn stats(&self) -> PlanStageStats {
        PlanStageStats::leaf(
            StageType::CollectionScan,
            CommonStats::default(),
            SpecificStats::CollectionScan { docs_tested: 0 },
        )
    }
}

/// Yield coordinator that runs a script instead of suspending
///
/// The script runs on the runner's thread while the runner is registered,
/// standing in for writers that get in during the yield.
pub struct ScriptedYield {
    script: Mutex<Box<dyn FnMut() + Send>>,
    yields: AtomicUsize,
}

impl ScriptedYield {
    pub fn new(script: impl FnMut() + Send + 'static) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(Box::new(script)),
            yields: AtomicUsize::new(0),
        })
    }

    pub fn idle() -> Arc<Self> {
        Self::new(|| {})
    }

    pub fn yields(&self) -> usize {
        self.yields.load(Ordering::SeqCst)
    }
}

impl YieldCoordinator for ScriptedYield {
    fn suggest_yield_micros(&self) -> u64 {
        0
    }

    fn static_yield(&self, _micros: u64, _namespace: &Namespace) {
        self.yields.fetch_add(1, Ordering::SeqCst);
        (self.script.lock())();
    }
}

/// Drain a runner, yielding before every `get_next`
pub fn drain_yielding(runner: &mut SingleSolutionRunner) -> Vec<Document> {
    let mut out = Vec::new();
    loop {
        assert!(runner.force_yield(), "runner killed unexpectedly");
        match runner.get_next() {
            RunnerState::Advanced(d) => out.push(d),
            RunnerState::Exhausted => return out,
            other => panic!("unexpected state: {other:?}"),
        }
    }
}

/// Drain a runner without yielding
pub fn drain(runner: &mut SingleSolutionRunner) -> Vec<Document> {
    let mut out = Vec::new();
    loop {
        match runner.get_next() {
            RunnerState::Advanced(d) => out.push(d),
            RunnerState::Exhausted => return out,
            other => panic!("unexpected state: {other:?}"),
        }
    }
}

/// Scripted yield that runs `action` on the `n`th yield only
pub fn on_yield(n: usize, mut action: impl FnMut() + Send + 'static) -> Arc<ScriptedYield> {
    let mut count = 0;
    ScriptedYield::new(move || {
        count += 1;
        if count == n {
            action();
        }
    })
}
