//! Plan Cache Reporting Tests
//!
//! Statistics go to the plan cache exactly once, and only for runs that
//! reached the end of their results.

use crate::*;
use strata_core::{Predicate, SortSpec};
use strata_query::{PlanCache, QueryEngine};

#[test]
fn test_reported_once_on_exhaustion() {
    let h = Harness::new();
    h.seed(3);
    let mut runner = h.runner(all_query(), ScriptedYield::idle());

    drain(&mut runner);
    assert_eq!(h.cache.total_reports(), 1);
    for _ in 0..3 {
        assert!(matches!(runner.get_next(), RunnerState::Exhausted));
    }
    assert_eq!(h.cache.total_reports(), 1);
    assert!(runner.stats_reported());
}

#[test]
fn test_not_reported_before_exhaustion() {
    let h = Harness::new();
    h.seed(3);
    let mut runner = h.runner(all_query(), ScriptedYield::idle());
    assert!(runner.get_next().is_advanced());
    assert!(runner.get_next().is_advanced());
    assert_eq!(h.cache.total_reports(), 0);
}

#[test]
fn test_killed_runner_never_reports() {
    let h = Harness::new();
    h.seed(3);
    let mut runner = h.runner(all_query(), ScriptedYield::idle());
    assert!(runner.get_next().is_advanced());
    runner.kill();
    for _ in 0..5 {
        assert!(matches!(runner.get_next(), RunnerState::Dead));
    }
    assert_eq!(h.cache.total_reports(), 0);
    assert!(h.cache.is_empty());
}

#[test]
fn test_killed_during_yield_never_reports() {
    let h = Harness::new();
    h.seed(3);
    let registry = h.registry.clone();
    let mut runner = h.runner(
        all_query(),
        on_yield(1, move || {
            registry.kill_all();
        }),
    );
    assert!(!runner.force_yield());
    assert!(matches!(runner.get_next(), RunnerState::Dead));
    assert_eq!(h.cache.total_reports(), 0);
}

#[test]
fn test_report_carries_query_solution_and_stats() {
    let h = Harness::new();
    h.seed(10);
    let query = QueryDescriptor::builder(ns())
        .filter(Predicate::gte("n", 4))
        .sort(SortSpec::new().asc("n"))
        .limit(3)
        .build()
        .unwrap();
    let mut runner = h.runner(query.clone(), ScriptedYield::idle());
    assert_eq!(drain(&mut runner).len(), 3);

    let entry = h.cache.get_for(&query).unwrap();
    assert_eq!(entry.solution, QuerySolution::for_query(&query));
    assert_eq!(entry.solution.summary(), "LIMIT <- SORT <- COLLSCAN");
    assert_eq!(entry.stats.stage, StageType::Limit);
    assert_eq!(entry.stats.docs_examined(), 10);
    assert_eq!(entry.reports, 1);
}

#[test]
fn test_custom_plan_cache_receives_reports() {
    #[derive(Default)]
    struct Recording(Mutex<Vec<String>>);

    impl PlanCache for Recording {
        fn add(&self, _query: &QueryDescriptor, solution: &QuerySolution, _stats: PlanStageStats) {
            self.0.lock().push(solution.summary());
        }
    }

    let h = Harness::new();
    h.seed(2);
    let recording = Arc::new(Recording::default());
    let query = all_query();
    let solution = QuerySolution::for_query(&query);
    let executor = StagePlanExecutor::from_solution(&solution, h.store.clone()).unwrap();
    let context = RunnerContext {
        registry: h.registry.clone(),
        yielder: ScriptedYield::idle(),
        plan_cache: recording.clone(),
    };
    let mut runner = SingleSolutionRunner::new(query, solution, Box::new(executor), context);
    drain(&mut runner);

    assert_eq!(recording.0.lock().as_slice(), &["COLLSCAN".to_string()]);
}

#[test]
fn test_engine_queries_share_shape_entry() {
    let engine = QueryEngine::new().unwrap();
    for i in 0..5 {
        engine.insert(&ns(), doc(json!({"_id": i, "n": i}))).unwrap();
    }
    for bound in [1, 3] {
        let query = QueryDescriptor::builder(ns())
            .filter(Predicate::gt("n", bound))
            .build()
            .unwrap();
        engine.find(query).unwrap();
    }
    assert_eq!(engine.plan_cache().len(), 1);
    assert_eq!(engine.plan_cache().total_reports(), 2);
}
