//! Runner Lifecycle Tests
//!
//! Result production, kill semantics and failure handling.

use crate::*;
use strata_core::{Predicate, Projection, SortSpec};

// =============================================================================
// RESULT PRODUCTION
// =============================================================================

#[test]
fn test_runner_returns_query_results() {
    let h = Harness::new();
    h.seed(6);
    let query = QueryDescriptor::builder(ns())
        .filter(Predicate::lt("n", 4))
        .sort(SortSpec::new().desc("n"))
        .project(Projection::include(["n"]))
        .build()
        .unwrap();
    let mut runner = h.runner(query, ScriptedYield::idle());

    let out = drain(&mut runner);
    assert_eq!(ids(&out), vec![json!(3), json!(2), json!(1), json!(0)]);
    assert!(runner.is_eof());
}

#[test]
fn test_exhausted_is_repeatable() {
    let h = Harness::new();
    let mut runner = h.runner(all_query(), ScriptedYield::idle());
    assert!(matches!(runner.get_next(), RunnerState::Exhausted));
    assert!(matches!(runner.get_next(), RunnerState::Exhausted));
    assert!(!runner.is_killed());
}

#[test]
fn test_info_describes_plan() {
    let h = Harness::new();
    h.seed(2);
    let query = QueryDescriptor::builder(ns()).limit(1).build().unwrap();
    let mut runner = h.runner(query, ScriptedYield::idle());
    drain(&mut runner);

    let info = runner.info();
    assert_eq!(info.runner_id, runner.id());
    assert_eq!(info.namespace, ns());
    assert_eq!(info.plan_summary, "LIMIT <- COLLSCAN");
    assert_eq!(info.stats.common.advanced, 1);

    let json = serde_json::to_value(&info).unwrap();
    assert_eq!(json["kind"], "SingleSolutionRunner");
}

// =============================================================================
// KILL
// =============================================================================

#[test]
fn test_dead_runner_does_no_work() {
    let h = Harness::new();
    let (mut runner, calls) = h.counting_runner(10, ScriptedYield::idle());
    assert!(runner.get_next().is_advanced());

    runner.kill();
    let before = calls.total();

    for _ in 0..3 {
        assert!(matches!(runner.get_next(), RunnerState::Dead));
    }
    runner.save_state();
    runner.restore_state();
    runner.invalidate(&Invalidation::removed(RecordLocation::new(1)));

    assert_eq!(calls.total(), before, "executor touched after kill");
    assert!(runner.is_eof());
}

#[test]
fn test_kill_is_idempotent() {
    let h = Harness::new();
    let (mut runner, _) = h.counting_runner(1, ScriptedYield::idle());
    runner.kill();
    runner.kill();
    assert!(runner.is_killed());
    assert!(matches!(runner.get_next(), RunnerState::Dead));
}

#[test]
fn test_query_available_after_kill() {
    let h = Harness::new();
    let query = QueryDescriptor::builder(ns())
        .filter(Predicate::eq("n", 1))
        .build()
        .unwrap();
    let runner = h.runner(query.clone(), ScriptedYield::idle());
    runner.kill();
    assert_eq!(runner.query().filter(), query.filter());
    assert_eq!(runner.query().namespace(), &ns());
}

#[test]
fn test_force_yield_on_dead_runner_returns_false() {
    let h = Harness::new();
    let (mut runner, calls) = h.counting_runner(3, ScriptedYield::idle());
    runner.kill();
    assert!(!runner.force_yield());
    assert_eq!(calls.total(), 0);
    assert!(h.registry.is_empty());
}

// =============================================================================
// FAILURE
// =============================================================================

#[test]
fn test_failure_surfaces_error_then_dead() {
    let h = Harness::new();
    let calls = Arc::new(ExecutorCalls::default());
    let executor = CountingExecutor {
        remaining: 5,
        fail_with: Some("checksum mismatch".to_string()),
        calls: calls.clone(),
    };
    let query = all_query();
    let solution = QuerySolution::for_query(&query);
    let mut runner = SingleSolutionRunner::new(
        query,
        solution,
        Box::new(executor),
        h.context(ScriptedYield::idle()),
    );

    match runner.get_next() {
        RunnerState::Failed(e) => assert_eq!(e.to_string(), "storage error: checksum mismatch"),
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(runner.is_killed());
    assert!(matches!(runner.get_next(), RunnerState::Dead));
    assert_eq!(calls.get_next.load(Ordering::SeqCst), 1);
}

#[test]
fn test_runners_are_independent() {
    let h = Harness::new();
    h.seed(3);
    let mut a = h.runner(all_query(), ScriptedYield::idle());
    let mut b = h.runner(all_query(), ScriptedYield::idle());
    assert_ne!(a.id(), b.id());

    a.kill();
    assert!(matches!(a.get_next(), RunnerState::Dead));
    assert_eq!(drain(&mut b).len(), 3);
}
