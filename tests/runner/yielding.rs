//! Yield Protocol Tests
//!
//! Registration bracketing, round-trips without writers, and the real
//! access token handing control to writers.

use crate::*;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use strata_core::{Predicate, SortSpec};
use strata_query::{run_to_completion, Error, QueryEngine, YieldPolicy};

// =============================================================================
// ROUND TRIP
// =============================================================================

#[test]
fn test_yield_without_writes_is_invisible() {
    let h = Harness::new();
    h.seed(40);
    let query = QueryDescriptor::builder(ns())
        .filter(Predicate::gte("n", 5))
        .sort(SortSpec::new().desc("n"))
        .skip(2)
        .limit(20)
        .build()
        .unwrap();

    let expected = ids(&drain(&mut h.runner(query.clone(), ScriptedYield::idle())));
    let yielder = ScriptedYield::idle();
    let mut runner = h.runner(query, yielder.clone());
    let actual = ids(&drain_yielding(&mut runner));

    assert_eq!(actual, expected);
    assert_eq!(actual.len(), 20);
    assert!(yielder.yields() > 20);
}

#[test]
fn test_save_restore_pairs_reach_executor() {
    let h = Harness::new();
    let (mut runner, calls) = h.counting_runner(2, ScriptedYield::idle());
    assert!(runner.force_yield());
    assert!(runner.force_yield());
    assert_eq!(calls.save_state.load(Ordering::SeqCst), 2);
    assert_eq!(calls.restore_state.load(Ordering::SeqCst), 2);
}

// =============================================================================
// REGISTRATION
// =============================================================================

#[test]
fn test_registered_exactly_while_suspended() {
    let h = Harness::new();
    let registry = h.registry.clone();
    let observed: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));
    let yielder = {
        let observed = observed.clone();
        ScriptedYield::new(move || observed.lock().push(registry.len()))
    };
    let (mut runner, _) = h.counting_runner(3, yielder);

    assert!(!h.registry.is_registered(runner.id()));
    for _ in 0..3 {
        assert!(runner.force_yield());
        assert!(!h.registry.is_registered(runner.id()));
    }
    assert_eq!(observed.lock().as_slice(), &[1, 1, 1]);
}

#[test]
fn test_invalidation_outside_yield_is_not_delivered() {
    let h = Harness::new();
    let locs = h.seed(3);
    let (mut runner, calls) = h.counting_runner(3, ScriptedYield::idle());
    assert!(runner.get_next().is_advanced());

    h.store.remove(&ns(), locs[0]).unwrap();
    assert_eq!(calls.invalidate.load(Ordering::SeqCst), 0);
}

// =============================================================================
// REAL ACCESS TOKEN
// =============================================================================

#[test]
fn test_writer_waits_for_yield() {
    init_tracing();
    let engine = Arc::new(QueryEngine::new().unwrap());
    engine.insert(&ns(), doc(json!({"_id": 0}))).unwrap();

    let access = engine.begin_read();
    let mut runner = engine.runner(all_query(), &access).unwrap();

    let (tx, rx) = mpsc::channel();
    let writer = {
        let engine = engine.clone();
        thread::spawn(move || {
            engine.insert(&ns(), doc(json!({"_id": 1}))).unwrap();
            tx.send(()).unwrap();
        })
    };

    assert!(rx.recv_timeout(Duration::from_millis(50)).is_err(), "writer ran under a read");
    while engine.token().waiting_writers() == 0 {
        thread::yield_now();
    }

    assert!(runner.force_yield());
    rx.recv_timeout(Duration::from_secs(5)).unwrap();
    writer.join().unwrap();
    assert!(access.is_held());

    // The scan had not started, so it sees the record inserted during the yield
    assert_eq!(drain(&mut runner).len(), 2);
}

#[test]
fn test_kill_during_yield() {
    init_tracing();
    let engine = QueryEngine::new().unwrap();
    for i in 0..10 {
        engine.insert(&ns(), doc(json!({"_id": i}))).unwrap();
    }

    let access = engine.begin_read();
    let mut runner = engine.runner(all_query(), &access).unwrap();
    let id = runner.id();

    let reader = thread::spawn(move || {
        let _access = access;
        while runner.force_yield() {}
        matches!(runner.get_next(), RunnerState::Dead)
    });

    {
        // Granted only once the reader has released inside static_yield; it
        // cannot deregister until this guard is dropped.
        let _guard = engine.token().lock_exclusive();
        assert!(engine.registry().is_registered(id));
        assert!(engine.registry().kill(id));
    }

    assert!(reader.join().unwrap(), "killed runner must report Dead");
    assert!(engine.registry().is_empty());
    assert_eq!(engine.token().readers(), 0);
}

#[test]
fn test_drop_collection_kills_yielding_runner() {
    init_tracing();
    let engine = Arc::new(QueryEngine::new().unwrap());
    for i in 0..10 {
        engine.insert(&ns(), doc(json!({"_id": i}))).unwrap();
    }

    let access = engine.begin_read();
    let mut runner = engine.runner(all_query(), &access).unwrap();
    assert!(runner.get_next().is_advanced());

    let dropper = {
        let engine = engine.clone();
        thread::spawn(move || engine.drop_collection(&ns()))
    };
    while engine.token().waiting_writers() == 0 {
        thread::yield_now();
    }

    assert!(!runner.force_yield());
    assert!(dropper.join().unwrap());
    assert!(matches!(runner.get_next(), RunnerState::Dead));
    assert_eq!(engine.metrics().kills_delivered, 1);
}

// =============================================================================
// YIELD POLICY
// =============================================================================

#[test]
fn test_run_to_completion_yields_per_policy() {
    let h = Harness::new();
    h.seed(25);
    let yielder = ScriptedYield::idle();
    let mut runner = h.runner(all_query(), yielder.clone());
    let config = strata_query::RunnerConfig::default()
        .with_yield_iterations(5)
        .with_yield_period_ms(60_000);
    let mut policy = YieldPolicy::new(&config);

    let out = run_to_completion(&mut runner, &mut policy).unwrap();
    assert_eq!(out.len(), 25);
    // 26 get_next calls, a yield before every fifth
    assert_eq!(yielder.yields(), 5);
}

#[test]
fn test_run_to_completion_reports_kill() {
    let h = Harness::new();
    h.seed(10);
    let yielder = ScriptedYield::idle();
    let mut runner = h.runner(all_query(), yielder);
    runner.kill();
    let err = run_to_completion(&mut runner, &mut YieldPolicy::default()).unwrap_err();
    assert!(matches!(err, Error::Killed(id) if id == runner.id()));
}

#[test]
fn test_engine_find_yields_under_contention() {
    init_tracing();
    let engine = Arc::new(
        QueryEngine::builder()
            .yield_iterations(2)
            .max_yield_micros(200)
            .build()
            .unwrap(),
    );
    for i in 0..200 {
        engine.insert(&ns(), doc(json!({"_id": i, "n": i}))).unwrap();
    }

    let writer = {
        let engine = engine.clone();
        thread::spawn(move || {
            for i in 200..260 {
                engine.insert(&ns(), doc(json!({"_id": i, "n": i}))).unwrap();
            }
        })
    };
    let query = QueryDescriptor::builder(ns())
        .sort(SortSpec::new().asc("n"))
        .build()
        .unwrap();
    let out = engine.find(query).unwrap();
    writer.join().unwrap();

    assert!(out.len() >= 200 && out.len() <= 260);
    let ns_out: Vec<i64> = out.iter().map(|d| d.get("n").unwrap().as_i64().unwrap()).collect();
    assert!(ns_out.windows(2).all(|w| w[0] < w[1]));
}
