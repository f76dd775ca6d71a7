//! Invalidation Tests
//!
//! Records removed, moved or rewritten while a runner is suspended. Writes
//! run inside scripted yields, i.e. while the runner is registered.

use crate::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use strata_core::{Predicate, SortSpec};

fn sorted_query() -> QueryDescriptor {
    QueryDescriptor::builder(ns())
        .sort(SortSpec::new().asc("n"))
        .build()
        .unwrap()
}

fn grown(id: i64) -> Document {
    doc(json!({"_id": id, "n": id, "note": "z".repeat(400)}))
}

// =============================================================================
// REMOVAL
// =============================================================================

#[test]
fn test_removed_ahead_of_scan_never_returned() {
    let h = Harness::new();
    let locs = h.seed(5);
    let store = h.store.clone();
    let target = locs[3];
    let mut runner = h.runner(
        all_query(),
        on_yield(2, move || {
            store.remove(&ns(), target).unwrap();
        }),
    );

    let out = drain_yielding(&mut runner);
    assert_eq!(ids(&out), vec![json!(0), json!(1), json!(2), json!(4)]);
}

#[test]
fn test_removed_at_scan_position_keeps_scanning() {
    let h = Harness::new();
    let locs = h.seed(4);
    let store = h.store.clone();
    let current = locs[0];
    // Yield 2 happens right after the first record was returned
    let mut runner = h.runner(
        all_query(),
        on_yield(2, move || {
            store.remove(&ns(), current).unwrap();
        }),
    );

    let out = drain_yielding(&mut runner);
    assert_eq!(ids(&out), vec![json!(0), json!(1), json!(2), json!(3)]);
}

#[test]
fn test_removed_buffered_record_never_returned() {
    let h = Harness::new();
    let locs = h.seed(6);
    let store = h.store.clone();
    let target = locs[4];
    let mut runner = h.runner(
        sorted_query(),
        on_yield(2, move || {
            store.remove(&ns(), target).unwrap();
        }),
    );

    let out = drain_yielding(&mut runner);
    assert_eq!(
        ids(&out),
        vec![json!(0), json!(1), json!(2), json!(3), json!(5)]
    );
    assert!(h.registry.metrics().invalidations_delivered >= 1);
}

#[test]
fn test_random_removals_during_yields() {
    let h = Harness::new();
    let locs = h.seed(200);
    let live: Vec<(RecordLocation, i64)> = locs.into_iter().zip(0..).collect();
    let live = Arc::new(Mutex::new(live));
    let removed: Arc<Mutex<HashSet<i64>>> = Arc::new(Mutex::new(HashSet::new()));

    let yielder = {
        let store = h.store.clone();
        let live = live.clone();
        let removed = removed.clone();
        let mut rng = StdRng::seed_from_u64(0x5eed);
        ScriptedYield::new(move || {
            let mut live = live.lock();
            if live.is_empty() || !rng.gen_bool(0.3) {
                return;
            }
            let i = rng.gen_range(0..live.len());
            let (loc, id) = live.swap_remove(i);
            store.remove(&ns(), loc).unwrap();
            removed.lock().insert(id);
        })
    };

    for query in [all_query(), sorted_query()] {
        removed.lock().clear();
        let mut runner = h.runner(query, yielder.clone());
        let mut seen = HashSet::new();
        loop {
            assert!(runner.force_yield());
            match runner.get_next() {
                RunnerState::Advanced(d) => {
                    let id = d.id().and_then(Value::as_i64).unwrap();
                    assert!(!removed.lock().contains(&id), "returned removed record {id}");
                    assert!(seen.insert(id), "returned record {id} twice");
                }
                RunnerState::Exhausted => break,
                other => panic!("unexpected state: {other:?}"),
            }
        }
        // Everything still present at the end was returned
        for (_, id) in live.lock().iter() {
            assert!(seen.contains(id), "lost record {id}");
        }
    }
}

// =============================================================================
// MOVES AND REWRITES
// =============================================================================

#[test]
fn test_moved_buffered_record_returns_new_content() {
    let h = Harness::new();
    let locs = h.seed(4);
    let store = h.store.clone();
    let target = locs[1];
    let mut runner = h.runner(
        sorted_query(),
        on_yield(2, move || {
            assert!(store.update(&ns(), target, grown(1)).unwrap().moved);
        }),
    );

    let out = drain_yielding(&mut runner);
    assert_eq!(ids(&out), vec![json!(0), json!(1), json!(2), json!(3)]);
    assert!(out[1].get("note").is_some(), "moved record returned stale");
}

#[test]
fn test_moved_ahead_of_scan_returned_once() {
    let h = Harness::new();
    let locs = h.seed(4);
    let store = h.store.clone();
    let target = locs[2];
    let mut runner = h.runner(
        all_query(),
        on_yield(2, move || {
            store.update(&ns(), target, grown(2)).unwrap();
        }),
    );

    let out = drain_yielding(&mut runner);
    assert_eq!(ids(&out), vec![json!(0), json!(1), json!(3), json!(2)]);
    assert!(out[3].get("note").is_some());
}

#[test]
fn test_moved_behind_scan_is_seen_again() {
    // No snapshot isolation: a record already returned that moves ahead of
    // the scan position is returned again with its new content.
    let h = Harness::new();
    let locs = h.seed(3);
    let store = h.store.clone();
    let target = locs[0];
    let mut runner = h.runner(
        all_query(),
        on_yield(2, move || {
            store.update(&ns(), target, grown(0)).unwrap();
        }),
    );

    let out = drain_yielding(&mut runner);
    assert_eq!(ids(&out), vec![json!(0), json!(1), json!(2), json!(0)]);
}

#[test]
fn test_in_place_update_visible_after_yield() {
    let h = Harness::new();
    let locs = h.seed(3);
    let store = h.store.clone();
    let target = locs[2];
    let mut runner = h.runner(
        sorted_query(),
        on_yield(2, move || {
            let outcome = store
                .update(&ns(), target, doc(json!({"_id": 2, "n": 2, "v": 1})))
                .unwrap();
            assert!(!outcome.moved);
        }),
    );

    let out = drain_yielding(&mut runner);
    assert_eq!(out[2].get("v"), Some(&json!(1)));
}

#[test]
fn test_filter_applies_to_scanned_content() {
    let h = Harness::new();
    let locs = h.seed(4);
    let store = h.store.clone();
    let target = locs[3];
    let query = QueryDescriptor::builder(ns())
        .filter(Predicate::lt("n", 10))
        .build()
        .unwrap();
    let mut runner = h.runner(
        query,
        on_yield(2, move || {
            store
                .update(&ns(), target, doc(json!({"_id": 3, "n": 99})))
                .unwrap();
        }),
    );

    let out = drain_yielding(&mut runner);
    assert_eq!(ids(&out), vec![json!(0), json!(1), json!(2)]);
}

fn filtered_sorted_query() -> QueryDescriptor {
    QueryDescriptor::builder(ns())
        .filter(Predicate::lt("n", 10))
        .sort(SortSpec::new().asc("n"))
        .build()
        .unwrap()
}

#[test]
fn test_sorted_rewrite_out_of_filter_not_returned() {
    let h = Harness::new();
    let locs = h.seed(4);
    let store = h.store.clone();
    let target = locs[3];
    let mut runner = h.runner(
        filtered_sorted_query(),
        on_yield(2, move || {
            let outcome = store
                .update(&ns(), target, doc(json!({"_id": 3, "n": 99})))
                .unwrap();
            assert!(!outcome.moved);
        }),
    );

    let out = drain_yielding(&mut runner);
    assert_eq!(ids(&out), vec![json!(0), json!(1), json!(2)]);
}

#[test]
fn test_sorted_move_out_of_filter_not_returned() {
    let h = Harness::new();
    let locs = h.seed(4);
    let store = h.store.clone();
    let target = locs[3];
    let mut runner = h.runner(
        filtered_sorted_query(),
        on_yield(2, move || {
            let moved = doc(json!({"_id": 3, "n": 99, "note": "z".repeat(400)}));
            assert!(store.update(&ns(), target, moved).unwrap().moved);
        }),
    );

    let out = drain_yielding(&mut runner);
    assert_eq!(ids(&out), vec![json!(0), json!(1), json!(2)]);
    assert!(out.iter().all(|d| d.get("note").is_none()));
}
