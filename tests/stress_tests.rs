//! Concurrency stress tests.
//!
//! The engine promises that every `upsert`/`delete` is atomic with respect
//! to other mutations (one writer at a time, full descent-mutate-rebalance
//! under the write lock) and that readers never observe a torn structure.
//! These tests hammer that contract with:
//!
//! - Many writer threads on distinct key ranges (no lost updates)
//! - All writers on the same keys (last write wins, no duplicates)
//! - Readers and a dumper running against live writers
//! - Delete storms draining a prefilled tree
//!
//! Run:
//! ```bash
//! cargo test --test stress_tests --release
//! ```

#![expect(clippy::unwrap_used, reason = "fail fast in tests")]

use bytetree::BTree;
use rand::prelude::*;
use std::sync::Arc;
use std::thread;

const THREADS: usize = 8;
const KEYS_PER_THREAD: usize = 500;

/// Distinct key for (thread, index): the thread id is part of the prefix.
fn thread_key(thread: usize, i: usize) -> Vec<u8> {
    format!("t{thread:02}-{i:06}").into_bytes()
}

/// Verify every expected key is present with the expected value; panic with
/// a sample of the missing ones otherwise.
fn verify_all_keys<F, G>(tree: &BTree, key_of: F, value_of: G, count: usize, test: &str)
where
    F: Fn(usize) -> Vec<u8>,
    G: Fn(usize) -> Vec<u8>,
{
    let mut missing = Vec::new();
    for i in 0..count {
        let key = key_of(i);
        match tree.search(&key) {
            Some(v) if v == value_of(i) => {}
            other => missing.push((i, other)),
        }
    }
    assert!(
        missing.is_empty(),
        "{test}: {} keys missing/corrupted (first 10: {:?}), len={}",
        missing.len(),
        &missing[..missing.len().min(10)],
        tree.len()
    );
}

// =============================================================================
// Distinct-key writers
// =============================================================================

#[test]
fn concurrent_distinct_upserts_lose_nothing() {
    let tree = Arc::new(BTree::new());

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let tree = Arc::clone(&tree);
            thread::spawn(move || {
                for i in 0..KEYS_PER_THREAD {
                    let key = thread_key(t, i);
                    tree.upsert(&key, &key);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(tree.len(), THREADS * KEYS_PER_THREAD);
    tree.assert_invariants();
    for t in 0..THREADS {
        verify_all_keys(
            &tree,
            |i| thread_key(t, i),
            |i| thread_key(t, i),
            KEYS_PER_THREAD,
            "concurrent_distinct_upserts",
        );
    }
}

#[test]
fn concurrent_interleaved_ranges() {
    // Threads write interleaved (not contiguous) slices of one keyspace, so
    // concurrent splits land all over the tree instead of at the right edge.
    let total = THREADS * KEYS_PER_THREAD;
    let tree = Arc::new(BTree::new());

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let tree = Arc::clone(&tree);
            thread::spawn(move || {
                let mut indices: Vec<usize> = (t..total).step_by(THREADS).collect();
                indices.shuffle(&mut rand::rng());
                for i in indices {
                    let key = format!("{i:08}").into_bytes();
                    tree.upsert(&key, &i.to_be_bytes());
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(tree.len(), total);
    tree.assert_invariants();
    verify_all_keys(
        &tree,
        |i| format!("{i:08}").into_bytes(),
        |i| i.to_be_bytes().to_vec(),
        total,
        "concurrent_interleaved_ranges",
    );
}

// =============================================================================
// Contended overwrites
// =============================================================================

#[test]
fn contended_overwrites_keep_one_value_per_key() {
    const HOT_KEYS: usize = 32;
    const ROUNDS: usize = 200;
    let tree = Arc::new(BTree::new());

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let tree = Arc::clone(&tree);
            thread::spawn(move || {
                for round in 0..ROUNDS {
                    for k in 0..HOT_KEYS {
                        let key = format!("hot-{k:03}").into_bytes();
                        let val = format!("t{t}-r{round}").into_bytes();
                        tree.upsert(&key, &val);
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    // No duplicates, no lost keys; each value is one of the written ones.
    assert_eq!(tree.len(), HOT_KEYS);
    tree.assert_invariants();
    for k in 0..HOT_KEYS {
        let key = format!("hot-{k:03}").into_bytes();
        let val = tree.search(&key).unwrap();
        let text = String::from_utf8(val).unwrap();
        assert!(
            text.starts_with('t') && text.contains("-r"),
            "unexpected value {text:?} for key {k}"
        );
    }
}

// =============================================================================
// Readers against live writers
// =============================================================================

#[test]
fn readers_never_observe_a_torn_tree() {
    const PREFILL: usize = 2_000;
    let tree = Arc::new(BTree::new());
    for i in 0..PREFILL {
        tree.upsert(format!("stable-{i:06}").as_bytes(), b"fixed");
    }

    let mut handles = Vec::new();

    // Writers churn a disjoint "churn-" range with inserts and deletes.
    for t in 0..4 {
        let tree = Arc::clone(&tree);
        handles.push(thread::spawn(move || {
            for round in 0..50 {
                for i in 0..200 {
                    let key = format!("churn-t{t}-{i:04}").into_bytes();
                    tree.upsert(&key, &[round]);
                }
                for i in 0..200 {
                    let key = format!("churn-t{t}-{i:04}").into_bytes();
                    tree.delete(&key);
                }
            }
        }));
    }

    // Readers check the stable range and walk the structure dump while the
    // writers churn. Every stable key must always be visible.
    for _ in 0..4 {
        let tree = Arc::clone(&tree);
        handles.push(thread::spawn(move || {
            let mut rng = rand::rng();
            for _ in 0..2_000 {
                let i = rng.random_range(0..PREFILL);
                let key = format!("stable-{i:06}").into_bytes();
                assert_eq!(tree.search(&key).as_deref(), Some(b"fixed".as_slice()));
            }
            // The dump holds the read lock: it must always see a coherent
            // snapshot, never a mid-rebalance structure.
            let dump = tree.dump_structure();
            assert!(dump.starts_with('['), "dump lost its root line: {dump:?}");
        }));
    }

    for h in handles {
        h.join().unwrap();
    }

    tree.assert_invariants();
    assert_eq!(tree.len(), PREFILL);
}

// =============================================================================
// Delete storm
// =============================================================================

#[test]
fn concurrent_deletes_drain_disjoint_ranges() {
    let total = THREADS * KEYS_PER_THREAD;
    let tree = Arc::new(BTree::new());
    for t in 0..THREADS {
        for i in 0..KEYS_PER_THREAD {
            let key = thread_key(t, i);
            tree.upsert(&key, &key);
        }
    }
    assert_eq!(tree.len(), total);

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let tree = Arc::clone(&tree);
            thread::spawn(move || {
                let mut order: Vec<usize> = (0..KEYS_PER_THREAD).collect();
                order.shuffle(&mut rand::rng());
                for i in order {
                    tree.delete(&thread_key(t, i));
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert!(tree.is_empty(), "len={} after full drain", tree.len());
    tree.assert_invariants();
}

// =============================================================================
// Mixed workload
// =============================================================================

#[test]
fn mixed_random_workload_stays_consistent() {
    let tree = Arc::new(BTree::new());

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let tree = Arc::clone(&tree);
            thread::spawn(move || {
                let mut rng = rand::rng();
                for i in 0..2_000usize {
                    let key = thread_key(t, rng.random_range(0..300));
                    match rng.random_range(0..3) {
                        0 => tree.upsert(&key, &i.to_be_bytes()),
                        1 => tree.delete(&key),
                        _ => {
                            let _ = tree.search(&key);
                        }
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    tree.assert_invariants();
}
