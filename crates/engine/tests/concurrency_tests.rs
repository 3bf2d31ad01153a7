//! Concurrency Tests
//!
//! Many threads insert, search and delete against one index:
//! - Degree caps and entry-point invariants hold afterwards
//! - The WAL written under contention replays to the same graph
//! - Readers never observe unsorted or tombstoned results

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;
use vectory_core::{HnswConfig, InMemoryVectorStore, VectorId};
use vectory_durability::DurabilityMode;
use vectory_engine::HnswIndex;

const DIM: usize = 8;

fn vector_for(id: VectorId) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(id);
    (0..DIM).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

fn open(dir: &TempDir, config: &HnswConfig, store: &InMemoryVectorStore) -> Arc<HnswIndex> {
    Arc::new(
        HnswIndex::open(dir.path(), config.clone(), DurabilityMode::default(), store).unwrap(),
    )
}

/// Each thread inserts its own disjoint id range
fn concurrent_inserts(index: &Arc<HnswIndex>, num_threads: usize, per_thread: usize) {
    let barrier = Arc::new(Barrier::new(num_threads));

    let handles: Vec<_> = (0..num_threads)
        .map(|t| {
            let index = Arc::clone(index);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..per_thread {
                    let id = (t * per_thread + i) as VectorId;
                    index.insert(&vector_for(id), id).unwrap();
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
}

#[test]
fn test_concurrent_inserts_keep_graph_invariants() {
    let temp_dir = TempDir::new().unwrap();
    let config = HnswConfig::for_testing(DIM).with_m(4).with_m_max(4);
    let store = InMemoryVectorStore::new();
    let index = open(&temp_dir, &config, &store);

    concurrent_inserts(&index, 8, 100);
    assert_eq!(index.len(), 800);

    let ep = index.entry_point().unwrap();
    assert_eq!(index.level_of(ep), Some(index.max_layer()));

    for id in 0..800u64 {
        let level = index.level_of(id).unwrap();
        for layer in 0..=level {
            let neighbors = index.connections(id, layer).unwrap();
            assert!(neighbors.len() <= config.max_connections(layer));
            assert!(!neighbors.contains(&id));
            // Neighbors at a layer must live on that layer
            for n in neighbors {
                assert!(index.level_of(n).unwrap() >= layer);
            }
        }
    }
}

#[test]
fn test_concurrent_inserts_are_searchable() {
    let temp_dir = TempDir::new().unwrap();
    let config = HnswConfig::for_testing(DIM).with_ef(100);
    let store = InMemoryVectorStore::new();
    let index = open(&temp_dir, &config, &store);

    concurrent_inserts(&index, 4, 150);

    let mut found = 0;
    for id in (0..600u64).step_by(10) {
        let results = index.search(&vector_for(id), 10).unwrap();
        if results.iter().any(|r| r.id == id) {
            found += 1;
        }
    }
    assert!(found >= 54, "only {} of 60 vertices found themselves", found);
}

#[test]
fn test_log_written_under_contention_replays_exactly() {
    let temp_dir = TempDir::new().unwrap();
    let config = HnswConfig::for_testing(DIM).with_m(4).with_m_max(4);
    let store = InMemoryVectorStore::new();
    for id in 0..400u64 {
        store.put(id, vector_for(id));
    }

    let before = {
        let index = open(&temp_dir, &config, &store);
        concurrent_inserts(&index, 8, 50);
        index.flush().unwrap();
        index.snapshot()
    };

    let index = open(&temp_dir, &config, &store);
    assert_eq!(index.snapshot(), before);
}

#[test]
fn test_readers_run_alongside_writers() {
    let temp_dir = TempDir::new().unwrap();
    let config = HnswConfig::for_testing(DIM);
    let store = InMemoryVectorStore::new();
    let index = open(&temp_dir, &config, &store);

    for id in 0..50u64 {
        index.insert(&vector_for(id), id).unwrap();
    }
    for id in 0..10u64 {
        index.delete(id).unwrap();
    }

    let num_threads = 6;
    let barrier = Arc::new(Barrier::new(num_threads));
    let handles: Vec<_> = (0..num_threads)
        .map(|t| {
            let index = Arc::clone(&index);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..100u64 {
                    if t % 2 == 0 {
                        let id = 1000 + t as u64 * 100 + i;
                        index.insert(&vector_for(id), id).unwrap();
                    } else {
                        let results = index.search(&vector_for(i), 5).unwrap();
                        assert!(results.len() <= 5);
                        for pair in results.windows(2) {
                            assert!(pair[0].distance <= pair[1].distance);
                        }
                        assert!(results.iter().all(|r| r.id >= 10));
                    }
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(index.len(), 350);
}

#[test]
fn test_racing_duplicate_ids_admit_one_winner() {
    let temp_dir = TempDir::new().unwrap();
    let config = HnswConfig::for_testing(DIM);
    let store = InMemoryVectorStore::new();
    let index = open(&temp_dir, &config, &store);

    let num_threads = 8;
    let barrier = Arc::new(Barrier::new(num_threads));
    let handles: Vec<_> = (0..num_threads)
        .map(|_| {
            let index = Arc::clone(&index);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                index.insert(&vector_for(42), 42).is_ok()
            })
        })
        .collect();

    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();
    assert_eq!(winners, 1);
    assert_eq!(index.len(), 1);
    assert_eq!(index.entry_point(), Some(42));
}
