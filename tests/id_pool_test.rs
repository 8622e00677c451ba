//! Integration tests for the recyclable identifier pool
//!
//! These tests validate real-world behaviour including:
//! - Uniqueness and range guarantees across acquire/release cycles
//! - Lazy batch minting and pool growth
//! - FIFO reissue of recycled identifiers
//! - Exhaustion reporting and recovery
//! - Sizing validation fallbacks
//! - Concurrent churn from many threads

use chronopool::core::{IdPool, SchedulerError, DEFAULT_INCREMENT, DEFAULT_MAX_ID};
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

// ============================================================================
// TESTS
// ============================================================================

/// Test that issued ids are unique, in range, and fully accounted for
#[test]
fn test_ids_unique_in_range_and_accounted() {
    println!("\n=== test_ids_unique_in_range_and_accounted ===");

    let pool = IdPool::new("accounting", 10, 100);
    let mut seen = HashSet::new();

    for _ in 0..25 {
        let id = pool.acquire().expect("Failed to acquire id");
        assert!((1..=100).contains(&id), "id {id} out of range");
        assert!(seen.insert(id), "id {id} issued twice");
    }

    println!(
        "Issued {} ids, pool_size={}, in_use={}",
        seen.len(),
        pool.pool_size(),
        pool.in_use_count()
    );
    assert_eq!(pool.in_use_count(), 25);
    // 25 acquires across batches of 10 mint 30 ids total
    assert_eq!(pool.pool_size(), 5);

    println!("=== test_ids_unique_in_range_and_accounted PASSED ===\n");
}

/// Test that the pool mints nothing up front and grows in increments
#[test]
fn test_pool_grows_lazily_in_increments() {
    println!("\n=== test_pool_grows_lazily_in_increments ===");

    let pool = IdPool::new("lazy-growth", 10, 100);
    assert_eq!(pool.pool_size(), 0);
    assert_eq!(pool.in_use_count(), 0);

    for _ in 0..10 {
        pool.acquire().expect("Failed to acquire id");
    }
    assert_eq!(pool.pool_size(), 0, "first batch should be fully issued");

    let eleventh = pool.acquire().expect("Failed to acquire id");
    println!("Eleventh acquire triggered a second batch, got {eleventh}");
    assert_eq!(pool.pool_size(), 9);
    assert_eq!(pool.in_use_count(), 11);

    println!("=== test_pool_grows_lazily_in_increments PASSED ===\n");
}

/// Test that a released id goes back to the pool and gets reissued
#[test]
fn test_release_restores_and_reissues() {
    println!("\n=== test_release_restores_and_reissues ===");

    let pool = IdPool::new("round-trip", 3, 30);
    let first = pool.acquire().expect("Failed to acquire id");
    let second = pool.acquire().expect("Failed to acquire id");
    let third = pool.acquire().expect("Failed to acquire id");
    assert_eq!((first, second, third), (1, 2, 3));
    assert_eq!(pool.pool_size(), 0);

    pool.release(second);
    assert_eq!(pool.pool_size(), 1);
    assert_eq!(pool.in_use_count(), 2);

    let reissued = pool.acquire().expect("Failed to acquire id");
    println!("Released {second}, got {reissued} back");
    assert_eq!(reissued, second);

    println!("=== test_release_restores_and_reissues PASSED ===\n");
}

/// Test that releasing the same id twice counts once
#[test]
fn test_double_release_counts_once() {
    println!("\n=== test_double_release_counts_once ===");

    let pool = IdPool::new("double-release", 5, 20);
    let id = pool.acquire().expect("Failed to acquire id");

    pool.release(id);
    pool.release(id);

    assert_eq!(pool.pool_size(), 5);
    assert_eq!(pool.in_use_count(), 0);

    println!("=== test_double_release_counts_once PASSED ===\n");
}

/// Test that releasing ids the pool never issued changes nothing
#[test]
fn test_release_of_unknown_id_is_no_op() {
    println!("\n=== test_release_of_unknown_id_is_no_op ===");

    let pool = IdPool::new("unknown-release", 5, 20);
    pool.release(1);
    pool.release(9999);
    assert_eq!(pool.pool_size(), 0);
    assert_eq!(pool.in_use_count(), 0);

    let id = pool.acquire().expect("Failed to acquire id");
    pool.release(id);
    pool.release(id + 1);
    assert_eq!(pool.pool_size(), 5);
    assert_eq!(pool.in_use_count(), 0);

    println!("=== test_release_of_unknown_id_is_no_op PASSED ===\n");
}

/// Test exhaustion once every id is issued, and recovery after a release
#[test]
fn test_exhaustion_and_recovery() {
    println!("\n=== test_exhaustion_and_recovery ===");

    let pool = IdPool::new("exhaustion", 2, 10);
    for _ in 0..10 {
        pool.acquire().expect("Failed to acquire id");
    }
    assert_eq!(pool.in_use_count(), 10);
    assert_eq!(pool.pool_size(), 0);

    let err = pool.acquire().expect_err("Expected exhaustion");
    println!("Saturated pool refused: {err}");
    match err {
        SchedulerError::IdsExhausted {
            in_use,
            available,
            max_id,
            ..
        } => {
            assert_eq!(in_use, 10);
            assert_eq!(available, 0);
            assert_eq!(max_id, 10);
        }
        other => panic!("unexpected error: {other}"),
    }

    pool.release(7);
    let reclaimed = pool.acquire().expect("Failed to acquire after release");
    assert_eq!(reclaimed, 7);
    assert!(pool.acquire().is_err(), "pool should be saturated again");

    println!("=== test_exhaustion_and_recovery PASSED ===\n");
}

/// Test mint-before-recycle ordering when fresh and recycled ids coexist
#[test]
fn test_mint_then_recycle_ordering() {
    println!("\n=== test_mint_then_recycle_ordering ===");

    let pool = IdPool::new("ordering", 5, 10);
    for expected in 1..=9 {
        let id = pool.acquire().expect("Failed to acquire id");
        assert_eq!(id, expected);
    }

    pool.release(5);
    // 10 was minted before 5 was recycled, so it is reissued first
    assert_eq!(pool.acquire().expect("Failed to acquire id"), 10);
    assert_eq!(pool.acquire().expect("Failed to acquire id"), 5);
    assert!(pool.acquire().is_err());

    println!("=== test_mint_then_recycle_ordering PASSED ===\n");
}

/// Test that rejected sizing pairs fall back to the defaults
#[test]
fn test_sizing_fallbacks() {
    println!("\n=== test_sizing_fallbacks ===");

    for (increment, max_id) in [(0, 0), (0, 50), (25, 0), (30, 50)] {
        let pool = IdPool::new("fallbacks", increment, max_id);
        println!(
            "sizing ({increment}, {max_id}) -> ({}, {})",
            pool.increment(),
            pool.max_id()
        );
        assert_eq!(pool.increment(), DEFAULT_INCREMENT);
        assert_eq!(pool.max_id(), DEFAULT_MAX_ID);
    }

    // increment * 2 == max_id is the largest accepted increment
    let pool = IdPool::new("fallbacks", 25, 50);
    assert_eq!(pool.increment(), 25);
    assert_eq!(pool.max_id(), 50);

    println!("=== test_sizing_fallbacks PASSED ===\n");
}

/// Test uniqueness under concurrent acquire/release churn
#[test]
fn test_concurrent_churn_keeps_ids_unique() {
    println!("\n=== test_concurrent_churn_keeps_ids_unique ===");
    chronopool::util::init_tracing();

    let pool = Arc::new(IdPool::new("churn", 50, 1000));
    let mut workers = Vec::new();

    for worker in 0..8 {
        let pool = Arc::clone(&pool);
        workers.push(thread::spawn(move || {
            let mut rng = rand::rng();
            let mut held = Vec::new();
            for _ in 0..100 {
                match pool.acquire() {
                    Ok(id) => {
                        if rng.random_range(0..3) == 0 {
                            pool.release(id);
                        } else {
                            held.push(id);
                        }
                    }
                    Err(err) => panic!("worker {worker} starved: {err}"),
                }
            }
            held
        }));
    }

    let mut all_held = Vec::new();
    for worker in workers {
        all_held.extend(worker.join().expect("Worker panicked"));
    }

    let unique: HashSet<_> = all_held.iter().copied().collect();
    println!(
        "{} ids held across 8 workers, in_use={}, pool_size={}",
        all_held.len(),
        pool.in_use_count(),
        pool.pool_size()
    );
    assert_eq!(unique.len(), all_held.len(), "duplicate id issued");
    assert_eq!(pool.in_use_count(), all_held.len());
    assert!(pool.in_use_count() + pool.pool_size() <= 1000);

    println!("=== test_concurrent_churn_keeps_ids_unique PASSED ===\n");
}

/// Test the exhaustion error rendering used in logs
#[test]
fn test_exhausted_error_display() {
    println!("\n=== test_exhausted_error_display ===");

    let pool = IdPool::new("renderer", 2, 4);
    while pool.acquire().is_ok() {}
    let message = pool.acquire().expect_err("Expected exhaustion").to_string();
    println!("{message}");
    assert!(message.contains("no ids available in `renderer`"));
    assert!(message.contains("4 in use"));
    assert!(message.contains("max 4"));

    println!("=== test_exhausted_error_display PASSED ===\n");
}
