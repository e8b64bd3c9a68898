//! Shutdown and drain behaviour both pool implementations must share

mod common;

use std::thread;
use std::time::{Duration, Instant};

use slotpool::{PoolError, Poolable};

use common::{eventually, run_on_both};

const LONG_TTL: Duration = Duration::from_secs(600);

#[test]
fn shutdown_deallocates_everything_and_rejects_claims() {
    run_on_both(1, LONG_TTL, |pool, allocator| {
        let object = pool.claim().unwrap();
        object.release();

        let completion = pool.shutdown();
        completion.wait();
        assert!(completion.is_complete());
        assert_eq!(allocator.allocations(), 1);
        assert_eq!(allocator.deallocations(), 1);

        let begun = Instant::now();
        assert!(matches!(pool.claim(), Err(PoolError::ShutDown)));
        assert!(begun.elapsed() < Duration::from_secs(1), "claim after shutdown blocked");

        // Bounded claims fail too; they do not dress the shutdown up as a
        // timeout.
        assert!(matches!(
            pool.claim_for(Duration::from_millis(10)),
            Err(PoolError::ShutDown)
        ));
    });
}

#[test]
fn drain_waits_for_claimed_objects() {
    run_on_both(2, LONG_TTL, |pool, allocator| {
        let held = pool.claim().unwrap();

        let completion = pool.shutdown();
        assert!(!completion.wait_for(Duration::from_millis(50)));

        held.release();
        completion.wait();

        eventually("all objects retired", || {
            allocator.allocations() == allocator.deallocations()
        });
        let ids = allocator.deallocated_ids();
        let mut unique = ids.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), ids.len(), "an object was deallocated twice");
    });
}

#[test]
fn repeated_shutdown_observes_the_same_drain() {
    run_on_both(1, LONG_TTL, |pool, _| {
        let first = pool.shutdown();
        let second = pool.shutdown();

        first.wait();
        assert!(second.is_complete());
    });
}

#[test]
fn pending_claims_fail_when_shutdown_arrives() {
    run_on_both(1, LONG_TTL, |pool, _| {
        let held = pool.claim().unwrap();

        thread::scope(|scope| {
            let blocked = scope.spawn(|| pool.claim());
            thread::sleep(Duration::from_millis(50));

            let completion = pool.shutdown();
            let result = blocked.join().unwrap();
            assert!(matches!(result, Err(PoolError::ShutDown)));

            held.release();
            completion.wait();
        });
    });
}

#[test]
fn claims_racing_the_drain_fail_without_waiting_for_it() {
    run_on_both(1, LONG_TTL, |pool, _| {
        let held = pool.claim().unwrap();

        thread::scope(|scope| {
            let parked: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| pool.claim_for(Duration::from_secs(10))))
                .collect();
            // Let the claimers park on the pool before shutting down, so
            // they contend with the drain for the shutdown signal.
            thread::sleep(Duration::from_millis(50));
            let completion = pool.shutdown();

            // `held` is still out, so the drain cannot finish; pending and
            // fresh claims must fail promptly anyway.
            let begun = Instant::now();
            for claimer in parked {
                let result = claimer.join().unwrap();
                assert!(matches!(result, Err(PoolError::ShutDown)));
            }
            assert!(matches!(pool.claim(), Err(PoolError::ShutDown)));
            assert!(
                begun.elapsed() < Duration::from_secs(5),
                "claims had to wait for the drain"
            );

            held.release();
            completion.wait();
        });
    });
}

#[test]
fn completion_is_idempotent_once_observed() {
    run_on_both(1, LONG_TTL, |pool, _| {
        let completion = pool.shutdown();
        completion.wait();

        // Every later observation is immediate.
        let begun = Instant::now();
        completion.wait();
        assert!(completion.wait_for(Duration::ZERO));
        assert!(begun.elapsed() < Duration::from_millis(100));
    });
}

#[test]
fn shutdown_with_a_cold_pool_completes_without_allocator_traffic() {
    run_on_both(3, LONG_TTL, |pool, allocator| {
        let completion = pool.shutdown();
        completion.wait();
        assert_eq!(allocator.deallocations(), allocator.allocations());
    });
}
