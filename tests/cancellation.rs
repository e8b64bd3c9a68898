//! CancelToken behaviour both pool implementations must share

mod common;

use std::thread;
use std::time::{Duration, Instant};

use slotpool::{CancelToken, PoolError, Poolable};

use common::run_on_both;

const LONG_TTL: Duration = Duration::from_secs(600);

#[test]
fn cancelled_token_fails_a_claim_without_waiting() {
    run_on_both(1, LONG_TTL, |pool, allocator| {
        let token = CancelToken::new();
        token.cancel();

        let begun = Instant::now();
        assert!(matches!(
            pool.claim_cancellable(&token),
            Err(PoolError::Cancelled)
        ));
        assert!(matches!(
            pool.claim_for_cancellable(Duration::from_secs(5), &token),
            Err(PoolError::Cancelled)
        ));
        assert!(begun.elapsed() < Duration::from_secs(1));
        // Cancellation is checked before any slot work happens.
        assert_eq!(allocator.deallocations(), 0);
    });
}

#[test]
fn cancel_wakes_a_blocked_claim() {
    run_on_both(1, LONG_TTL, |pool, _| {
        let held = pool.claim().unwrap();
        let token = CancelToken::new();

        thread::scope(|scope| {
            let blocked = {
                let token = token.clone();
                scope.spawn(move || pool.claim_cancellable(&token))
            };
            thread::sleep(Duration::from_millis(50));

            let begun = Instant::now();
            token.cancel();
            let result = blocked.join().unwrap();
            assert!(matches!(result, Err(PoolError::Cancelled)));
            assert!(begun.elapsed() < Duration::from_secs(3), "cancel did not wake the claim");
        });

        held.release();
    });
}

#[test]
fn cancel_beats_a_long_claim_timeout() {
    run_on_both(1, LONG_TTL, |pool, _| {
        let held = pool.claim().unwrap();
        let token = CancelToken::new();

        thread::scope(|scope| {
            let blocked = {
                let token = token.clone();
                scope.spawn(move || pool.claim_for_cancellable(Duration::from_secs(30), &token))
            };
            thread::sleep(Duration::from_millis(50));

            let begun = Instant::now();
            token.cancel();
            let result = blocked.join().unwrap();
            assert!(matches!(result, Err(PoolError::Cancelled)));
            assert!(begun.elapsed() < Duration::from_secs(3), "cancel did not cut the timeout short");
        });

        held.release();
    });
}

#[test]
fn an_untripped_token_changes_nothing() {
    run_on_both(1, LONG_TTL, |pool, _| {
        let token = CancelToken::new();

        let object = pool.claim_cancellable(&token).unwrap();
        let contended = pool
            .claim_for_cancellable(Duration::from_millis(100), &token)
            .unwrap();
        assert!(contended.is_none());

        object.release();
    });
}

#[test]
fn cancel_wakes_a_blocked_completion_wait() {
    run_on_both(1, LONG_TTL, |pool, _| {
        let held = pool.claim().unwrap();
        let completion = pool.shutdown();
        let token = CancelToken::new();

        thread::scope(|scope| {
            let blocked = {
                let token = token.clone();
                let completion = completion.clone();
                scope.spawn(move || completion.wait_cancellable(&token))
            };
            thread::sleep(Duration::from_millis(50));

            token.cancel();
            let result = blocked.join().unwrap();
            assert!(matches!(result, Err(PoolError::Cancelled)));
        });

        held.release();
        completion.wait();
    });
}

#[test]
fn bounded_completion_wait_honours_cancellation() {
    run_on_both(1, LONG_TTL, |pool, _| {
        let held = pool.claim().unwrap();
        let completion = pool.shutdown();

        let token = CancelToken::new();
        token.cancel();
        assert!(matches!(
            completion.wait_for_cancellable(Duration::from_secs(30), &token),
            Err(PoolError::Cancelled)
        ));

        held.release();
        completion.wait();
    });
}
