//! Shared fixtures for the pool contract suites
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use slotpool::{
    AllocError, Allocator, ArrayPool, Config, Pool, Poolable, QueuePool, SlotHandle,
};

/// Pooled object used by every contract test. Each allocation gets a fresh
/// id so tests can follow an object through its life.
#[derive(Debug)]
pub struct GenericPoolable {
    pub id: u64,
    slot: SlotHandle<GenericPoolable>,
}

impl Poolable for GenericPoolable {
    fn slot(&self) -> &SlotHandle<Self> {
        &self.slot
    }
}

#[derive(Default)]
struct CountingState {
    allocations: AtomicUsize,
    deallocations: AtomicUsize,
    next_id: AtomicU64,
    live: AtomicUsize,
    live_peak: AtomicUsize,
    deallocated_ids: Mutex<Vec<u64>>,
    failures_left: AtomicUsize,
    allocation_delay_ms: AtomicU64,
    fail_deallocations: AtomicBool,
}

/// Allocator that counts everything it does; clones share their counters.
#[derive(Clone, Default)]
pub struct CountingAllocator {
    state: Arc<CountingState>,
}

impl CountingAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocations(&self) -> usize {
        self.state.allocations.load(Ordering::SeqCst)
    }

    pub fn deallocations(&self) -> usize {
        self.state.deallocations.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously live objects ever observed.
    pub fn live_peak(&self) -> usize {
        self.state.live_peak.load(Ordering::SeqCst)
    }

    pub fn deallocated_ids(&self) -> Vec<u64> {
        self.state.deallocated_ids.lock().unwrap().clone()
    }

    /// Make the next `n` allocations fail.
    pub fn fail_next_allocations(&self, n: usize) {
        self.state.failures_left.store(n, Ordering::SeqCst);
    }

    /// Make every allocation sleep for `delay` first.
    pub fn delay_allocations(&self, delay: Duration) {
        self.state
            .allocation_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Make every deallocation return an error.
    pub fn fail_deallocations(&self, fail: bool) {
        self.state.fail_deallocations.store(fail, Ordering::SeqCst);
    }
}

impl Allocator for CountingAllocator {
    type Object = GenericPoolable;

    fn allocate(&self, slot: SlotHandle<GenericPoolable>) -> Result<GenericPoolable, AllocError> {
        let delay = self.state.allocation_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            thread::sleep(Duration::from_millis(delay));
        }
        let failed = self
            .state
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| {
                left.checked_sub(1)
            })
            .is_ok();
        if failed {
            return Err("allocation failed on purpose".into());
        }
        self.state.allocations.fetch_add(1, Ordering::SeqCst);
        let live = self.state.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.live_peak.fetch_max(live, Ordering::SeqCst);
        Ok(GenericPoolable {
            id: self.state.next_id.fetch_add(1, Ordering::SeqCst),
            slot,
        })
    }

    fn deallocate(&self, obj: GenericPoolable) -> Result<(), AllocError> {
        self.state.deallocations.fetch_add(1, Ordering::SeqCst);
        self.state.live.fetch_sub(1, Ordering::SeqCst);
        self.state.deallocated_ids.lock().unwrap().push(obj.id);
        if self.state.fail_deallocations.load(Ordering::SeqCst) {
            return Err("deallocation failed on purpose".into());
        }
        Ok(())
    }
}

/// Run `test` once against each pool implementation, each with a fresh
/// allocator. The contract suites assert identical behaviour from both.
pub fn run_on_both<F>(size: usize, ttl: Duration, test: F)
where
    F: Fn(&dyn Pool<Object = GenericPoolable>, &CountingAllocator),
{
    let allocator = CountingAllocator::new();
    let pool = ArrayPool::new(config(size, ttl, allocator.clone())).unwrap();
    test(&pool, &allocator);
    drop(pool);

    let allocator = CountingAllocator::new();
    let pool = QueuePool::new(config(size, ttl, allocator.clone())).unwrap();
    test(&pool, &allocator);
}

fn config(size: usize, ttl: Duration, allocator: CountingAllocator) -> Config<CountingAllocator> {
    Config::new()
        .with_allocator(allocator)
        .with_size(size)
        .with_ttl(ttl)
}

/// Poll `check` until it holds or five seconds pass.
pub fn eventually(what: &str, check: impl Fn() -> bool) {
    let begun = Instant::now();
    while !check() {
        assert!(
            begun.elapsed() < Duration::from_secs(5),
            "timed out waiting for: {what}"
        );
        thread::sleep(Duration::from_millis(5));
    }
}
