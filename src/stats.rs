//! Pool counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time snapshot of a pool's activity.
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    /// Configured pool size.
    pub capacity: usize,
    /// Objects currently claimed.
    pub claimed: usize,
    /// Objects currently allocated (claimed or idle).
    pub live: usize,
    /// Successful claims.
    pub claims: u64,
    /// Releases accepted back into the pool.
    pub releases: u64,
    /// Objects handed out by the allocator.
    pub allocations: u64,
    /// Objects passed to the allocator's `deallocate`.
    pub deallocations: u64,
    /// Bounded claims that gave up on their timeout.
    pub timeouts: u64,
}

pub(crate) struct StatsTracker {
    claims: AtomicU64,
    releases: AtomicU64,
    allocations: AtomicU64,
    deallocations: AtomicU64,
    timeouts: AtomicU64,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self {
            claims: AtomicU64::new(0),
            releases: AtomicU64::new(0),
            allocations: AtomicU64::new(0),
            deallocations: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
        }
    }

    pub fn record_claim(&self) {
        self.claims.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_release(&self) {
        self.releases.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_allocation(&self) {
        self.allocations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deallocation(&self) {
        self.deallocations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, capacity: usize, claimed: usize) -> PoolStats {
        let allocations = self.allocations.load(Ordering::Relaxed);
        let deallocations = self.deallocations.load(Ordering::Relaxed);
        PoolStats {
            capacity,
            claimed,
            live: allocations.saturating_sub(deallocations) as usize,
            claims: self.claims.load(Ordering::Relaxed),
            releases: self.releases.load(Ordering::Relaxed),
            allocations,
            deallocations,
            timeouts: self.timeouts.load(Ordering::Relaxed),
        }
    }
}

impl Default for StatsTracker {
    fn default() -> Self {
        Self::new()
    }
}
