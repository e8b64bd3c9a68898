//! The public pool contract

use std::time::Duration;

use crate::cancel::CancelToken;
use crate::completion::Completion;
use crate::errors::PoolResult;
use crate::slot::Poolable;
use crate::stats::PoolStats;

/// A bounded pool of reusable objects.
///
/// Both pool implementations in this crate satisfy this contract;
/// [`ArrayPool`](crate::ArrayPool) with a mutex and a condition variable,
/// [`QueuePool`](crate::QueuePool) with a live queue fed by a background
/// allocator thread. Code written against the trait runs unchanged on
/// either.
///
/// # Claiming
///
/// A claim hands out exclusive use of one object. The claimer gives it back
/// through [`Poolable::release`] or
/// [`SlotHandle::release`](crate::SlotHandle::release); until then the
/// object counts against the pool's capacity. Selection among free objects
/// is deterministic within
/// one implementation but unspecified across them, and no fairness between
/// concurrent waiters is promised.
///
/// # Expiry
///
/// Every allocated object carries a deadline of `allocation time + ttl`.
/// Claims never return an object past its deadline: the pool deallocates
/// it first and allocates a replacement into the same slot.
///
/// # Shutdown
///
/// [`shutdown`](Pool::shutdown) is terminal and idempotent. It returns a
/// [`Completion`] observing the drain, which deallocates every object the
/// pool still owns, waiting for claimed objects to be released first.
/// Claims issued after shutdown — and claims still blocked when it happens
/// — fail with [`PoolError::ShutDown`](crate::PoolError::ShutDown) rather
/// than blocking forever.
pub trait Pool: Send + Sync {
    type Object: Poolable;

    /// Claim an object, blocking until one is available.
    fn claim(&self) -> PoolResult<Self::Object>;

    /// Claim an object, giving up after `timeout` and returning `Ok(None)`.
    ///
    /// The timeout is a total budget: waiting for capacity and waiting for
    /// a fresh allocation both consume it. A zero timeout never blocks —
    /// under contention it returns `None` immediately.
    fn claim_for(&self, timeout: Duration) -> PoolResult<Option<Self::Object>>;

    /// [`claim`](Pool::claim), abandoned with
    /// [`PoolError::Cancelled`](crate::PoolError::Cancelled) when `token`
    /// is cancelled.
    fn claim_cancellable(&self, token: &CancelToken) -> PoolResult<Self::Object>;

    /// [`claim_for`](Pool::claim_for), abandoned with
    /// [`PoolError::Cancelled`](crate::PoolError::Cancelled) when `token`
    /// is cancelled.
    fn claim_for_cancellable(
        &self,
        timeout: Duration,
        token: &CancelToken,
    ) -> PoolResult<Option<Self::Object>>;

    /// Shut the pool down and start draining. Idempotent; later calls
    /// observe the same drain.
    fn shutdown(&self) -> Completion;

    /// Current counters.
    fn stats(&self) -> PoolStats;
}
