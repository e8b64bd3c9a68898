//! Lock/condition pool over a fixed slot array
//!
//! The reference discipline: one mutex guards a fixed-length slot vector
//! plus a count of claimed slots, and a single condition variable carries
//! release signals. Kept as simple and small as possible rather than
//! optimised — allocation and deallocation happen with the pool locked, so
//! a slow allocator stalls other claimers. [`QueuePool`](crate::QueuePool)
//! trades that central lock for a background allocator thread.

use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::allocator::Allocator;
use crate::cancel::CancelToken;
use crate::completion::Completion;
use crate::config::Config;
use crate::errors::{AllocError, PoolError, PoolResult};
use crate::pool::Pool;
use crate::slot::{ReleaseSink, SlotHandle};
use crate::stats::{PoolStats, StatsTracker};

struct SlotEntry<T> {
    /// Present while the slot holds an idle allocation; moved out to the
    /// claimer and moved back on release.
    object: Option<T>,
    expires_at: Instant,
    /// Bumped on every (re)allocation so releases through stale handles go
    /// inert.
    epoch: u64,
    claimed: bool,
}

struct ArrayState<T> {
    slots: Vec<SlotEntry<T>>,
    claimed_count: usize,
    shutdown: bool,
    completion: Option<Completion>,
}

struct ArrayCore<A: Allocator> {
    allocator: A,
    ttl: Duration,
    size: usize,
    state: Mutex<ArrayState<A::Object>>,
    released: Condvar,
    stats: StatsTracker,
}

/// Object pool backed by a fixed slot array under a single lock.
///
/// Slots are populated lazily: the first claim of a slot allocates into it.
/// Free slots are selected in index order.
pub struct ArrayPool<A: Allocator> {
    core: Arc<ArrayCore<A>>,
}

impl<A: Allocator> ArrayPool<A> {
    /// Build a pool from a validated configuration.
    pub fn new(config: Config<A>) -> PoolResult<Self> {
        let (size, ttl, allocator) = config.into_parts()?;
        let now = Instant::now();
        let slots = (0..size)
            .map(|_| SlotEntry {
                object: None,
                expires_at: now,
                epoch: 0,
                claimed: false,
            })
            .collect();
        debug!(size, ttl_ms = ttl.as_millis() as u64, "created array pool");
        Ok(Self {
            core: Arc::new(ArrayCore {
                allocator,
                ttl,
                size,
                state: Mutex::new(ArrayState {
                    slots,
                    claimed_count: 0,
                    shutdown: false,
                    completion: None,
                }),
                released: Condvar::new(),
                stats: StatsTracker::new(),
            }),
        })
    }

    fn handle(&self, index: usize, epoch: u64) -> SlotHandle<A::Object> {
        let core: Arc<dyn ReleaseSink<A::Object>> = self.core.clone();
        let sink: Weak<dyn ReleaseSink<A::Object>> = Arc::downgrade(&core);
        SlotHandle::new(sink, index, epoch)
    }

    /// Waker for [`CancelToken`]: taking the state lock before notifying
    /// closes the window where a claimer has checked the flag but not yet
    /// parked on the condvar.
    fn cancel_waker(&self) -> Box<dyn Fn() + Send> {
        let core = Arc::downgrade(&self.core);
        Box::new(move || {
            if let Some(core) = core.upgrade() {
                let _state = core.state.lock();
                core.released.notify_all();
            }
        })
    }

    fn claim_inner(
        &self,
        deadline: Option<Instant>,
        token: Option<&CancelToken>,
    ) -> PoolResult<Option<A::Object>> {
        let _waker = token.map(|token| token.on_cancel(self.cancel_waker()));
        let core = &self.core;
        let mut state = core.state.lock();

        if state.shutdown {
            return Err(PoolError::ShutDown);
        }
        if token.is_some_and(CancelToken::is_cancelled) {
            return Err(PoolError::Cancelled);
        }

        while state.claimed_count == core.size {
            match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        core.stats.record_timeout();
                        return Ok(None);
                    }
                    core.released.wait_for(&mut state, deadline - now);
                }
                None => core.released.wait(&mut state),
            }
            if state.shutdown {
                return Err(PoolError::ShutDown);
            }
            if token.is_some_and(CancelToken::is_cancelled) {
                return Err(PoolError::Cancelled);
            }
        }

        let index = state
            .slots
            .iter()
            .position(|slot| !slot.claimed)
            .expect("claimed count below size implies a free slot");

        if Instant::now() > state.slots[index].expires_at {
            if let Some(expired) = state.slots[index].object.take() {
                debug!(index, "object expired; replacing");
                core.deallocate_quietly(expired);
            }
        }

        if state.slots[index].object.is_none() {
            let epoch = state.slots[index].epoch + 1;
            state.slots[index].epoch = epoch;
            let handle = self.handle(index, epoch);
            let object = match deadline {
                None => match core.allocator.allocate(handle) {
                    Ok(object) => {
                        core.stats.record_allocation();
                        object
                    }
                    Err(cause) => {
                        warn!(index, error = %cause, "allocation failed");
                        return Err(PoolError::allocation(cause));
                    }
                },
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        core.stats.record_timeout();
                        return Ok(None);
                    }
                    match self.allocate_bounded(handle, deadline - now) {
                        Ok(Some(object)) => object,
                        Ok(None) => {
                            core.stats.record_timeout();
                            return Ok(None);
                        }
                        Err(error) => return Err(error),
                    }
                }
            };
            state.slots[index].object = Some(object);
            state.slots[index].expires_at = Instant::now() + core.ttl;
        }

        let slot = &mut state.slots[index];
        slot.claimed = true;
        state.claimed_count += 1;
        core.stats.record_claim();
        Ok(Some(
            state.slots[index]
                .object
                .take()
                .expect("slot was just allocated or already held an object"),
        ))
    }

    /// Run the allocator on a one-shot worker and join it with the
    /// remaining budget, so a slow allocator cannot blow a bounded claim's
    /// timeout. `Ok(None)` means the budget ran out first; the worker then
    /// deallocates its orphaned result instead of leaking it.
    fn allocate_bounded(
        &self,
        handle: SlotHandle<A::Object>,
        budget: Duration,
    ) -> PoolResult<Option<A::Object>> {
        let (sender, receiver) = channel::bounded(1);
        let core = Arc::clone(&self.core);
        thread::spawn(move || {
            let result = core.allocator.allocate(handle);
            if result.is_ok() {
                core.stats.record_allocation();
            }
            if let Err(channel::SendError(unclaimed)) = sender.send(result) {
                if let Ok(object) = unclaimed {
                    debug!("bounded claim timed out; discarding late allocation");
                    core.deallocate_quietly(object);
                }
            }
        });
        match receiver.recv_timeout(budget) {
            Ok(Ok(object)) => Ok(Some(object)),
            Ok(Err(cause)) => {
                warn!(error = %cause, "allocation failed");
                Err(PoolError::allocation(cause))
            }
            Err(channel::RecvTimeoutError::Timeout) => Ok(None),
            Err(channel::RecvTimeoutError::Disconnected) => {
                let cause: AllocError = "allocator worker terminated unexpectedly".into();
                Err(PoolError::allocation(cause))
            }
        }
    }
}

impl<A: Allocator> ArrayCore<A> {
    fn deallocate_quietly(&self, object: A::Object) {
        self.stats.record_deallocation();
        if let Err(error) = self.allocator.deallocate(object) {
            warn!(%error, "deallocation failed; continuing");
        }
    }

    /// Shutdown drain: deallocate slot by slot, waiting uninterruptibly for
    /// claimed slots to come back.
    fn drain(&self) {
        let mut state = self.state.lock();
        for index in 0..self.size {
            while state.slots[index].claimed {
                self.released.wait(&mut state);
            }
            if let Some(object) = state.slots[index].object.take() {
                self.deallocate_quietly(object);
            }
        }
    }
}

impl<A: Allocator> ReleaseSink<A::Object> for ArrayCore<A> {
    fn release(&self, index: usize, epoch: u64, object: A::Object) {
        let mut state = self.state.lock();
        let slot = match state.slots.get_mut(index) {
            Some(slot) => slot,
            None => return,
        };
        if !slot.claimed || slot.epoch != epoch {
            // Stray or repeated release: drop the object without touching
            // pool state, and never hand it to the allocator again.
            return;
        }
        slot.claimed = false;
        slot.object = Some(object);
        state.claimed_count -= 1;
        self.stats.record_release();
        drop(state);
        self.released.notify_all();
    }
}

impl<A: Allocator> Pool for ArrayPool<A> {
    type Object = A::Object;

    fn claim(&self) -> PoolResult<Self::Object> {
        self.claim_inner(None, None)
            .map(|object| object.expect("unbounded claim yields an object or fails"))
    }

    fn claim_for(&self, timeout: Duration) -> PoolResult<Option<Self::Object>> {
        self.claim_inner(Some(Instant::now() + timeout), None)
    }

    fn claim_cancellable(&self, token: &CancelToken) -> PoolResult<Self::Object> {
        self.claim_inner(None, Some(token))
            .map(|object| object.expect("unbounded claim yields an object or fails"))
    }

    fn claim_for_cancellable(
        &self,
        timeout: Duration,
        token: &CancelToken,
    ) -> PoolResult<Option<Self::Object>> {
        self.claim_inner(Some(Instant::now() + timeout), Some(token))
    }

    fn shutdown(&self) -> Completion {
        let mut state = self.core.state.lock();
        if let Some(completion) = &state.completion {
            return completion.clone();
        }
        debug!("array pool shutting down");
        state.shutdown = true;
        let completion = Completion::new();
        state.completion = Some(completion.clone());
        let core = Arc::clone(&self.core);
        let latch = completion.clone();
        thread::spawn(move || {
            core.drain();
            latch.complete();
            debug!("array pool drained");
        });
        drop(state);
        // Wake blocked claims so they observe the shutdown.
        self.core.released.notify_all();
        completion
    }

    fn stats(&self) -> PoolStats {
        let state = self.core.state.lock();
        self.core.stats.snapshot(self.core.size, state.claimed_count)
    }
}

impl<A: Allocator> Drop for ArrayPool<A> {
    fn drop(&mut self) {
        // Make sure a forgotten pool still deallocates what it allocated.
        self.shutdown();
    }
}
