//! Channel pool fed by a background allocator thread
//!
//! Claims take no central lock: live slots travel through a bounded channel
//! and a claim is a (possibly timed) receive. A dedicated allocator thread
//! fills every slot up front and afterwards serves refresh requests —
//! expired or allocation-poisoned slots are routed back to it, deallocated
//! and rebuilt. Shutdown floats a stop sentinel on the live channel; every
//! receiver puts it straight back, so current and future claims fail fast
//! while the same thread, now the drain actor, reclaims every slot as it
//! comes home.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::allocator::Allocator;
use crate::cancel::CancelToken;
use crate::completion::Completion;
use crate::config::Config;
use crate::errors::{PoolError, PoolResult};
use crate::pool::Pool;
use crate::slot::{ReleaseSink, SlotHandle};
use crate::stats::{PoolStats, StatsTracker};

type Poison = Arc<dyn std::error::Error + Send + Sync + 'static>;

struct QSlotState<T> {
    object: Option<T>,
    expires_at: Instant,
    epoch: u64,
    /// Captured allocator error; the slot circulates so a claimer can
    /// surface it, then goes back for another allocation attempt.
    poison: Option<Poison>,
}

struct QSlot<T> {
    index: usize,
    claimed: AtomicBool,
    state: Mutex<QSlotState<T>>,
}

enum LiveMsg<T> {
    Slot(Arc<QSlot<T>>),
    /// Shutdown sentinel. Receivers put it back so it reaches everyone.
    Stop,
}

enum DeadMsg<T> {
    /// Deallocate whatever the slot holds and allocate a replacement.
    Refresh(Arc<QSlot<T>>),
    Shutdown,
}

struct QueueShared<T> {
    live_tx: channel::Sender<LiveMsg<T>>,
    live_rx: channel::Receiver<LiveMsg<T>>,
    dead_tx: channel::Sender<DeadMsg<T>>,
    slots: Vec<Arc<QSlot<T>>>,
    shutdown: AtomicBool,
    stats: StatsTracker,
}

/// Object pool backed by a live-slot channel and a background allocator
/// thread. Slots are populated eagerly at construction.
pub struct QueuePool<A: Allocator> {
    shared: Arc<QueueShared<A::Object>>,
    completion: Completion,
}

impl<A: Allocator> QueuePool<A> {
    /// Build a pool from a validated configuration and start its allocator
    /// thread.
    pub fn new(config: Config<A>) -> PoolResult<Self> {
        let (size, ttl, allocator) = config.into_parts()?;
        // One extra seat so the stop sentinel always fits next to a full
        // complement of slots.
        let (live_tx, live_rx) = channel::bounded(size + 1);
        let (dead_tx, dead_rx) = channel::unbounded();
        let now = Instant::now();
        let slots = (0..size)
            .map(|index| {
                Arc::new(QSlot {
                    index,
                    claimed: AtomicBool::new(false),
                    state: Mutex::new(QSlotState {
                        object: None,
                        expires_at: now,
                        epoch: 0,
                        poison: None,
                    }),
                })
            })
            .collect();
        let shared = Arc::new(QueueShared {
            live_tx,
            live_rx,
            dead_tx,
            slots,
            shutdown: AtomicBool::new(false),
            stats: StatsTracker::new(),
        });
        let completion = Completion::new();
        let task = AllocTask {
            shared: Arc::clone(&shared),
            allocator,
            ttl,
            dead_rx,
            completion: completion.clone(),
        };
        thread::spawn(move || task.run());
        debug!(size, ttl_ms = ttl.as_millis() as u64, "created queue pool");
        Ok(Self { shared, completion })
    }

    fn claim_inner(
        &self,
        deadline: Option<Instant>,
        token: Option<&CancelToken>,
    ) -> PoolResult<Option<A::Object>> {
        let shared = &self.shared;
        if shared.shutdown.load(Ordering::SeqCst) {
            return Err(PoolError::ShutDown);
        }
        if token.is_some_and(CancelToken::is_cancelled) {
            return Err(PoolError::Cancelled);
        }

        // Cancellation wakes the receive below through a side channel fed
        // by the token's waker.
        let (cancel_rx, _waker) = match token {
            Some(token) => {
                let (cancel_tx, cancel_rx) = channel::bounded(1);
                let waker = token.on_cancel(Box::new(move || {
                    let _ = cancel_tx.try_send(());
                }));
                (Some(cancel_rx), Some(waker))
            }
            None => (None, None),
        };

        loop {
            let message = match self.next_live(deadline, cancel_rx.as_ref())? {
                Some(message) => message,
                None => {
                    shared.stats.record_timeout();
                    return Ok(None);
                }
            };
            let slot = match message {
                LiveMsg::Stop => {
                    let _ = shared.live_tx.send(LiveMsg::Stop);
                    return Err(PoolError::ShutDown);
                }
                LiveMsg::Slot(slot) => slot,
            };
            if shared.shutdown.load(Ordering::SeqCst) {
                // The drain reclaims this one; fail the claim promptly.
                let _ = shared.live_tx.send(LiveMsg::Slot(slot));
                return Err(PoolError::ShutDown);
            }

            let mut state = slot.state.lock();
            if let Some(poison) = state.poison.take() {
                drop(state);
                let _ = shared.dead_tx.send(DeadMsg::Refresh(slot));
                return Err(PoolError::AllocationFailed(poison));
            }
            if Instant::now() > state.expires_at {
                drop(state);
                debug!(index = slot.index, "object expired; sending for refresh");
                let _ = shared.dead_tx.send(DeadMsg::Refresh(slot));
                continue;
            }
            let object = state
                .object
                .take()
                .expect("a live slot without poison carries an object");
            slot.claimed.store(true, Ordering::SeqCst);
            drop(state);
            shared.stats.record_claim();
            return Ok(Some(object));
        }
    }

    /// A spent budget still takes whatever is immediately available; it
    /// only refuses to wait.
    fn poll_live(&self) -> PoolResult<Option<LiveMsg<A::Object>>> {
        match self.shared.live_rx.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(channel::TryRecvError::Empty) => Ok(None),
            Err(channel::TryRecvError::Disconnected) => Err(PoolError::ShutDown),
        }
    }

    /// One receive on the live channel, honouring the claim's remaining
    /// budget and its cancel channel. `Ok(None)` is budget exhaustion.
    fn next_live(
        &self,
        deadline: Option<Instant>,
        cancel_rx: Option<&channel::Receiver<()>>,
    ) -> PoolResult<Option<LiveMsg<A::Object>>> {
        let live_rx = &self.shared.live_rx;
        match (deadline, cancel_rx) {
            (None, None) => live_rx.recv().map(Some).map_err(|_| PoolError::ShutDown),
            (Some(deadline), None) => {
                let now = Instant::now();
                if now >= deadline {
                    return self.poll_live();
                }
                match live_rx.recv_timeout(deadline - now) {
                    Ok(message) => Ok(Some(message)),
                    Err(channel::RecvTimeoutError::Timeout) => Ok(None),
                    Err(channel::RecvTimeoutError::Disconnected) => Err(PoolError::ShutDown),
                }
            }
            (None, Some(cancel_rx)) => crossbeam::select! {
                recv(live_rx) -> message => message.map(Some).map_err(|_| PoolError::ShutDown),
                recv(cancel_rx) -> _ => Err(PoolError::Cancelled),
            },
            (Some(deadline), Some(cancel_rx)) => {
                let now = Instant::now();
                if now >= deadline {
                    return self.poll_live();
                }
                crossbeam::select! {
                    recv(live_rx) -> message => message.map(Some).map_err(|_| PoolError::ShutDown),
                    recv(cancel_rx) -> _ => Err(PoolError::Cancelled),
                    default(deadline - now) => Ok(None),
                }
            }
        }
    }
}

impl<T: Send + 'static> ReleaseSink<T> for QueueShared<T> {
    fn release(&self, index: usize, epoch: u64, object: T) {
        let slot = match self.slots.get(index) {
            Some(slot) => Arc::clone(slot),
            None => return,
        };
        let mut state = slot.state.lock();
        if state.epoch != epoch {
            return; // handle from an earlier allocation of this slot
        }
        if slot
            .claimed
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return; // repeated release
        }
        state.object = Some(object);
        drop(state);
        self.stats.record_release();
        let _ = self.live_tx.send(LiveMsg::Slot(slot));
    }
}

impl<A: Allocator> Pool for QueuePool<A> {
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
        if !self.shared.shutdown.swap(true, Ordering::SeqCst) {
            debug!("queue pool shutting down");
            // Wake claims that are parked on the live channel right now;
            // the allocator thread re-floats the sentinel once drained.
            let _ = self.shared.live_tx.send(LiveMsg::Stop);
            let _ = self.shared.dead_tx.send(DeadMsg::Shutdown);
        }
        self.completion.clone()
    }

    fn stats(&self) -> PoolStats {
        let claimed = self
            .shared
            .slots
            .iter()
            .filter(|slot| slot.claimed.load(Ordering::SeqCst))
            .count();
        self.shared.stats.snapshot(self.shared.slots.len(), claimed)
    }
}

impl<A: Allocator> Drop for QueuePool<A> {
    fn drop(&mut self) {
        // Make sure a forgotten pool still deallocates what it allocated.
        self.shutdown();
    }
}

/// The background allocator, and after shutdown the drain actor.
struct AllocTask<A: Allocator> {
    shared: Arc<QueueShared<A::Object>>,
    allocator: A,
    ttl: Duration,
    dead_rx: channel::Receiver<DeadMsg<A::Object>>,
    completion: Completion,
}

impl<A: Allocator> AllocTask<A> {
    fn run(self) {
        for slot in &self.shared.slots {
            self.refresh(slot);
        }
        loop {
            match self.dead_rx.recv() {
                Ok(DeadMsg::Refresh(slot)) => self.refresh(&slot),
                Ok(DeadMsg::Shutdown) | Err(_) => break,
            }
        }
        self.drain();
        // The sentinel sent by shutdown() is still circulating on the live
        // channel; late claims keep failing against it.
        self.completion.complete();
        debug!("queue pool drained");
    }

    /// Deallocate whatever the slot currently holds, then allocate a
    /// replacement (or poison the slot with the failure) and put it back on
    /// the live channel.
    fn refresh(&self, slot: &Arc<QSlot<A::Object>>) {
        self.reclaim_object(slot);
        let epoch = {
            let mut state = slot.state.lock();
            state.epoch += 1;
            state.epoch
        };
        let shared: Arc<dyn ReleaseSink<A::Object>> = self.shared.clone();
        let sink: Weak<dyn ReleaseSink<A::Object>> = Arc::downgrade(&shared);
        let handle = SlotHandle::new(sink, slot.index, epoch);
        match self.allocator.allocate(handle) {
            Ok(object) => {
                let mut state = slot.state.lock();
                state.object = Some(object);
                state.expires_at = Instant::now() + self.ttl;
                state.poison = None;
                drop(state);
                self.shared.stats.record_allocation();
            }
            Err(cause) => {
                warn!(index = slot.index, error = %cause, "allocation failed; poisoning slot");
                slot.state.lock().poison = Some(Arc::from(cause));
            }
        }
        let _ = self.shared.live_tx.send(LiveMsg::Slot(Arc::clone(slot)));
    }

    fn reclaim_object(&self, slot: &Arc<QSlot<A::Object>>) {
        let object = slot.state.lock().object.take();
        if let Some(object) = object {
            self.shared.stats.record_deallocation();
            if let Err(error) = self.allocator.deallocate(object) {
                warn!(index = slot.index, %error, "deallocation failed; continuing");
            }
        }
    }

    /// Reclaim every slot. Claimed slots arrive on the live channel once
    /// their holders release them; this wait is deliberately not
    /// cancellable.
    fn drain(&self) {
        debug!("queue pool draining");
        let mut reclaimed = 0;
        while reclaimed < self.shared.slots.len() {
            crossbeam::select! {
                recv(self.shared.live_rx) -> message => match message {
                    Ok(LiveMsg::Slot(slot)) => {
                        self.reclaim_object(&slot);
                        reclaimed += 1;
                    }
                    Ok(LiveMsg::Stop) => {
                        // Claims parked on the live channel must not have
                        // to wait out the drain: put the sentinel straight
                        // back, and back off a moment so this loop does not
                        // win the race for its own re-send.
                        let _ = self.shared.live_tx.send(LiveMsg::Stop);
                        thread::sleep(Duration::from_millis(1));
                    }
                    Err(_) => return,
                },
                recv(self.dead_rx) -> message => match message {
                    Ok(DeadMsg::Refresh(slot)) => {
                        self.reclaim_object(&slot);
                        reclaimed += 1;
                    }
                    Ok(DeadMsg::Shutdown) | Err(_) => {}
                },
            }
        }
    }
}
