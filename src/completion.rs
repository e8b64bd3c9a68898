//! Observation handle for the asynchronous shutdown drain

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::cancel::CancelToken;
use crate::errors::{PoolError, PoolResult};

struct Latch {
    done: Mutex<bool>,
    cv: Condvar,
}

/// A handle to a task that finishes at some point in the future, without a
/// result and without an option to cancel the task itself — only the waits
/// on it. Returned by [`Pool::shutdown`](crate::Pool::shutdown).
///
/// Once any wait has observed completion, every later wait returns
/// immediately.
#[derive(Clone)]
pub struct Completion {
    latch: Arc<Latch>,
}

impl Completion {
    pub(crate) fn new() -> Self {
        Self {
            latch: Arc::new(Latch {
                done: Mutex::new(false),
                cv: Condvar::new(),
            }),
        }
    }

    pub(crate) fn complete(&self) {
        let mut done = self.latch.done.lock();
        *done = true;
        self.latch.cv.notify_all();
    }

    pub fn is_complete(&self) -> bool {
        *self.latch.done.lock()
    }

    /// Block until the task finishes.
    pub fn wait(&self) {
        let mut done = self.latch.done.lock();
        while !*done {
            self.latch.cv.wait(&mut done);
        }
    }

    /// Block until the task finishes or the timeout elapses. Returns `true`
    /// iff the task finished in time. A zero timeout only samples the
    /// current state.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut done = self.latch.done.lock();
        loop {
            if *done {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            self.latch.cv.wait_for(&mut done, deadline - now);
        }
    }

    /// Like [`wait`](Completion::wait), but fails with
    /// [`PoolError::Cancelled`] when the token is cancelled first.
    pub fn wait_cancellable(&self, token: &CancelToken) -> PoolResult<()> {
        let _waker = token.on_cancel(notify_waker(&self.latch));
        let mut done = self.latch.done.lock();
        loop {
            if *done {
                return Ok(());
            }
            if token.is_cancelled() {
                return Err(PoolError::Cancelled);
            }
            self.latch.cv.wait(&mut done);
        }
    }

    /// Like [`wait_for`](Completion::wait_for), but fails with
    /// [`PoolError::Cancelled`] when the token is cancelled first.
    pub fn wait_for_cancellable(
        &self,
        timeout: Duration,
        token: &CancelToken,
    ) -> PoolResult<bool> {
        let _waker = token.on_cancel(notify_waker(&self.latch));
        let deadline = Instant::now() + timeout;
        let mut done = self.latch.done.lock();
        loop {
            if *done {
                return Ok(true);
            }
            if token.is_cancelled() {
                return Err(PoolError::Cancelled);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            self.latch.cv.wait_for(&mut done, deadline - now);
        }
    }
}

/// Wakes waiters on cancel. The latch mutex is taken before notifying so a
/// waiter that has checked the flag but not yet parked cannot miss the
/// signal.
fn notify_waker(latch: &Arc<Latch>) -> Box<dyn Fn() + Send> {
    let latch: Weak<Latch> = Arc::downgrade(latch);
    Box::new(move || {
        if let Some(latch) = latch.upgrade() {
            let _done = latch.done.lock();
            latch.cv.notify_all();
        }
    })
}
