//! Cooperative cancellation for blocking pool operations
//!
//! Claiming and waiting on a shutdown completion can block for a long time.
//! A [`CancelToken`] lets another thread abandon those waits: the blocked
//! operation fails with [`PoolError::Cancelled`](crate::PoolError::Cancelled)
//! instead of running to completion. Cancellation is sticky — once a token
//! has been cancelled every operation observing it fails immediately.
//!
//! The pool's internal shutdown drain never observes tokens; it keeps
//! waiting for claimed objects no matter what.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

type Waker = Box<dyn Fn() + Send>;

struct CancelInner {
    cancelled: AtomicBool,
    next_id: AtomicU64,
    wakers: Mutex<Vec<(u64, Waker)>>,
}

/// A cloneable cancellation flag shared between the cancelling thread and
/// the blocked operation.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CancelInner {
                cancelled: AtomicBool::new(false),
                next_id: AtomicU64::new(1),
                wakers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Trip the token and wake every operation currently blocked on it.
    /// Idempotent.
    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::SeqCst) {
            let wakers: Vec<(u64, Waker)> = {
                let mut registered = self.inner.wakers.lock();
                registered.drain(..).collect()
            };
            for (_, waker) in wakers {
                waker();
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Register a waker that fires when the token is cancelled. If the
    /// token is already cancelled the waker runs right away. The
    /// registration lives until the returned guard is dropped, so a waker
    /// fires at most once.
    pub(crate) fn on_cancel(&self, waker: Waker) -> WakerGuard {
        if self.is_cancelled() {
            waker();
            return WakerGuard {
                inner: Weak::new(),
                id: 0,
            };
        }
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.wakers.lock().push((id, waker));
        // cancel() may have drained the list between the flag check and the
        // push; whichever side removes the entry under the lock runs it.
        if self.is_cancelled() {
            let entry = {
                let mut registered = self.inner.wakers.lock();
                let at = registered.iter().position(|(waker_id, _)| *waker_id == id);
                at.map(|at| registered.remove(at))
            };
            if let Some((_, waker)) = entry {
                waker();
            }
        }
        WakerGuard {
            inner: Arc::downgrade(&self.inner),
            id,
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Unregisters the waker when the blocked operation returns.
pub(crate) struct WakerGuard {
    inner: Weak<CancelInner>,
    id: u64,
}

impl Drop for WakerGuard {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner
                .wakers
                .lock()
                .retain(|(waker_id, _)| *waker_id != self.id);
        }
    }
}
