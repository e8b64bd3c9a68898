//! Slot handles and the poolable protocol
//!
//! A pool hands every allocated object a [`SlotHandle`]: the back-reference
//! through which the object is later released. The handle is deliberately
//! dumb — a weak pointer to the owning pool plus the slot's position and
//! allocation epoch — so poolables can hold it without keeping the pool
//! alive, and a handle that outlives its allocation goes inert instead of
//! corrupting pool state.

use std::fmt;
use std::sync::Weak;

/// Internal receiver for released objects. Both pool variants implement
/// this; the handle only sees the trait.
pub(crate) trait ReleaseSink<T>: Send + Sync {
    /// Accept `obj` back for the slot at `index`, provided the slot is
    /// still on allocation epoch `epoch` and currently claimed. Anything
    /// else is a stray release and must be ignored.
    fn release(&self, index: usize, epoch: u64, obj: T);
}

/// Back-reference from a pooled object to its slot.
///
/// Created by the pool at allocation time and passed to
/// [`Allocator::allocate`](crate::Allocator::allocate), which must store it
/// inside the object it builds. Releasing through the handle returns the
/// object to the pool and restores capacity.
///
/// Releasing is validated: a second release of the same claim, a release
/// through a handle from an earlier allocation of the slot, or a release
/// after the pool is gone are all silent no-ops, and the object passed in
/// is dropped without ever reaching the allocator's `deallocate`.
pub struct SlotHandle<T> {
    sink: Weak<dyn ReleaseSink<T>>,
    index: usize,
    epoch: u64,
}

impl<T> SlotHandle<T> {
    pub(crate) fn new(sink: Weak<dyn ReleaseSink<T>>, index: usize, epoch: u64) -> Self {
        Self { sink, index, epoch }
    }

    /// Position of the slot within its pool.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Return `obj` to the pool this handle belongs to.
    pub fn release(&self, obj: T) {
        if let Some(sink) = self.sink.upgrade() {
            sink.release(self.index, self.epoch, obj);
        }
    }
}

impl<T> Clone for SlotHandle<T> {
    fn clone(&self) -> Self {
        Self {
            sink: Weak::clone(&self.sink),
            index: self.index,
            epoch: self.epoch,
        }
    }
}

impl<T> fmt::Debug for SlotHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotHandle")
            .field("index", &self.index)
            .field("epoch", &self.epoch)
            .finish()
    }
}

/// An object managed by a pool.
///
/// Implementors store the [`SlotHandle`] given to
/// [`Allocator::allocate`](crate::Allocator::allocate) and expose it through
/// [`slot`](Poolable::slot); the provided [`release`](Poolable::release)
/// then returns the object through that handle. A poolable must not touch
/// its handle once the object has been deallocated.
pub trait Poolable: Sized + Send + 'static {
    /// The handle this object was allocated for.
    fn slot(&self) -> &SlotHandle<Self>;

    /// Give the object back to its pool.
    fn release(self) {
        let slot = self.slot().clone();
        slot.release(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct RecordingSink {
        released: Mutex<Vec<(usize, u64, String)>>,
    }

    impl ReleaseSink<String> for RecordingSink {
        fn release(&self, index: usize, epoch: u64, obj: String) {
            self.released.lock().push((index, epoch, obj));
        }
    }

    #[test]
    fn release_reaches_a_live_sink() {
        let sink = Arc::new(RecordingSink {
            released: Mutex::new(Vec::new()),
        });
        let weak: Weak<dyn ReleaseSink<String>> =
            Arc::downgrade(&(sink.clone() as Arc<dyn ReleaseSink<String>>));
        let handle = SlotHandle::new(weak, 3, 7);

        handle.release("obj".to_string());

        assert_eq!(
            sink.released.lock().as_slice(),
            &[(3, 7, "obj".to_string())]
        );
    }

    #[test]
    fn release_after_pool_drop_is_a_no_op() {
        let sink = Arc::new(RecordingSink {
            released: Mutex::new(Vec::new()),
        });
        let weak: Weak<dyn ReleaseSink<String>> =
            Arc::downgrade(&(sink.clone() as Arc<dyn ReleaseSink<String>>));
        let handle = SlotHandle::new(weak, 0, 1);
        drop(sink);

        // Nothing to assert beyond "does not panic": the sink is gone.
        handle.release("orphan".to_string());
    }

    #[test]
    fn handles_clone_with_their_identity() {
        let sink = Arc::new(RecordingSink {
            released: Mutex::new(Vec::new()),
        });
        let weak: Weak<dyn ReleaseSink<String>> =
            Arc::downgrade(&(sink.clone() as Arc<dyn ReleaseSink<String>>));
        let handle = SlotHandle::new(weak, 5, 2);
        let copy = handle.clone();

        assert_eq!(copy.index(), 5);
        copy.release("from copy".to_string());
        assert_eq!(sink.released.lock().len(), 1);
    }
}
