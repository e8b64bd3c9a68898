//! The allocator contract consumed by pools

use crate::errors::AllocError;
use crate::slot::{Poolable, SlotHandle};

/// Creates and destroys the objects a pool manages.
///
/// This is where pooled objects come from; clients provide their own
/// implementation. Implementations must be callable from any thread — a
/// pool may invoke `allocate` from claiming threads, from short-lived
/// helper workers and from its own background threads, possibly
/// concurrently.
pub trait Allocator: Send + Sync + 'static {
    type Object: Poolable;

    /// Build a fresh object for the given slot.
    ///
    /// The returned object must hold on to `slot` so that its
    /// [`release`](Poolable::release) goes back through
    /// [`SlotHandle::release`]. Errors are not fatal to the pool: they
    /// surface from `claim` as
    /// [`PoolError::AllocationFailed`](crate::PoolError::AllocationFailed)
    /// and the pool retries the slot on a later claim.
    fn allocate(&self, slot: SlotHandle<Self::Object>) -> Result<Self::Object, AllocError>;

    /// Free any resources held by `obj`.
    ///
    /// Called at most once per allocated object: on TTL expiry and during
    /// the shutdown drain. Deallocation may run on a release or shutdown
    /// thread whose caller cannot react to failures, so pools swallow any
    /// error returned here.
    ///
    /// The default implementation just drops the object.
    fn deallocate(&self, obj: Self::Object) -> Result<(), AllocError> {
        drop(obj);
        Ok(())
    }
}
