//! Pool configuration options

use std::fmt;
use std::time::Duration;

use crate::allocator::Allocator;
use crate::errors::{PoolError, PoolResult};

/// Configuration consumed by the pool constructors.
///
/// The setters can be chained builder-style. A pool takes the configuration
/// by value, so the settings it runs with are fixed at construction time no
/// matter what happens to other copies of the config afterwards.
///
/// # Examples
///
/// ```
/// # use slotpool::{Allocator, AllocError, Poolable, SlotHandle};
/// # struct Widget(SlotHandle<Widget>);
/// # impl Poolable for Widget {
/// #     fn slot(&self) -> &SlotHandle<Self> { &self.0 }
/// # }
/// # struct WidgetAllocator;
/// # impl Allocator for WidgetAllocator {
/// #     type Object = Widget;
/// #     fn allocate(&self, slot: SlotHandle<Widget>) -> Result<Widget, AllocError> {
/// #         Ok(Widget(slot))
/// #     }
/// # }
/// use std::time::Duration;
/// use slotpool::Config;
///
/// let config = Config::new()
///     .with_allocator(WidgetAllocator)
///     .with_size(4)
///     .with_ttl(Duration::from_secs(30));
///
/// assert_eq!(config.size(), 4);
/// assert_eq!(config.ttl(), Duration::from_secs(30));
/// assert!(config.validate().is_ok());
/// ```
pub struct Config<A> {
    size: usize,
    ttl: Duration,
    allocator: Option<A>,
}

impl<A> Default for Config<A> {
    fn default() -> Self {
        Self {
            size: 10,
            ttl: Duration::from_secs(600),
            allocator: None,
        }
    }
}

impl<A> Config<A> {
    /// Create a configuration with the default size (10) and TTL (10
    /// minutes). No allocator is set; one must be provided before the
    /// config passes validation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pool size. The pool never holds more than this many live
    /// objects at a time; a pool of size 1 whose single object has expired
    /// deallocates it before allocating a replacement.
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn set_size(&mut self, size: usize) {
        self.size = size;
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Set the time-to-live for pooled objects. Objects older than this are
    /// deallocated and their slot re-allocated on the next claim. No upper
    /// bound is given for how much older than the TTL an object may get
    /// before it is noticed; the check is inherently racy and an object can
    /// expire between being claimed and being used.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn set_ttl(&mut self, ttl: Duration) {
        self.ttl = ttl;
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Set the allocator the pool will create and destroy objects with.
    pub fn with_allocator(mut self, allocator: A) -> Self {
        self.allocator = Some(allocator);
        self
    }

    pub fn set_allocator(&mut self, allocator: A) {
        self.allocator = Some(allocator);
    }

    pub fn allocator(&self) -> Option<&A> {
        self.allocator.as_ref()
    }

    /// Copy every setting of this config onto `other`.
    pub fn copy_into(&self, other: &mut Config<A>)
    where
        A: Clone,
    {
        other.size = self.size;
        other.ttl = self.ttl;
        other.allocator = self.allocator.clone();
    }

    /// Check that the configuration is usable: size at least 1, a non-zero
    /// TTL, and an allocator present.
    pub fn validate(&self) -> PoolResult<()> {
        if self.size < 1 {
            return Err(PoolError::InvalidConfiguration(format!(
                "size must be at least 1, but was {}",
                self.size
            )));
        }
        if self.ttl.is_zero() {
            return Err(PoolError::InvalidConfiguration(
                "ttl must be greater than zero".to_string(),
            ));
        }
        if self.allocator.is_none() {
            return Err(PoolError::InvalidConfiguration(
                "allocator must be set".to_string(),
            ));
        }
        Ok(())
    }
}

impl<A: Allocator> Config<A> {
    pub(crate) fn into_parts(mut self) -> PoolResult<(usize, Duration, A)> {
        self.validate()?;
        let allocator = self.allocator.take().expect("validated above");
        Ok((self.size, self.ttl, allocator))
    }
}

impl<A> fmt::Debug for Config<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("size", &self.size)
            .field("ttl", &self.ttl)
            .field("allocator", &self.allocator.is_some())
            .finish()
    }
}
