//! # slotpool
//!
//! Thread-safe object pool for expensive-to-construct resources, with TTL
//! expiry, bounded claims and graceful shutdown.
//!
//! ## Features
//!
//! - Fixed ceiling on live objects, enforced under any interleaving
//! - Claim with an unbounded wait, a consumed timeout budget, or a
//!   [`CancelToken`]
//! - Time-to-live policy: stale objects are deallocated and replaced on
//!   the next claim
//! - Allocation failures surface per-claim and never wedge the pool
//! - Graceful shutdown: an asynchronous drain observable through a
//!   [`Completion`], waiting for claimed objects to come home
//! - Two interchangeable implementations of one [`Pool`] contract:
//!   [`ArrayPool`] (mutex + condition variable) and [`QueuePool`]
//!   (live-slot channel fed by a background allocator thread)
//!
//! ## Quick start
//!
//! ```rust
//! use std::time::Duration;
//! use slotpool::{AllocError, Allocator, ArrayPool, Config, Pool, Poolable, SlotHandle};
//!
//! struct Connection {
//!     target: String,
//!     slot: SlotHandle<Connection>,
//! }
//!
//! impl Poolable for Connection {
//!     fn slot(&self) -> &SlotHandle<Self> {
//!         &self.slot
//!     }
//! }
//!
//! struct Connector {
//!     target: String,
//! }
//!
//! impl Allocator for Connector {
//!     type Object = Connection;
//!
//!     fn allocate(&self, slot: SlotHandle<Connection>) -> Result<Connection, AllocError> {
//!         Ok(Connection { target: self.target.clone(), slot })
//!     }
//! }
//!
//! let pool = ArrayPool::new(
//!     Config::new()
//!         .with_allocator(Connector { target: "db:5432".into() })
//!         .with_size(2)
//!         .with_ttl(Duration::from_secs(60)),
//! )?;
//!
//! let conn = pool.claim()?;
//! assert_eq!(conn.target, "db:5432");
//! conn.release();
//!
//! pool.shutdown().wait();
//! # Ok::<(), slotpool::PoolError>(())
//! ```

mod allocator;
mod array_pool;
mod cancel;
mod completion;
mod config;
mod errors;
mod pool;
mod queue_pool;
mod slot;
mod stats;

pub use allocator::Allocator;
pub use array_pool::ArrayPool;
pub use cancel::CancelToken;
pub use completion::Completion;
pub use config::Config;
pub use errors::{AllocError, PoolError, PoolResult};
pub use pool::Pool;
pub use queue_pool::QueuePool;
pub use slot::{Poolable, SlotHandle};
pub use stats::PoolStats;
