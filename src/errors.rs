//! Error types for the object pool

use std::sync::Arc;

use thiserror::Error;

/// Boxed error returned by [`Allocator`](crate::Allocator) methods.
pub type AllocError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug, Clone)]
pub enum PoolError {
    #[error("invalid pool configuration: {0}")]
    InvalidConfiguration(String),

    #[error("pool is shut down")]
    ShutDown,

    #[error("operation was cancelled")]
    Cancelled,

    #[error("allocation failed: {0}")]
    AllocationFailed(Arc<dyn std::error::Error + Send + Sync + 'static>),
}

impl PoolError {
    pub(crate) fn allocation(cause: AllocError) -> Self {
        PoolError::AllocationFailed(Arc::from(cause))
    }

    /// The underlying allocator error, when this is an allocation failure.
    pub fn allocation_cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            PoolError::AllocationFailed(cause) => Some(cause.as_ref()),
            _ => None,
        }
    }
}

pub type PoolResult<T> = Result<T, PoolError>;
