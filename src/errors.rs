//! Error types for the object pool

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Error reported by caller-supplied factories, hooks and consumers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Which lifecycle hook an error or registration refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    /// Runs before the consumer on every `execute`.
    Before,
    /// Runs after the consumer on every `execute`.
    After,
    /// Runs when the reaper retires an instance.
    Destroy,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookKind::Before => f.write_str("before"),
            HookKind::After => f.write_str("after"),
            HookKind::Destroy => f.write_str("destroy"),
        }
    }
}

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Pool '{0}' already exists")]
    DuplicatePoolName(String),

    #[error("Pool '{0}' does not exist")]
    UnknownPoolName(String),

    #[error("Pool '{0}' holds a different resource type")]
    PoolTypeMismatch(String),

    #[error("Pool '{0}' is already initialized - options must be set before 'initialize'")]
    ConfigurationAfterInit(String),

    #[error("Cannot set multiple '{0}' hooks")]
    DuplicateHookRegistration(HookKind),

    #[error("Invalid pool configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Pool '{0}' has not been initialized")]
    NotInitialized(String),

    #[error("Failed to create pool instance: {0}")]
    InstanceCreationFailure(#[source] BoxError),

    #[error("Timed out after {0:?} waiting for an available instance")]
    BorrowTimeout(Duration),

    #[error("Consumer failed while holding a pool instance: {0}")]
    ConsumerFailure(#[source] BoxError),

    #[error("The '{hook}' hook failed: {source}")]
    HookFailure {
        hook: HookKind,
        #[source]
        source: BoxError,
    },

    #[error("The 'destroy' hook failed: {0}")]
    DestroyHookFailure(#[source] BoxError),

    #[error("Failed to start pool background worker")]
    WorkerSpawn(#[from] std::io::Error),
}

pub type PoolResult<T> = Result<T, PoolError>;
