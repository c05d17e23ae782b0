//! Named-pool registry
//!
//! [`PoolRegistry`] maps pool names to pools of any resource type. It is an
//! ordinary value: create one at startup and share it (usually behind an
//! `Arc`) with whatever needs to look pools up.

use std::any::Any;
use std::fmt;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use crate::config::PoolConfig;
use crate::errors::{PoolError, PoolResult};
use crate::pool::Pool;

/// Registry of pools keyed by unique name
///
/// Registration of a name is atomic: of two concurrent `create` calls with
/// the same name exactly one succeeds.
///
/// # Examples
///
/// ```
/// use elastic_pool::{PoolError, PoolRegistry};
///
/// let registry = PoolRegistry::new();
/// let pool = registry.create::<String>("sessions").unwrap();
/// pool.set_max_pool_size(20).unwrap();
///
/// let same = registry.lookup::<String>("sessions").unwrap();
/// assert_eq!(same.config().max_pool_size, 20);
///
/// assert!(matches!(
///     registry.create::<String>("sessions"),
///     Err(PoolError::DuplicatePoolName(_))
/// ));
/// ```
#[derive(Default)]
pub struct PoolRegistry {
    pools: DashMap<String, Box<dyn Any + Send + Sync>>,
}

impl PoolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new pool with default options.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::DuplicatePoolName`] if the name is taken. The
    /// existing pool is left untouched.
    pub fn create<T: Send + 'static>(&self, name: &str) -> PoolResult<Pool<T>> {
        self.create_with_config(name, PoolConfig::default())
    }

    /// Register a new pool starting from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::DuplicatePoolName`] if the name is taken.
    pub fn create_with_config<T: Send + 'static>(&self, name: &str, config: PoolConfig) -> PoolResult<Pool<T>> {
        match self.pools.entry(name.to_string()) {
            Entry::Occupied(_) => Err(PoolError::DuplicatePoolName(name.to_string())),
            Entry::Vacant(slot) => {
                let pool = Pool::with_config(name, config);
                slot.insert(Box::new(pool.clone()));
                debug!(pool = name, "Pool registered");
                Ok(pool)
            }
        }
    }

    /// Look up a registered pool.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::UnknownPoolName`] if nothing is registered under
    /// `name`, or [`PoolError::PoolTypeMismatch`] if the pool holds a
    /// different resource type than `T`.
    pub fn lookup<T: Send + 'static>(&self, name: &str) -> PoolResult<Pool<T>> {
        let entry = self
            .pools
            .get(name)
            .ok_or_else(|| PoolError::UnknownPoolName(name.to_string()))?;
        entry
            .downcast_ref::<Pool<T>>()
            .cloned()
            .ok_or_else(|| PoolError::PoolTypeMismatch(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.pools.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.pools.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}

impl fmt::Debug for PoolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolRegistry").field("pools", &self.names()).finish()
    }
}
