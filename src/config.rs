//! Pool configuration options

use std::time::Duration;

use crate::errors::{PoolError, PoolResult};

/// Configuration for pool sizing, growth, waiting and eviction
///
/// A pool copies its configuration when it is initialized; from then on it
/// is frozen.
///
/// # Examples
///
/// ```
/// use elastic_pool::PoolConfig;
/// use std::time::Duration;
///
/// let config = PoolConfig::new()
///     .with_max_pool_size(10)
///     .with_min_pool_size(2)
///     .with_pool_growth_increment(5)
///     .with_wait_timeout(Duration::from_secs(2));
///
/// assert_eq!(config.max_pool_size, 10);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolConfig {
    /// Ceiling on available plus on-loan instances
    pub max_pool_size: usize,

    /// Floor the reaper shrinks the pool back toward
    pub min_pool_size: usize,

    /// Number of instances a single growth step tries to create
    pub pool_growth_increment: usize,

    /// Growth is requested when a borrower sees this many or fewer available instances
    pub growth_threshold: usize,

    /// Longest a waiting borrower sleeps before checking the store again
    pub wait_poll_interval: Duration,

    /// How long a borrower waits for an instance before giving up
    pub wait_timeout: Duration,

    /// Age after which an idle instance may be retired
    pub instance_life_expectancy: Duration,

    /// Period of the reaper
    pub reap_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_pool_size: 150,
            min_pool_size: 5,
            pool_growth_increment: 5,
            growth_threshold: 2,
            wait_poll_interval: Duration::from_millis(100),
            wait_timeout: Duration::from_secs(10),
            instance_life_expectancy: Duration::from_secs(60),
            reap_interval: Duration::from_secs(1),
        }
    }
}

impl PoolConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum pool size
    pub fn with_max_pool_size(mut self, size: usize) -> Self {
        self.max_pool_size = size;
        self
    }

    /// Set the minimum pool size
    pub fn with_min_pool_size(mut self, size: usize) -> Self {
        self.min_pool_size = size;
        self
    }

    /// Set how many instances a growth step creates
    pub fn with_pool_growth_increment(mut self, increment: usize) -> Self {
        self.pool_growth_increment = increment;
        self
    }

    /// Set the low-water mark that triggers growth
    pub fn with_growth_threshold(mut self, threshold: usize) -> Self {
        self.growth_threshold = threshold;
        self
    }

    /// Set the wait poll interval
    pub fn with_wait_poll_interval(mut self, interval: Duration) -> Self {
        self.wait_poll_interval = interval;
        self
    }

    /// Set the borrow timeout
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Set the idle life expectancy of an instance
    pub fn with_instance_life_expectancy(mut self, life: Duration) -> Self {
        self.instance_life_expectancy = life;
        self
    }

    /// Set the reaper period
    pub fn with_reap_interval(mut self, interval: Duration) -> Self {
        self.reap_interval = interval;
        self
    }

    /// Check the sizing and timer invariants
    ///
    /// # Examples
    ///
    /// ```
    /// use elastic_pool::{PoolConfig, PoolError};
    ///
    /// let config = PoolConfig::new().with_max_pool_size(4).with_min_pool_size(4);
    /// assert!(matches!(config.validate(), Err(PoolError::InvalidConfiguration(_))));
    /// ```
    pub fn validate(&self) -> PoolResult<()> {
        if self.max_pool_size == 0 {
            return Err(invalid("max_pool_size must be at least 1"));
        }
        if self.min_pool_size >= self.max_pool_size {
            return Err(invalid(format!(
                "min_pool_size ({}) must be less than max_pool_size ({})",
                self.min_pool_size, self.max_pool_size
            )));
        }
        if self.pool_growth_increment == 0 {
            return Err(invalid("pool_growth_increment must be at least 1"));
        }
        if self.wait_poll_interval.is_zero() {
            return Err(invalid("wait_poll_interval must be greater than zero"));
        }
        if self.reap_interval.is_zero() {
            return Err(invalid("reap_interval must be greater than zero"));
        }
        Ok(())
    }
}

fn invalid(reason: impl Into<String>) -> PoolError {
    PoolError::InvalidConfiguration(reason.into())
}
