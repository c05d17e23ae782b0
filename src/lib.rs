//! # elastic_pool
//!
//! Named, bounded pools of reusable resources that grow on demand and shrink
//! back toward a floor when instances sit idle.
//!
//! ## Features
//!
//! - Ceiling on the total number of instances, available plus on loan
//! - Background growth in fixed increments once availability runs low
//! - Periodic reaping of instances idle past their life expectancy
//! - Before, after and destroy lifecycle hooks
//! - Blocking and async borrowing with a bounded wait
//! - Automatic return of borrowed instances via RAII (Drop trait)
//! - Named-pool registry
//! - Health monitoring and metrics, with Prometheus text export
//!
//! ## Quick Start
//!
//! ```rust
//! use elastic_pool::{PoolConfig, PoolRegistry};
//!
//! let registry = PoolRegistry::new();
//! let pool = registry
//!     .create_with_config::<Vec<u8>>("buffers", PoolConfig::new().with_max_pool_size(8))
//!     .unwrap();
//! pool.initialize(|| Ok(Vec::with_capacity(4096))).unwrap();
//!
//! let written = pool
//!     .execute(|buf| {
//!         buf.clear();
//!         buf.extend_from_slice(b"payload");
//!         Ok(buf.len())
//!     })
//!     .unwrap();
//! assert_eq!(written, 7);
//! // The instance is back in the pool once `execute` returns
//! assert_eq!(pool.on_loan_count(), 0);
//! ```

mod config;
mod errors;
mod grower;
mod health;
mod instance;
mod metrics;
mod pool;
mod reaper;
mod registry;
mod store;

pub use config::PoolConfig;
pub use errors::{BoxError, HookKind, PoolError, PoolResult};
pub use health::HealthStatus;
pub use instance::InstanceId;
pub use metrics::{MetricsExporter, PoolMetrics};
pub use pool::{Pool, PooledObject};
pub use registry::PoolRegistry;
