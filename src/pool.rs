//! Named pools and the borrow protocol
//!
//! A [`Pool`] is configured first (options and hooks), then initialized with
//! a factory. Initialization freezes the configuration, starts a growth
//! worker and a reaper thread, and requests the first growth step. Both
//! threads stop once the last handle to the pool is dropped.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, error, info, trace, warn};

use crate::config::PoolConfig;
use crate::errors::{BoxError, HookKind, PoolError, PoolResult};
use crate::grower::{self, Factory, Grower, GrowthDemand, GrowthSignal};
use crate::health::HealthStatus;
use crate::instance::{Instance, InstanceId};
use crate::metrics::{MetricsExporter, MetricsTracker, PoolMetrics};
use crate::reaper::{self, ReaperHandle};
use crate::store::PoolStore;

pub(crate) type Hook<T> = Box<dyn Fn(&mut T) -> Result<(), BoxError> + Send + Sync>;
pub(crate) type DestroyHook<T> = Box<dyn Fn(T) -> Result<(), BoxError> + Send + Sync>;

/// Optional lifecycle hooks, each set at most once
pub(crate) struct Hooks<T> {
    pub before: Option<Hook<T>>,
    pub after: Option<Hook<T>>,
    pub destroy: Option<DestroyHook<T>>,
}

impl<T> Default for Hooks<T> {
    fn default() -> Self {
        Self {
            before: None,
            after: None,
            destroy: None,
        }
    }
}

fn register<H>(slot: &mut Option<H>, kind: HookKind, hook: H) -> PoolResult<()> {
    if slot.is_some() {
        return Err(PoolError::DuplicateHookRegistration(kind));
    }
    *slot = Some(hook);
    Ok(())
}

/// State shared by a pool's handles, leases and background threads
pub(crate) struct Core<T> {
    pub name: String,
    pub config: PoolConfig,
    pub store: PoolStore<T>,
    pub metrics: MetricsTracker,
    pub grower: Grower<T>,
    hooks: Hooks<T>,
}

impl<T> Core<T> {
    pub fn new(name: String, config: PoolConfig, factory: Factory<T>) -> Self {
        Self {
            store: PoolStore::new(config.max_pool_size, config.min_pool_size),
            name,
            config,
            metrics: MetricsTracker::new(),
            grower: Grower::new(factory),
            hooks: Hooks::default(),
        }
    }

    pub fn with_hooks(mut self, hooks: Hooks<T>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn checkin(&self, instance: Instance<T>) {
        let id = instance.id();
        self.store.return_instance(instance);
        self.metrics.record_returned();
        trace!(pool = %self.name, instance = id, "Instance checked in");
    }

    /// Hand a retired value to the destroy hook; failures are logged
    pub fn destroy(&self, value: T) {
        let Some(hook) = &self.hooks.destroy else {
            return;
        };
        if let Err(source) = hook(value) {
            self.metrics.record_destroy_failure();
            let err = PoolError::DestroyHookFailure(source);
            error!(pool = %self.name, error = %err, "Destroy hook failed");
        }
    }

    /// before -> consumer -> after; the first failure short-circuits
    fn run_hooked<R, F>(&self, value: &mut T, consumer: F) -> PoolResult<R>
    where
        F: FnOnce(&mut T) -> Result<R, BoxError>,
    {
        if let Some(before) = &self.hooks.before {
            before(value).map_err(|source| PoolError::HookFailure {
                hook: HookKind::Before,
                source,
            })?;
        }
        let output = consumer(value).map_err(PoolError::ConsumerFailure)?;
        if let Some(after) = &self.hooks.after {
            after(value).map_err(|source| PoolError::HookFailure {
                hook: HookKind::After,
                source,
            })?;
        }
        Ok(output)
    }
}

/// An instance on loan; it is checked back in when dropped
pub struct PooledObject<T> {
    instance: Option<Instance<T>>,
    core: Arc<Core<T>>,
}

impl<T> PooledObject<T> {
    fn new(instance: Instance<T>, core: Arc<Core<T>>) -> Self {
        Self {
            instance: Some(instance),
            core,
        }
    }

    /// Identifier of the borrowed instance
    pub fn id(&self) -> InstanceId {
        self.instance().id()
    }

    /// When the borrowed instance was created
    pub fn created_at(&self) -> Instant {
        self.instance().created_at()
    }

    fn instance(&self) -> &Instance<T> {
        self.instance.as_ref().expect("Instance already returned")
    }
}

impl<T> Deref for PooledObject<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.instance().value()
    }
}

impl<T> DerefMut for PooledObject<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.instance
            .as_mut()
            .expect("Instance already returned")
            .value_mut()
    }
}

impl<T> Drop for PooledObject<T> {
    fn drop(&mut self) {
        if let Some(instance) = self.instance.take() {
            self.core.checkin(instance);
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for PooledObject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledObject")
            .field("pool", &self.core.name)
            .field("instance", &self.instance)
            .finish()
    }
}

/// Running machinery of an initialized pool
struct Runtime<T> {
    core: Arc<Core<T>>,
    growth: GrowthSignal,
    _reaper: ReaperHandle,
}

/// Start the growth worker and the reaper for `core`
fn spawn_workers<T: Send + 'static>(core: &Arc<Core<T>>) -> PoolResult<(GrowthSignal, ReaperHandle)> {
    let growth = grower::spawn_worker(Arc::downgrade(core), &core.name)?;
    let reaper = reaper::spawn(Arc::downgrade(core), &core.name, core.config.reap_interval)?;
    Ok((growth, reaper))
}

impl<T: Send + 'static> Runtime<T> {
    /// On failure the options and hooks are handed back with the error
    fn start<S>(name: &str, setup: Setup<T>, factory: Factory<T>, spawn: S) -> Result<Self, (PoolError, Setup<T>)>
    where
        S: FnOnce(&Arc<Core<T>>) -> PoolResult<(GrowthSignal, ReaperHandle)>,
    {
        let Setup { config, hooks } = setup;
        let core = Arc::new(Core::new(name.to_string(), config, factory).with_hooks(hooks));

        match spawn(&core) {
            Ok((growth, reaper)) => {
                growth.request();
                Ok(Self {
                    core,
                    growth,
                    _reaper: reaper,
                })
            }
            Err(err) => Err((err, Setup::recover(core))),
        }
    }

    /// Growth demand for one borrow, with the entry request already made
    /// if the store is at or below the growth threshold
    fn demand(&self) -> GrowthDemand<'_, T> {
        let mut demand = GrowthDemand::new(&self.core.grower, &self.growth);
        if self.core.store.available_len() <= self.core.config.growth_threshold {
            demand.request();
        }
        demand
    }

    fn acquire(&self) -> PoolResult<PooledObject<T>> {
        let started = Instant::now();
        let mut demand = self.demand();

        let config = &self.core.config;
        let instance = self.core.store.borrow_within(
            started,
            config.wait_timeout,
            config.wait_poll_interval,
            || demand.on_empty(),
        );
        self.lease_or_timeout(instance, started)
    }

    async fn acquire_async(&self) -> PoolResult<PooledObject<T>> {
        let started = Instant::now();
        let mut demand = self.demand();

        let config = &self.core.config;
        let store = &self.core.store;
        let waited = tokio::time::timeout(config.wait_timeout, async {
            loop {
                if let Some(instance) = store.try_borrow() {
                    return instance;
                }
                demand.on_empty();
                tokio::select! {
                    () = store.notified() => {}
                    () = tokio::time::sleep(config.wait_poll_interval) => {}
                }
            }
        })
        .await;

        self.lease_or_timeout(waited.ok(), started)
    }

    fn lease_or_timeout(&self, instance: Option<Instance<T>>, started: Instant) -> PoolResult<PooledObject<T>> {
        let waited_ms = started.elapsed().as_millis() as u64;
        match instance {
            Some(instance) => {
                self.core.metrics.record_borrowed();
                trace!(pool = %self.core.name, instance = instance.id(), waited_ms, "Instance checked out");
                Ok(PooledObject::new(instance, Arc::clone(&self.core)))
            }
            None => {
                self.core.metrics.record_timeout();
                warn!(pool = %self.core.name, waited_ms, "Timed out waiting for an available instance");
                Err(PoolError::BorrowTimeout(self.core.config.wait_timeout))
            }
        }
    }
}

/// Options and hooks collected before initialization
struct Setup<T> {
    config: PoolConfig,
    hooks: Hooks<T>,
}

impl<T> Setup<T> {
    /// Take the options and hooks back out of a core whose workers never started
    fn recover(core: Arc<Core<T>>) -> Self {
        match Arc::try_unwrap(core) {
            Ok(core) => Self {
                config: core.config,
                hooks: core.hooks,
            },
            Err(shared) => Self {
                config: shared.config.clone(),
                hooks: Hooks::default(),
            },
        }
    }
}

struct PoolInner<T> {
    name: String,
    setup: Mutex<Option<Setup<T>>>,
    runtime: OnceLock<Runtime<T>>,
}

/// A named, bounded pool of reusable instances
///
/// Cloning a `Pool` yields another handle to the same pool.
///
/// # Examples
///
/// ```
/// use elastic_pool::{Pool, PoolConfig};
/// use std::time::Duration;
///
/// let pool = Pool::with_config(
///     "buffers",
///     PoolConfig::new()
///         .with_max_pool_size(4)
///         .with_min_pool_size(1)
///         .with_wait_timeout(Duration::from_secs(5)),
/// );
/// pool.before(|buf: &mut Vec<u8>| {
///     buf.clear();
///     Ok(())
/// })
/// .unwrap();
/// pool.initialize(|| Ok(Vec::with_capacity(1024))).unwrap();
///
/// let len = pool
///     .execute(|buf| {
///         buf.extend_from_slice(b"hello");
///         Ok(buf.len())
///     })
///     .unwrap();
/// assert_eq!(len, 5);
/// assert_eq!(pool.on_loan_count(), 0);
/// ```
pub struct Pool<T> {
    inner: Arc<PoolInner<T>>,
}

impl<T> Clone for Pool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("name", &self.inner.name)
            .field("initialized", &self.inner.runtime.get().is_some())
            .finish()
    }
}

impl<T: Send + 'static> Pool<T> {
    /// Create an uninitialized pool with default options
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, PoolConfig::default())
    }

    /// Create an uninitialized pool with the given options
    pub fn with_config(name: impl Into<String>, config: PoolConfig) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                name: name.into(),
                setup: Mutex::new(Some(Setup {
                    config,
                    hooks: Hooks::default(),
                })),
                runtime: OnceLock::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.runtime.get().is_some()
    }

    /// Current options; frozen once the pool is initialized
    pub fn config(&self) -> PoolConfig {
        let setup = self.inner.setup.lock();
        match setup.as_ref() {
            Some(setup) => setup.config.clone(),
            None => self
                .inner
                .runtime
                .get()
                .map(|runtime| runtime.core.config.clone())
                .unwrap_or_default(),
        }
    }

    fn configure(&self, apply: impl FnOnce(&mut Setup<T>) -> PoolResult<()>) -> PoolResult<&Self> {
        let mut slot = self.inner.setup.lock();
        let setup = slot
            .as_mut()
            .ok_or_else(|| PoolError::ConfigurationAfterInit(self.inner.name.clone()))?;
        apply(setup)?;
        Ok(self)
    }

    /// Replace every option at once
    pub fn set_config(&self, config: PoolConfig) -> PoolResult<&Self> {
        self.configure(|setup| {
            setup.config = config;
            Ok(())
        })
    }

    pub fn set_max_pool_size(&self, size: usize) -> PoolResult<&Self> {
        self.configure(|setup| {
            setup.config.max_pool_size = size;
            Ok(())
        })
    }

    pub fn set_min_pool_size(&self, size: usize) -> PoolResult<&Self> {
        self.configure(|setup| {
            setup.config.min_pool_size = size;
            Ok(())
        })
    }

    pub fn set_pool_growth_increment(&self, increment: usize) -> PoolResult<&Self> {
        self.configure(|setup| {
            setup.config.pool_growth_increment = increment;
            Ok(())
        })
    }

    pub fn set_growth_threshold(&self, threshold: usize) -> PoolResult<&Self> {
        self.configure(|setup| {
            setup.config.growth_threshold = threshold;
            Ok(())
        })
    }

    pub fn set_wait_poll_interval(&self, interval: Duration) -> PoolResult<&Self> {
        self.configure(|setup| {
            setup.config.wait_poll_interval = interval;
            Ok(())
        })
    }

    pub fn set_wait_timeout(&self, timeout: Duration) -> PoolResult<&Self> {
        self.configure(|setup| {
            setup.config.wait_timeout = timeout;
            Ok(())
        })
    }

    pub fn set_instance_life_expectancy(&self, life: Duration) -> PoolResult<&Self> {
        self.configure(|setup| {
            setup.config.instance_life_expectancy = life;
            Ok(())
        })
    }

    pub fn set_reap_interval(&self, interval: Duration) -> PoolResult<&Self> {
        self.configure(|setup| {
            setup.config.reap_interval = interval;
            Ok(())
        })
    }

    /// Set the hook that runs before every consumer
    pub fn before<F>(&self, hook: F) -> PoolResult<&Self>
    where
        F: Fn(&mut T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let hook: Hook<T> = Box::new(hook);
        self.configure(|setup| register(&mut setup.hooks.before, HookKind::Before, hook))
    }

    /// Set the hook that runs after every successful consumer
    pub fn after<F>(&self, hook: F) -> PoolResult<&Self>
    where
        F: Fn(&mut T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let hook: Hook<T> = Box::new(hook);
        self.configure(|setup| register(&mut setup.hooks.after, HookKind::After, hook))
    }

    /// Set the hook that receives every instance the reaper retires
    pub fn on_destroy<F>(&self, hook: F) -> PoolResult<&Self>
    where
        F: Fn(T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let hook: DestroyHook<T> = Box::new(hook);
        self.configure(|setup| register(&mut setup.hooks.destroy, HookKind::Destroy, hook))
    }

    /// Freeze the options, start the background workers and request the first growth step
    ///
    /// An invalid configuration or a worker thread that fails to start is
    /// reported and leaves the pool configurable.
    pub fn initialize<F>(&self, factory: F) -> PoolResult<&Self>
    where
        F: Fn() -> Result<T, BoxError> + Send + Sync + 'static,
    {
        self.initialize_with(factory, spawn_workers)
    }

    fn initialize_with<F, S>(&self, factory: F, spawn: S) -> PoolResult<&Self>
    where
        F: Fn() -> Result<T, BoxError> + Send + Sync + 'static,
        S: FnOnce(&Arc<Core<T>>) -> PoolResult<(GrowthSignal, ReaperHandle)>,
    {
        let mut slot = self.inner.setup.lock();
        let setup = slot
            .take()
            .ok_or_else(|| PoolError::ConfigurationAfterInit(self.inner.name.clone()))?;
        if let Err(err) = setup.config.validate() {
            *slot = Some(setup);
            return Err(err);
        }

        let runtime = match Runtime::start(&self.inner.name, setup, Box::new(factory), spawn) {
            Ok(runtime) => runtime,
            Err((err, setup)) => {
                *slot = Some(setup);
                error!(pool = %self.inner.name, error = %err, "Pool failed to start");
                return Err(err);
            }
        };
        let config = runtime.core.config.clone();
        if self.inner.runtime.set(runtime).is_err() {
            return Err(PoolError::ConfigurationAfterInit(self.inner.name.clone()));
        }

        info!(
            pool = %self.inner.name,
            max_pool_size = config.max_pool_size,
            min_pool_size = config.min_pool_size,
            pool_growth_increment = config.pool_growth_increment,
            "Pool initialized"
        );
        Ok(self)
    }

    fn runtime(&self) -> PoolResult<&Runtime<T>> {
        self.inner
            .runtime
            .get()
            .ok_or_else(|| PoolError::NotInitialized(self.inner.name.clone()))
    }

    /// Borrow an instance, run the hooks and `consumer` on it, then return it
    ///
    /// Waits up to the configured timeout for an instance. The instance is
    /// back in the pool before any error (or panic) reaches the caller.
    pub fn execute<R, F>(&self, consumer: F) -> PoolResult<R>
    where
        F: FnOnce(&mut T) -> Result<R, BoxError>,
    {
        let runtime = self.runtime()?;
        let mut lease = runtime.acquire()?;
        let result = runtime.core.run_hooked(&mut *lease, consumer);
        drop(lease);

        if let Err(err) = &result {
            debug!(pool = %self.inner.name, error = %err, "Execute failed");
        }
        result
    }

    /// Async variant of [`Pool::execute`]; only the wait is asynchronous
    pub async fn execute_async<R, F>(&self, consumer: F) -> PoolResult<R>
    where
        F: FnOnce(&mut T) -> Result<R, BoxError>,
    {
        let runtime = self.runtime()?;
        let mut lease = runtime.acquire_async().await?;
        let result = runtime.core.run_hooked(&mut *lease, consumer);
        drop(lease);

        if let Err(err) = &result {
            debug!(pool = %self.inner.name, error = %err, "Execute failed");
        }
        result
    }

    /// Borrow an instance without running the hooks
    ///
    /// Waits up to the configured timeout; the instance is returned when the
    /// guard is dropped.
    pub fn acquire(&self) -> PoolResult<PooledObject<T>> {
        self.runtime()?.acquire()
    }

    /// Async variant of [`Pool::acquire`]
    pub async fn acquire_async(&self) -> PoolResult<PooledObject<T>> {
        self.runtime()?.acquire_async().await
    }

    /// Borrow an instance only if one is available right now
    pub fn try_acquire(&self) -> Option<PooledObject<T>> {
        let runtime = self.inner.runtime.get()?;
        let instance = runtime.core.store.try_borrow()?;
        runtime.core.metrics.record_borrowed();
        Some(PooledObject::new(instance, Arc::clone(&runtime.core)))
    }

    /// Run one growth step on the calling thread
    pub fn warmup(&self) -> PoolResult<usize> {
        let core = &self.runtime()?.core;
        Ok(core.grower.maybe_grow(core))
    }

    /// Run one reaper tick on the calling thread
    pub fn reap_now(&self) -> PoolResult<usize> {
        let core = &self.runtime()?.core;
        Ok(reaper::reap(core, Instant::now()))
    }

    fn counts(&self) -> (usize, usize) {
        self.inner
            .runtime
            .get()
            .map(|runtime| runtime.core.store.counts())
            .unwrap_or((0, 0))
    }

    pub fn available_count(&self) -> usize {
        self.counts().0
    }

    pub fn on_loan_count(&self) -> usize {
        self.counts().1
    }

    /// Available plus on-loan instances
    pub fn total_count(&self) -> usize {
        let (available, on_loan) = self.counts();
        available + on_loan
    }

    /// Get pool metrics
    pub fn get_metrics(&self) -> PoolMetrics {
        match self.inner.runtime.get() {
            Some(runtime) => {
                let (available, on_loan) = runtime.core.store.counts();
                runtime
                    .core
                    .metrics
                    .get_metrics(on_loan, available, runtime.core.config.max_pool_size)
            }
            None => MetricsTracker::new().get_metrics(0, 0, self.config().max_pool_size),
        }
    }

    /// Get health status
    pub fn get_health_status(&self) -> HealthStatus {
        let (available, on_loan) = self.counts();
        let config = self.config();
        HealthStatus::new(available, on_loan, config.max_pool_size, config.min_pool_size)
    }

    /// Export metrics
    pub fn export_metrics(&self) -> std::collections::HashMap<String, String> {
        self.get_metrics().export()
    }

    /// Export metrics in Prometheus format
    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&std::collections::HashMap<String, String>>,
    ) -> String {
        MetricsExporter::export_prometheus(&self.get_metrics(), pool_name, tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn test_config() -> PoolConfig {
        PoolConfig::new()
            .with_max_pool_size(4)
            .with_min_pool_size(1)
            .with_pool_growth_increment(2)
            .with_growth_threshold(1)
            .with_wait_poll_interval(Duration::from_millis(10))
            .with_wait_timeout(Duration::from_secs(5))
            .with_reap_interval(Duration::from_secs(3600))
    }

    fn counter_factory() -> impl Fn() -> Result<usize, BoxError> + Send + Sync + 'static {
        let next = AtomicUsize::new(1);
        move || Ok(next.fetch_add(1, Ordering::Relaxed))
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        condition()
    }

    #[test]
    fn test_execute_runs_hooks_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pool = Pool::with_config("hooks", test_config());
        {
            let log = Arc::clone(&log);
            pool.before(move |_: &mut usize| {
                log.lock().push("before");
                Ok(())
            })
            .unwrap();
        }
        {
            let log = Arc::clone(&log);
            pool.after(move |_: &mut usize| {
                log.lock().push("after");
                Ok(())
            })
            .unwrap();
        }
        pool.initialize(counter_factory()).unwrap();

        let doubled = pool
            .execute(|value| {
                log.lock().push("consume");
                Ok(*value * 2)
            })
            .unwrap();

        assert!(doubled >= 2);
        assert_eq!(*log.lock(), vec!["before", "consume", "after"]);
        assert_eq!(pool.on_loan_count(), 0);
    }

    #[test]
    fn test_consumer_failure_returns_instance() {
        let pool = Pool::with_config("failing", test_config());
        pool.initialize(counter_factory()).unwrap();

        let result: PoolResult<()> = pool.execute(|_| Err("query failed".into()));

        assert!(matches!(result, Err(PoolError::ConsumerFailure(_))));
        assert_eq!(pool.on_loan_count(), 0);
        assert!(pool.available_count() >= 1);

        let metrics = pool.get_metrics();
        assert_eq!(metrics.total_borrowed, 1);
        assert_eq!(metrics.total_returned, 1);
    }

    #[test]
    fn test_panicking_consumer_returns_instance() {
        let pool = Pool::with_config("panicking", test_config());
        pool.initialize(counter_factory()).unwrap();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            pool.execute(|_| -> Result<(), BoxError> { panic!("consumer exploded") })
        }));

        assert!(outcome.is_err());
        assert_eq!(pool.on_loan_count(), 0);
        assert!(pool.available_count() >= 1);
    }

    #[test]
    fn test_failing_before_hook_skips_consumer() {
        let pool = Pool::with_config("guarded", test_config());
        pool.before(|_: &mut usize| Err("validation failed".into())).unwrap();
        pool.initialize(counter_factory()).unwrap();

        let mut ran = false;
        let result = pool.execute(|_| {
            ran = true;
            Ok(())
        });

        assert!(matches!(
            result,
            Err(PoolError::HookFailure { hook: HookKind::Before, .. })
        ));
        assert!(!ran);
        assert_eq!(pool.on_loan_count(), 0);
    }

    #[test]
    fn test_failing_after_hook_still_returns_instance() {
        let pool = Pool::with_config("after", test_config());
        pool.after(|_: &mut usize| Err("flush failed".into())).unwrap();
        pool.initialize(counter_factory()).unwrap();

        let result = pool.execute(|value| Ok(*value));

        assert!(matches!(
            result,
            Err(PoolError::HookFailure { hook: HookKind::After, .. })
        ));
        assert_eq!(pool.on_loan_count(), 0);
    }

    #[test]
    fn test_borrow_times_out_on_ungrowable_pool() {
        let config = PoolConfig::new()
            .with_max_pool_size(1)
            .with_min_pool_size(0)
            .with_wait_poll_interval(Duration::from_millis(20))
            .with_wait_timeout(Duration::from_millis(200))
            .with_reap_interval(Duration::from_secs(3600));
        let pool: Pool<usize> = Pool::with_config("unreachable", config);
        pool.initialize(|| Err("database unreachable".into())).unwrap();

        let started = Instant::now();
        let result = pool.execute(|value| Ok(*value));
        let elapsed = started.elapsed();

        assert!(matches!(result, Err(PoolError::BorrowTimeout(timeout)) if timeout == Duration::from_millis(200)));
        assert!(elapsed >= Duration::from_millis(200));
        assert!(elapsed < Duration::from_secs(3));
        assert_eq!(pool.total_count(), 0);
        assert!(wait_until(|| pool.get_metrics().creation_failures > 0));
        assert_eq!(pool.get_metrics().borrow_timeouts, 1);
    }

    #[test]
    fn test_borrow_times_out_while_ceiling_is_on_loan() {
        let config = test_config()
            .with_max_pool_size(1)
            .with_min_pool_size(0)
            .with_wait_timeout(Duration::from_millis(100));
        let pool = Pool::with_config("single", config);
        pool.initialize(counter_factory()).unwrap();

        let held = pool.acquire().unwrap();
        let result = pool.execute(|value| Ok(*value));
        assert!(matches!(result, Err(PoolError::BorrowTimeout(_))));
        assert_eq!(pool.total_count(), 1);

        drop(held);
        assert_eq!(pool.execute(|value| Ok(*value)).unwrap(), 1);
    }

    #[test]
    fn test_configuration_frozen_after_initialize() {
        let pool = Pool::with_config("frozen", test_config());
        pool.initialize(counter_factory()).unwrap();

        assert!(matches!(
            pool.set_max_pool_size(100),
            Err(PoolError::ConfigurationAfterInit(_))
        ));
        assert!(matches!(
            pool.before(|_: &mut usize| Ok(())),
            Err(PoolError::ConfigurationAfterInit(_))
        ));
        assert!(matches!(
            pool.initialize(counter_factory()),
            Err(PoolError::ConfigurationAfterInit(_))
        ));
        assert_eq!(pool.config().max_pool_size, 4);
    }

    #[test]
    fn test_duplicate_hook_registration() {
        let pool: Pool<usize> = Pool::new("hooks-twice");
        pool.on_destroy(|_| Ok(())).unwrap();

        assert!(matches!(
            pool.on_destroy(|_| Ok(())),
            Err(PoolError::DuplicateHookRegistration(HookKind::Destroy))
        ));
        assert!(pool.after(|_| Ok(())).is_ok());
    }

    #[test]
    fn test_invalid_configuration_keeps_pool_configurable() {
        let pool = Pool::new("misconfigured");
        pool.set_max_pool_size(3).unwrap().set_min_pool_size(3).unwrap();

        assert!(matches!(
            pool.initialize(counter_factory()),
            Err(PoolError::InvalidConfiguration(_))
        ));
        assert!(!pool.is_initialized());

        pool.set_min_pool_size(1).unwrap();
        pool.initialize(counter_factory()).unwrap();
        assert!(pool.is_initialized());
    }

    #[test]
    fn test_uninitialized_pool() {
        let pool: Pool<usize> = Pool::new("idle");

        assert!(matches!(
            pool.execute(|value| Ok(*value)),
            Err(PoolError::NotInitialized(_))
        ));
        assert!(pool.try_acquire().is_none());
        assert_eq!(pool.total_count(), 0);
        assert_eq!(pool.get_metrics().max_capacity, 150);
    }

    #[test]
    fn test_concurrent_execute_respects_ceiling() {
        let config = test_config()
            .with_max_pool_size(5)
            .with_growth_threshold(2)
            .with_wait_poll_interval(Duration::from_millis(5));
        let pool = Pool::with_config("busy", config);
        pool.initialize(counter_factory()).unwrap();

        let workers: Vec<_> = (0..16)
            .map(|_| {
                let pool = pool.clone();
                thread::spawn(move || {
                    for _ in 0..25 {
                        pool.execute(|_| {
                            assert!(pool.total_count() <= 5);
                            thread::sleep(Duration::from_millis(1));
                            Ok(())
                        })
                        .unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(pool.on_loan_count(), 0);
        assert!(pool.total_count() <= 5);
        let metrics = pool.get_metrics();
        assert_eq!(metrics.total_borrowed, 400);
        assert_eq!(metrics.total_returned, 400);
    }

    #[test]
    fn test_waiting_borrowers_keep_growth_going() {
        let config = test_config()
            .with_max_pool_size(3)
            .with_min_pool_size(0)
            .with_pool_growth_increment(1)
            .with_growth_threshold(0);
        let pool = Pool::with_config("trickle", config);
        pool.initialize(counter_factory()).unwrap();

        let barrier = Arc::new(Barrier::new(3));
        let borrowers: Vec<_> = (0..3)
            .map(|_| {
                let pool = pool.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    pool.execute(|value| {
                        barrier.wait();
                        Ok(*value)
                    })
                })
            })
            .collect();

        let mut values: Vec<usize> = borrowers
            .into_iter()
            .map(|borrower| borrower.join().unwrap().unwrap())
            .collect();
        values.sort_unstable();

        assert_eq!(values, vec![1, 2, 3]);
        assert_eq!(pool.total_count(), 3);
    }

    #[test]
    fn test_grow_then_shrink_scenario() {
        let config = PoolConfig::new()
            .with_max_pool_size(10)
            .with_min_pool_size(2)
            .with_pool_growth_increment(5)
            .with_growth_threshold(2)
            .with_wait_poll_interval(Duration::from_millis(10))
            .with_wait_timeout(Duration::from_secs(10))
            .with_instance_life_expectancy(Duration::from_millis(100))
            .with_reap_interval(Duration::from_secs(3600));
        let destroyed = Arc::new(Mutex::new(Vec::new()));
        let pool = Pool::with_config("scenario", config);
        {
            let destroyed = Arc::clone(&destroyed);
            pool.on_destroy(move |value: usize| {
                destroyed.lock().push(value);
                Ok(())
            })
            .unwrap();
        }
        pool.initialize(counter_factory()).unwrap();

        assert!(wait_until(|| pool.available_count() == 5));
        assert_eq!(pool.total_count(), 5);

        let barrier = Arc::new(Barrier::new(8));
        let borrowers: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    pool.execute(|value| {
                        barrier.wait();
                        Ok(*value)
                    })
                })
            })
            .collect();
        for borrower in borrowers {
            borrower.join().unwrap().unwrap();
        }

        assert_eq!(pool.total_count(), 10);
        assert_eq!(pool.available_count(), 10);

        thread::sleep(Duration::from_millis(150));
        assert_eq!(pool.reap_now().unwrap(), 8);
        assert_eq!(pool.available_count(), 2);

        let mut destroyed = destroyed.lock().clone();
        destroyed.sort_unstable();
        assert_eq!(destroyed, (1..=8).collect::<Vec<_>>());

        let survivors: Vec<_> = (0..2).filter_map(|_| pool.try_acquire()).collect();
        let mut values: Vec<usize> = survivors.iter().map(|lease| **lease).collect();
        values.sort_unstable();
        assert_eq!(values, vec![9, 10]);
    }

    #[test]
    fn test_lease_reports_instance_identity() {
        let config = test_config().with_max_pool_size(1).with_min_pool_size(0);
        let pool = Pool::with_config("identity", config);
        pool.initialize(counter_factory()).unwrap();

        let mut lease = pool.acquire().unwrap();
        *lease += 100;
        let id = lease.id();
        assert!(lease.created_at() <= Instant::now());
        assert_eq!(pool.on_loan_count(), 1);
        drop(lease);

        let lease = pool.try_acquire().unwrap();
        assert_eq!(lease.id(), id);
        assert!(*lease > 100);
    }

    #[test]
    fn test_health_reflects_load() {
        let config = test_config().with_max_pool_size(2).with_min_pool_size(0);
        let pool = Pool::with_config("health", config);
        pool.initialize(counter_factory()).unwrap();
        assert!(wait_until(|| pool.available_count() == 2));
        assert!(pool.get_health_status().is_healthy());

        let _first = pool.acquire().unwrap();
        let _second = pool.acquire().unwrap();

        let health = pool.get_health_status();
        assert!(!health.is_healthy());
        assert_eq!(health.on_loan_instances, 2);
    }

    #[tokio::test]
    async fn test_acquire_async_wakes_on_return() {
        let config = test_config()
            .with_max_pool_size(1)
            .with_min_pool_size(0)
            .with_wait_poll_interval(Duration::from_secs(1));
        let pool = Pool::with_config("async", config);
        pool.initialize(counter_factory()).unwrap();

        let held = pool.acquire_async().await.unwrap();
        let releaser = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            drop(held);
        });

        let started = Instant::now();
        let lease = pool.acquire_async().await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(900));
        releaser.await.unwrap();

        assert_eq!(pool.on_loan_count(), 1);
        drop(lease);
        assert_eq!(pool.on_loan_count(), 0);
    }

    #[tokio::test]
    async fn test_execute_async_times_out() {
        let config = test_config()
            .with_max_pool_size(1)
            .with_min_pool_size(0)
            .with_wait_timeout(Duration::from_millis(100));
        let pool = Pool::with_config("async-timeout", config);
        pool.initialize(counter_factory()).unwrap();

        let _held = pool.acquire_async().await.unwrap();
        let started = Instant::now();
        let result = pool.execute_async(|value| Ok(*value)).await;

        assert!(matches!(result, Err(PoolError::BorrowTimeout(_))));
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_execute_async_runs_hooks() {
        let pool = Pool::with_config("async-hooks", test_config());
        pool.before(|value: &mut usize| {
            *value += 1000;
            Ok(())
        })
        .unwrap();
        pool.initialize(counter_factory()).unwrap();

        let seen = pool.execute_async(|value| Ok(*value)).await.unwrap();
        assert!(seen > 1000);
    }

    #[test]
    fn test_failing_factory_is_not_retried_every_poll() {
        let calls = Arc::new(AtomicUsize::new(0));
        let config = PoolConfig::new()
            .with_max_pool_size(10)
            .with_min_pool_size(0)
            .with_pool_growth_increment(5)
            .with_wait_poll_interval(Duration::from_millis(10))
            .with_wait_timeout(Duration::from_millis(300))
            .with_reap_interval(Duration::from_secs(3600));
        let pool: Pool<usize> = Pool::with_config("down", config);
        {
            let calls = Arc::clone(&calls);
            pool.initialize(move || {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("connection refused".into())
            })
            .unwrap();
        }
        assert!(wait_until(|| calls.load(Ordering::SeqCst) == 5));

        let result = pool.execute(|value| Ok(*value));
        assert!(matches!(result, Err(PoolError::BorrowTimeout(_))));

        // One step for the borrow, none for its empty polls
        let during_borrow = calls.load(Ordering::SeqCst) - 5;
        assert!(during_borrow <= 5, "factory called {during_borrow} times during one borrow");
    }

    #[test]
    fn test_failed_start_keeps_pool_configurable() {
        let config = test_config().with_max_pool_size(3);
        let pool = Pool::with_config("restartable", config);
        pool.before(|value: &mut usize| {
            *value += 1000;
            Ok(())
        })
        .unwrap();

        let result = pool.initialize_with(counter_factory(), |_| {
            Err(PoolError::WorkerSpawn(std::io::Error::other("thread limit reached")))
        });
        assert!(matches!(result, Err(PoolError::WorkerSpawn(_))));
        assert!(!pool.is_initialized());
        assert_eq!(pool.config().max_pool_size, 3);

        // Hooks registered before the failed start are still in place
        assert!(matches!(
            pool.before(|_: &mut usize| Ok(())),
            Err(PoolError::DuplicateHookRegistration(HookKind::Before))
        ));
        pool.set_max_pool_size(2).unwrap();

        pool.initialize(counter_factory()).unwrap();
        assert_eq!(pool.config().max_pool_size, 2);
        assert!(pool.execute(|value| Ok(*value)).unwrap() > 1000);
    }

    #[tokio::test]
    async fn test_execute_async_consumer_failure_returns_instance() {
        let pool = Pool::with_config("async-failing", test_config());
        pool.initialize(counter_factory()).unwrap();

        let result: PoolResult<()> = pool.execute_async(|_| Err("query failed".into())).await;

        assert!(matches!(result, Err(PoolError::ConsumerFailure(_))));
        assert_eq!(pool.on_loan_count(), 0);
        assert!(pool.available_count() >= 1);

        let metrics = pool.get_metrics();
        assert_eq!(metrics.total_borrowed, 1);
        assert_eq!(metrics.total_returned, 1);
    }

    #[tokio::test]
    async fn test_execute_async_before_hook_failure_skips_consumer() {
        let pool = Pool::with_config("async-guarded", test_config());
        pool.before(|_: &mut usize| Err("validation failed".into())).unwrap();
        pool.initialize(counter_factory()).unwrap();

        let mut ran = false;
        let result = pool
            .execute_async(|_| {
                ran = true;
                Ok(())
            })
            .await;

        assert!(matches!(
            result,
            Err(PoolError::HookFailure { hook: HookKind::Before, .. })
        ));
        assert!(!ran);
        assert_eq!(pool.on_loan_count(), 0);
        assert!(pool.available_count() >= 1);
    }

    #[tokio::test]
    async fn test_dropped_acquire_async_leaks_nothing() {
        let config = test_config().with_max_pool_size(1).with_min_pool_size(0);
        let pool = Pool::with_config("async-cancel", config);
        pool.initialize(counter_factory()).unwrap();

        let held = pool.acquire_async().await.unwrap();
        let abandoned = tokio::time::timeout(Duration::from_millis(50), pool.acquire_async()).await;
        assert!(abandoned.is_err());
        assert_eq!(pool.on_loan_count(), 1);

        drop(held);
        assert_eq!(pool.on_loan_count(), 0);
        assert_eq!(pool.available_count(), 1);

        let lease = pool.acquire_async().await.unwrap();
        assert_eq!(*lease, 1);
        assert_eq!(pool.total_count(), 1);
    }
}
