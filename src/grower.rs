//! Pool growth: creating instances on demand up to the ceiling

use std::sync::Weak;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam::channel::{self, Sender, TrySendError};
use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::errors::{BoxError, PoolError, PoolResult};
use crate::instance::{Instance, InstanceId};
use crate::pool::Core;

pub(crate) type Factory<T> = Box<dyn Fn() -> Result<T, BoxError> + Send + Sync>;

/// Creates instances through the caller's factory, one step at a time
pub(crate) struct Grower<T> {
    factory: Factory<T>,
    step_lock: Mutex<()>,
    next_id: AtomicU64,
    productive_steps: AtomicU64,
}

impl<T> Grower<T> {
    pub fn new(factory: Factory<T>) -> Self {
        Self {
            factory,
            step_lock: Mutex::new(()),
            next_id: AtomicU64::new(0),
            productive_steps: AtomicU64::new(0),
        }
    }

    /// Run one growth step and return how many instances were added
    ///
    /// Steps are serialized, so the capacity read at the start bounds every
    /// insert the step makes.
    pub fn maybe_grow(&self, core: &Core<T>) -> usize {
        let _step = self.step_lock.lock();

        let remaining = core.store.remaining_capacity();
        if remaining == 0 {
            debug!(pool = %core.name, "Pool at capacity, skipping growth");
            return 0;
        }

        let target = core.config.pool_growth_increment.min(remaining);
        let mut created = 0;
        for _ in 0..target {
            let value = match (self.factory)() {
                Ok(value) => value,
                Err(source) => {
                    core.metrics.record_creation_failure();
                    let err = PoolError::InstanceCreationFailure(source);
                    error!(pool = %core.name, error = %err, "Instance creation failed");
                    continue;
                }
            };

            match core.store.insert(Instance::new(self.next_id(), value)) {
                Ok(()) => {
                    created += 1;
                    core.metrics.record_created();
                }
                Err(rejected) => {
                    warn!(pool = %core.name, instance = rejected.id(), "Pool full, discarding new instance");
                    core.destroy(rejected.into_value());
                    break;
                }
            }
        }

        if created > 0 {
            self.productive_steps.fetch_add(1, Ordering::Release);
        }
        let (available, on_loan) = core.store.counts();
        debug!(pool = %core.name, created, target, available, on_loan, "Growth step finished");
        created
    }

    /// Number of finished steps that created at least one instance
    pub fn productive_steps(&self) -> u64 {
        self.productive_steps.load(Ordering::Acquire)
    }

    fn next_id(&self) -> InstanceId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// Handle used to ask the growth worker for another step
///
/// Holds at most one pending request; requests made while one is pending are
/// folded into it.
pub(crate) struct GrowthSignal {
    requests: Sender<()>,
}

impl GrowthSignal {
    pub fn request(&self) {
        match self.requests.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => {
                warn!("Growth worker is gone, request dropped");
            }
        }
    }
}

/// Growth requests made on behalf of one borrow
///
/// The first request goes out when the borrower finds the store low. While
/// it keeps waiting, it asks again only once some step has created an
/// instance since its last request, so a failing factory is retried at the
/// pace of borrows rather than of poll ticks.
pub(crate) struct GrowthDemand<'a, T> {
    grower: &'a Grower<T>,
    signal: &'a GrowthSignal,
    requested_at: Option<u64>,
}

impl<'a, T> GrowthDemand<'a, T> {
    pub fn new(grower: &'a Grower<T>, signal: &'a GrowthSignal) -> Self {
        Self {
            grower,
            signal,
            requested_at: None,
        }
    }

    pub fn request(&mut self) {
        self.requested_at = Some(self.grower.productive_steps());
        self.signal.request();
    }

    /// Called each time the waiting borrower finds the store empty
    pub fn on_empty(&mut self) {
        match self.requested_at {
            Some(seen) if self.grower.productive_steps() <= seen => {}
            _ => self.request(),
        }
    }
}

/// Start the growth worker thread; it stops once the signal is dropped
pub(crate) fn spawn_worker<T: Send + 'static>(core: Weak<Core<T>>, pool_name: &str) -> PoolResult<GrowthSignal> {
    let (requests, pending) = channel::bounded::<()>(1);
    let name = pool_name.to_string();

    thread::Builder::new()
        .name(format!("{pool_name}-grower"))
        .spawn(move || {
            for () in pending.iter() {
                let Some(core) = core.upgrade() else {
                    break;
                };
                core.grower.maybe_grow(&core);
            }
            debug!(pool = %name, "Growth worker stopped");
        })?;

    Ok(GrowthSignal { requests })
}
