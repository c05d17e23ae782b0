//! Shared store of available instances
//!
//! Every read-then-write on pool membership happens inside one critical
//! section of `state`. Waiting borrowers are woken through a condvar (threads)
//! and a [`Notify`] (tasks) whenever an instance is checked in or inserted.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tokio::sync::Notify;
use tokio::sync::futures::Notified;

use crate::instance::{Instance, InstanceId};

struct StoreState<T> {
    available: Vec<Instance<T>>,
    on_loan: usize,
}

pub(crate) struct PoolStore<T> {
    state: Mutex<StoreState<T>>,
    available_signal: Condvar,
    async_signal: Notify,
    max_pool_size: usize,
    min_pool_size: usize,
}

impl<T> PoolStore<T> {
    pub fn new(max_pool_size: usize, min_pool_size: usize) -> Self {
        Self {
            state: Mutex::new(StoreState {
                available: Vec::with_capacity(max_pool_size),
                on_loan: 0,
            }),
            available_signal: Condvar::new(),
            async_signal: Notify::new(),
            max_pool_size,
            min_pool_size,
        }
    }

    /// Check out the most recently stored instance, if any
    pub fn try_borrow(&self) -> Option<Instance<T>> {
        let mut state = self.state.lock();
        Self::checkout(&mut state)
    }

    /// Check out an instance, waiting up to `timeout` from `started`
    ///
    /// Sleeps at most `poll_interval` between checks and wakes early when an
    /// instance is checked in. `on_empty` runs each time the store is found
    /// empty, with the store unlocked.
    pub fn borrow_within(
        &self,
        started: Instant,
        timeout: Duration,
        poll_interval: Duration,
        mut on_empty: impl FnMut(),
    ) -> Option<Instance<T>> {
        let mut state = self.state.lock();
        loop {
            if let Some(instance) = Self::checkout(&mut state) {
                return Some(instance);
            }
            if started.elapsed() >= timeout {
                return None;
            }
            MutexGuard::unlocked(&mut state, &mut on_empty);
            // An instance may have arrived while unlocked
            if let Some(instance) = Self::checkout(&mut state) {
                return Some(instance);
            }
            let step = poll_interval.min(timeout.saturating_sub(started.elapsed()));
            self.available_signal.wait_for(&mut state, step);
        }
    }

    fn checkout(state: &mut StoreState<T>) -> Option<Instance<T>> {
        let instance = state.available.pop()?;
        state.on_loan += 1;
        Some(instance)
    }

    /// Check an instance back in
    pub fn return_instance(&self, instance: Instance<T>) {
        {
            let mut state = self.state.lock();
            debug_assert!(state.on_loan > 0, "checkin without checkout");
            state.on_loan = state.on_loan.saturating_sub(1);
            state.available.push(instance);
        }
        self.notify_available();
    }

    /// Add a newly created instance; hands it back if the pool is full
    pub fn insert(&self, instance: Instance<T>) -> Result<(), Instance<T>> {
        {
            let mut state = self.state.lock();
            if state.available.len() + state.on_loan >= self.max_pool_size {
                return Err(instance);
            }
            state.available.push(instance);
        }
        self.notify_available();
        Ok(())
    }

    /// Ids of available instances that may be retired at `now`
    ///
    /// The youngest `min_pool_size` instances are never candidates; among the
    /// rest, those at least `life_expectancy` old are returned oldest first.
    /// Equal timestamps are ordered by id.
    pub fn snapshot_idle_candidates(
        &self,
        now: Instant,
        life_expectancy: Duration,
    ) -> Vec<InstanceId> {
        let state = self.state.lock();
        let surplus = state.available.len().saturating_sub(self.min_pool_size);
        if surplus == 0 {
            return Vec::new();
        }

        let mut by_age: Vec<&Instance<T>> = state.available.iter().collect();
        by_age.sort_unstable_by_key(|instance| (instance.created_at(), instance.id()));

        by_age
            .into_iter()
            .take(surplus)
            .filter(|instance| instance.age_at(now) >= life_expectancy)
            .map(Instance::id)
            .collect()
    }

    /// Remove an available instance by id
    ///
    /// No-op if it has since been borrowed or removed, or if the store is
    /// already down to `min_pool_size`.
    pub fn evict(&self, id: InstanceId) -> Option<Instance<T>> {
        let mut state = self.state.lock();
        if state.available.len() <= self.min_pool_size {
            return None;
        }
        let position = state.available.iter().position(|instance| instance.id() == id)?;
        Some(state.available.remove(position))
    }

    /// `(available, on_loan)` read under one lock
    pub fn counts(&self) -> (usize, usize) {
        let state = self.state.lock();
        (state.available.len(), state.on_loan)
    }

    pub fn available_len(&self) -> usize {
        self.state.lock().available.len()
    }

    /// How many more instances fit under the ceiling
    pub fn remaining_capacity(&self) -> usize {
        let (available, on_loan) = self.counts();
        self.max_pool_size.saturating_sub(available + on_loan)
    }

    /// Resolves after the next checkin or insert
    pub fn notified(&self) -> Notified<'_> {
        self.async_signal.notified()
    }

    fn notify_available(&self) {
        self.available_signal.notify_one();
        self.async_signal.notify_one();
    }
}
