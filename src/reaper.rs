//! Periodic eviction of instances idle past their life expectancy

use std::sync::Weak;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Sender};
use tracing::debug;

use crate::errors::PoolResult;
use crate::pool::Core;

/// Keeps the reaper thread alive; dropping it stops the thread
pub(crate) struct ReaperHandle {
    _shutdown: Sender<()>,
}

/// Start the reaper thread, ticking every `interval`
pub(crate) fn spawn<T: Send + 'static>(
    core: Weak<Core<T>>,
    pool_name: &str,
    interval: Duration,
) -> PoolResult<ReaperHandle> {
    let (shutdown, stopped) = channel::bounded::<()>(0);
    let ticker = channel::tick(interval);
    let name = pool_name.to_string();

    thread::Builder::new()
        .name(format!("{pool_name}-reaper"))
        .spawn(move || {
            loop {
                channel::select! {
                    recv(ticker) -> _ => {
                        let Some(core) = core.upgrade() else {
                            break;
                        };
                        reap(&core, Instant::now());
                    }
                    recv(stopped) -> _ => break,
                }
            }
            debug!(pool = %name, "Reaper stopped");
        })?;

    Ok(ReaperHandle { _shutdown: shutdown })
}

/// Run one reaper tick as of `now` and return how many instances were retired
pub(crate) fn reap<T>(core: &Core<T>, now: Instant) -> usize {
    let candidates = core
        .store
        .snapshot_idle_candidates(now, core.config.instance_life_expectancy);

    let mut evicted = 0;
    for id in candidates {
        // Borrowed since the snapshot, or the floor was reached
        let Some(instance) = core.store.evict(id) else {
            continue;
        };
        evicted += 1;
        core.metrics.record_evicted();
        core.destroy(instance.into_value());
    }

    if evicted > 0 {
        let (available, on_loan) = core.store.counts();
        debug!(pool = %core.name, evicted, available, on_loan, "Retired idle instances");
    }
    evicted
}
