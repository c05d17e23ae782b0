//! Small demo binary: registers a buffer pool, drives it from a few threads
//! and prints what the pool looked like afterwards.
//!
//! Set `RUST_LOG=elastic_pool=debug` to watch growth and reaping.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use elastic_pool::{PoolConfig, PoolRegistry};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let registry = Arc::new(PoolRegistry::new());
    let config = PoolConfig::new()
        .with_max_pool_size(8)
        .with_min_pool_size(2)
        .with_pool_growth_increment(3)
        .with_growth_threshold(1)
        .with_wait_timeout(Duration::from_secs(2))
        .with_instance_life_expectancy(Duration::from_millis(300))
        .with_reap_interval(Duration::from_millis(100));

    let pool = registry.create_with_config::<Vec<u8>>("buffers", config)?;
    pool.before(|buf| {
        buf.clear();
        Ok(())
    })?;
    pool.initialize(|| Ok(Vec::with_capacity(4096)))?;

    let workers: Vec<_> = (0..6)
        .map(|worker| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || -> Result<usize, elastic_pool::PoolError> {
                let pool = registry.lookup::<Vec<u8>>("buffers")?;
                let mut written = 0;
                for round in 0..20 {
                    written += pool.execute(|buf| {
                        buf.extend(format!("worker {worker} round {round}").bytes());
                        thread::sleep(Duration::from_millis(5));
                        Ok(buf.len())
                    })?;
                }
                Ok(written)
            })
        })
        .collect();

    let mut total = 0;
    for worker in workers {
        total += worker.join().map_err(|_| "worker thread panicked")??;
    }
    tracing::info!(bytes = total, pool_size = pool.total_count(), "workers finished");

    // Give the reaper time to shrink the pool back to its floor
    thread::sleep(Duration::from_millis(800));

    let health = pool.get_health_status();
    tracing::info!(
        available = health.available_instances,
        on_loan = health.on_loan_instances,
        healthy = health.is_healthy(),
        "pool after idle period"
    );
    print!("{}", pool.export_metrics_prometheus("buffers", None));

    Ok(())
}
