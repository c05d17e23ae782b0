//! Basic usage examples for Pool

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use elastic_pool::{Pool, PoolConfig, PoolError};

fn main() {
    println!("=== elastic_pool - Basic Examples ===\n");

    // Example 1: Execute with hooks
    hooked_execute();

    // Example 2: Leases and try_acquire
    leases();

    // Example 3: Borrow timeout
    borrow_timeout();

    // Example 4: Growth, reaping and metrics
    grow_and_shrink();
}

fn hooked_execute() {
    println!("1. Execute With Hooks:");
    let pool = Pool::new("strings");
    pool.before(|s: &mut String| {
        s.clear();
        Ok(())
    })
    .unwrap();
    pool.after(|s: &mut String| {
        println!("   after hook saw: {s:?}");
        Ok(())
    })
    .unwrap();
    pool.initialize(|| Ok(String::with_capacity(64))).unwrap();

    let len = pool
        .execute(|s| {
            s.push_str("hello pool");
            Ok(s.len())
        })
        .unwrap();
    println!("   Consumer returned: {len}");

    let failed: Result<(), PoolError> = pool.execute(|_| Err("consumer gave up".into()));
    println!("   Failing consumer: {}", failed.unwrap_err());
    println!("   On loan after both calls: {}\n", pool.on_loan_count());
}

fn leases() {
    println!("2. Leases:");
    let config = PoolConfig::new().with_max_pool_size(1).with_min_pool_size(0);
    let pool = Pool::with_config("single", config);
    pool.initialize(|| Ok(42u32)).unwrap();

    let lease = pool.acquire().unwrap();
    println!("   Borrowed instance #{} holding {}", lease.id(), *lease);
    println!("   try_acquire while on loan: {:?}", pool.try_acquire().map(|l| *l));

    drop(lease); // Return instance

    println!("   try_acquire after return: {:?}\n", pool.try_acquire().map(|l| *l));
}

fn borrow_timeout() {
    println!("3. Borrow Timeout:");
    let config = PoolConfig::new()
        .with_max_pool_size(1)
        .with_min_pool_size(0)
        .with_wait_timeout(Duration::from_millis(200));
    let pool = Pool::with_config("tiny", config);
    pool.initialize(|| Ok(0u8)).unwrap();

    let _held = pool.acquire().unwrap();
    match pool.execute(|value| Ok(*value)) {
        Ok(_) => println!("   Unexpectedly borrowed"),
        Err(err) => println!("   {err}\n"),
    }
}

fn grow_and_shrink() {
    println!("4. Growth, Reaping and Metrics:");
    let config = PoolConfig::new()
        .with_max_pool_size(10)
        .with_min_pool_size(2)
        .with_pool_growth_increment(5)
        .with_growth_threshold(2)
        .with_instance_life_expectancy(Duration::from_millis(100))
        .with_reap_interval(Duration::from_secs(3600));
    let pool = Pool::with_config("elastic", config);
    pool.on_destroy(|id: u64| {
        println!("   destroyed instance {id}");
        Ok(())
    })
    .unwrap();
    let counter = AtomicU64::new(0);
    pool.initialize(move || Ok(counter.fetch_add(1, Ordering::Relaxed) + 1))
        .unwrap();
    let added = pool.warmup().unwrap();
    println!("   Warmup added {added} instances, total {}", pool.total_count());

    thread::sleep(Duration::from_millis(150));
    println!("   Reaped {} idle instances", pool.reap_now().unwrap());

    let health = pool.get_health_status();
    println!("   Health: {}", if health.is_healthy { "Healthy" } else { "Unhealthy" });
    println!("   Available: {}, On loan: {}", health.available_instances, health.on_loan_instances);

    let metrics = pool.export_metrics();
    println!("\n   Metrics:");
    for (key, value) in metrics {
        println!("     {key}: {value}");
    }
}
