//! Async usage examples

use std::time::Duration;

use elastic_pool::{Pool, PoolConfig};
use tokio::time::sleep;

#[tokio::main]
async fn main() {
    println!("=== elastic_pool - Async Examples ===\n");

    // Example 1: Async execute
    async_execute().await;

    // Example 2: Async with timeout
    async_with_timeout().await;

    // Example 3: Concurrent access
    concurrent_access().await;
}

fn connection_pool(name: &str, max: usize) -> Pool<String> {
    let config = PoolConfig::new()
        .with_max_pool_size(max)
        .with_min_pool_size(0)
        .with_pool_growth_increment(max)
        .with_wait_timeout(Duration::from_millis(500));
    let pool = Pool::with_config(name, config);
    pool.initialize(|| Ok(String::from("connection"))).unwrap();
    pool
}

async fn async_execute() {
    println!("1. Async Execute:");
    let pool = connection_pool("async-exec", 3);

    let reply = pool
        .execute_async(|conn| Ok(format!("{conn} answered")))
        .await
        .unwrap();
    println!("   Got: {reply}\n");
}

async fn async_with_timeout() {
    println!("2. Async With Timeout:");
    let pool = connection_pool("async-timeout", 1);

    let _held = pool.acquire_async().await.unwrap();
    match pool.acquire_async().await {
        Ok(_) => println!("   Unexpectedly got a second connection"),
        Err(e) => println!("   Timed out as expected: {e}\n"),
    }
}

async fn concurrent_access() {
    println!("3. Concurrent Access:");
    let pool = connection_pool("async-shared", 2);

    let mut handles = vec![];
    for i in 0..6 {
        let pool = pool.clone();
        let handle = tokio::spawn(async move {
            let lease = pool.acquire_async().await.unwrap();
            println!("   Task {i} borrowed instance #{}", lease.id());
            sleep(Duration::from_millis(50)).await;
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.await.unwrap();
    }

    let metrics = pool.get_metrics();
    println!(
        "   Borrowed {} times, {} instances created",
        metrics.total_borrowed, metrics.instances_created
    );
}
