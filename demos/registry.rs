//! Named pools shared through a registry

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use elastic_pool::{PoolConfig, PoolError, PoolRegistry};

struct Session {
    user: Option<String>,
    requests: u32,
}

fn main() -> Result<(), PoolError> {
    println!("=== elastic_pool - Registry Example ===\n");

    let registry = Arc::new(PoolRegistry::new());

    let sessions = registry.create_with_config::<Session>(
        "sessions",
        PoolConfig::new()
            .with_max_pool_size(4)
            .with_min_pool_size(1)
            .with_pool_growth_increment(2)
            .with_wait_timeout(Duration::from_secs(1)),
    )?;
    sessions.before(|session| {
        session.user = None;
        Ok(())
    })?;
    sessions.initialize(|| Ok(Session { user: None, requests: 0 }))?;

    registry.create::<Vec<u8>>("buffers")?;

    println!("Registered pools: {:?}", registry.names());
    match registry.create::<Session>("sessions") {
        Err(e) => println!("Second create: {e}"),
        Ok(_) => println!("Second create unexpectedly succeeded"),
    }
    match registry.lookup::<String>("sessions") {
        Err(e) => println!("Wrong type lookup: {e}"),
        Ok(_) => println!("Wrong type lookup unexpectedly succeeded"),
    }

    let handlers: Vec<_> = ["ana", "bo", "cy", "dee", "eli"]
        .into_iter()
        .map(|user| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || -> Result<String, PoolError> {
                let pool = registry.lookup::<Session>("sessions")?;
                pool.execute(|session| {
                    session.user = Some(user.to_string());
                    session.requests += 1;
                    let user = session.user.as_deref().unwrap_or("anonymous");
                    Ok(format!("{user} was request #{}", session.requests))
                })
            })
        })
        .collect();

    for handler in handlers {
        match handler.join() {
            Ok(Ok(served)) => println!("Served: {served}"),
            Ok(Err(e)) => println!("Handler failed: {e}"),
            Err(_) => println!("Handler panicked"),
        }
    }

    let health = sessions.get_health_status();
    println!(
        "\nSessions: {} available, {} on loan, warnings: {:?}",
        health.available_instances, health.on_loan_instances, health.warnings
    );
    Ok(())
}
