//! Embedding walkthrough for the driver lifecycle gate.
//!
//! This example demonstrates:
//! 1. Configuring driver options
//! 2. Initializing through a scope-bound guard
//! 3. What a losing second initialize observes
//! 4. Explicit shutdown with the retry loop a host would run
//! 5. The permanent terminal state

use lib_lifecycle::{shutdown, DriverGuard, LifecycleError, Options, ParamValue};
use std::time::Duration;

fn main() -> anyhow::Result<()> {
    println!("=== Driver Lifecycle Embedding Example ===\n");

    let options = Options::new()
        .with_shutdown_grace_period(Duration::from_secs(2))
        .with_param("workers", ParamValue::Integer(2))
        .with_param("sweep_interval_ms", ParamValue::Integer(50));

    println!("Initializing driver (grace 2s, 2 workers, 50 ms sweeps)...");
    let mut guard = DriverGuard::new(options.clone());
    guard.assert_initialized();
    println!("  initialized: {}", guard.initialized());

    // A second attempt anywhere in the process loses the race.
    let second = DriverGuard::new(options);
    match second.status() {
        Err(e) => println!("  second initialize: {e}"),
        Ok(()) => println!("  second initialize: unexpectedly won"),
    }
    drop(second);

    println!("\nHost doing work while the driver serves...");
    std::thread::sleep(Duration::from_millis(300));

    println!("\nShutting down...");
    let mut attempts = 0;
    loop {
        attempts += 1;
        match guard.shutdown() {
            Ok(()) => break,
            Err(e @ LifecycleError::ExceededTimeLimit { .. }) => {
                println!("  attempt {attempts}: {e}, retrying");
            }
            Err(e) => return Err(e.into()),
        }
    }
    println!("  drained after {attempts} attempt(s)");

    println!("\n=== Summary ===");
    match shutdown() {
        Err(LifecycleError::AlreadyTerminated) => {
            println!("Driver lifecycle: PASS - terminal state is permanent");
        }
        other => println!("Driver lifecycle: UNEXPECTED - {other:?}"),
    }

    Ok(())
}
