//! Integration test for the process-global initialize/shutdown gate.
//!
//! The free functions share one controller per process, so the whole
//! scenario runs as a single test: integration test binaries each get
//! their own process, which is exactly the isolation the one-shot
//! semantics need.
//!
//! Run with: cargo test -p lib-lifecycle --test global_api

use lib_lifecycle::{initialize, shutdown, LifecycleError, Options, ParamValue};
use std::time::Duration;

#[test]
fn test_global_lifecycle_round_trip() {
    // Nothing to shut down before the first initialize.
    assert!(matches!(shutdown(), Err(LifecycleError::NotInitialized)));

    let options = Options::new()
        .with_shutdown_grace_period(Duration::from_secs(5))
        .with_param("workers", ParamValue::Integer(2))
        .with_param("sweep_interval_ms", ParamValue::Integer(20));

    initialize(&options).unwrap();

    // Exactly one successful initialize per process.
    assert!(matches!(
        initialize(&options),
        Err(LifecycleError::AlreadyInitialized)
    ));

    // Let the housekeeper run a few sweeps before tearing down.
    std::thread::sleep(Duration::from_millis(100));

    shutdown().unwrap();

    // Terminated is permanent, in both directions.
    assert!(matches!(shutdown(), Err(LifecycleError::AlreadyTerminated)));
    assert!(matches!(
        initialize(&options),
        Err(LifecycleError::AlreadyTerminated)
    ));
}
