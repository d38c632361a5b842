//! Run orchestration: initialize, hold, drain, report.

use crate::config::HarnessConfig;
use anyhow::Result;
use lib_lifecycle::{DriverGuard, LifecycleError, Options};
use serde::Serialize;
use std::time::{Duration, Instant};

/// Outcome of one harness run.
#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    /// Run name from the configuration.
    pub name: String,

    /// Time spent bringing the driver up (ms).
    pub init_ms: u64,

    /// How long the driver was held before draining (ms).
    pub hold_ms: u64,

    /// Shutdown attempts, including the successful one.
    pub shutdown_attempts: u32,

    /// Whether the driver fully drained.
    pub drained: bool,

    /// Time from the first shutdown attempt to the final outcome (ms).
    pub drain_ms: u64,

    /// The last error observed, if any.
    pub last_error: Option<String>,
}

/// Drives one initialize/hold/shutdown cycle against the process-global
/// controller.
pub struct Harness {
    config: HarnessConfig,
    options: Options,
}

impl Harness {
    /// Create a new harness.
    pub fn new(config: HarnessConfig) -> Result<Self> {
        let options = config.driver_options()?;
        Ok(Self { config, options })
    }

    /// Run the cycle.
    ///
    /// A timed-out shutdown is retried up to the configured limit; every
    /// retry resumes the same drain. Any other shutdown failure ends the
    /// run immediately and is carried in the report.
    pub fn run(&self) -> Result<RunReport> {
        tracing::info!("Starting run: {}", self.config.name);

        let init_start = Instant::now();
        let mut guard = DriverGuard::new(self.options.clone());
        if let Err(e) = guard.status() {
            anyhow::bail!("Driver failed to initialize: {e}");
        }
        let init_ms = init_start.elapsed().as_millis() as u64;

        tracing::info!(hold_ms = self.config.run.hold_ms, "Driver up, holding");
        std::thread::sleep(Duration::from_millis(self.config.run.hold_ms));

        let drain_start = Instant::now();
        let mut attempts = 0;
        let mut drained = false;
        let mut last_error = None;

        while attempts <= self.config.run.max_shutdown_retries {
            attempts += 1;
            match guard.shutdown() {
                Ok(()) => {
                    drained = true;
                    last_error = None;
                    break;
                }
                Err(e @ LifecycleError::ExceededTimeLimit { .. }) => {
                    tracing::warn!(attempt = attempts, error = %e, "Shutdown timed out, retrying");
                    last_error = Some(e.to_string());
                }
                Err(e) => {
                    last_error = Some(e.to_string());
                    break;
                }
            }
        }
        let drain_ms = drain_start.elapsed().as_millis() as u64;

        tracing::info!(drained, attempts, "Run complete");
        Ok(RunReport {
            name: self.config.name.clone(),
            init_ms,
            hold_ms: self.config.run.hold_ms,
            shutdown_attempts: attempts,
            drained,
            drain_ms,
            last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The process-global controller is one-shot, so a single test owns
    // the whole cycle for this test binary.
    #[test]
    fn test_harness_round_trip() {
        let config: HarnessConfig = toml::from_str(
            r#"
            name = "round trip"

            [driver]
            shutdown_grace_ms = 5000

            [driver.params]
            workers = 2
            sweep_interval_ms = 20

            [run]
            hold_ms = 60
            max_shutdown_retries = 3
        "#,
        )
        .unwrap();

        let harness = Harness::new(config).unwrap();
        let report = harness.run().unwrap();

        assert!(report.drained);
        assert_eq!(report.shutdown_attempts, 1);
        assert!(report.last_error.is_none());
    }
}
