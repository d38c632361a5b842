//! Default driver implementation: the housekeeper runtime.
//!
//! The feature surface of the embedded driver lives elsewhere; what the
//! lifecycle layer owns is its background machinery. `HousekeeperDriver`
//! runs that machinery: a small pool of worker threads, each sweeping
//! driver-global state on a fixed interval until told to stop.

use crate::driver::{Driver, DriverError, DriverResult};
use crate::options::Options;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Default number of housekeeping workers.
const DEFAULT_WORKERS: usize = 2;

/// Default interval between sweeps.
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_millis(500);

/// Background worker runtime for the embedded driver.
///
/// Recognized parameters:
///
/// - `workers` (integer >= 1): worker thread count
/// - `sweep_interval_ms` (integer >= 1): pause between sweeps
pub struct HousekeeperDriver {
    /// Dropped on stop; workers see the disconnect and exit.
    stop_tx: Option<Sender<()>>,

    /// Worker join handles.
    workers: Vec<JoinHandle<()>>,

    /// Total sweeps across all workers.
    sweeps: Arc<AtomicU64>,
}

impl HousekeeperDriver {
    /// Create an idle housekeeper.
    pub fn new() -> Self {
        Self {
            stop_tx: None,
            workers: Vec::new(),
            sweeps: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Total housekeeping sweeps performed so far.
    pub fn sweep_count(&self) -> u64 {
        self.sweeps.load(Ordering::SeqCst)
    }

    fn worker_count(options: &Options) -> DriverResult<usize> {
        match options.param("workers") {
            None => Ok(DEFAULT_WORKERS),
            Some(v) => match v.as_i64() {
                Some(n) if n >= 1 => Ok(n as usize),
                _ => Err(DriverError::Setup(format!("Invalid worker count: {v:?}"))),
            },
        }
    }

    fn sweep_interval(options: &Options) -> DriverResult<Duration> {
        match options.param("sweep_interval_ms") {
            None => Ok(DEFAULT_SWEEP_INTERVAL),
            Some(v) => match v.as_i64() {
                Some(ms) if ms >= 1 => Ok(Duration::from_millis(ms as u64)),
                _ => Err(DriverError::Setup(format!("Invalid sweep interval: {v:?}"))),
            },
        }
    }
}

impl Default for HousekeeperDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver for HousekeeperDriver {
    fn start(&mut self, options: &Options) -> DriverResult<()> {
        let workers = Self::worker_count(options)?;
        let interval = Self::sweep_interval(options)?;

        let (tx, rx) = channel::bounded::<()>(1);
        self.stop_tx = Some(tx);

        for id in 0..workers {
            let rx = rx.clone();
            let sweeps = self.sweeps.clone();
            self.workers.push(std::thread::spawn(move || {
                worker_loop(id, rx, sweeps, interval);
            }));
        }

        tracing::debug!(
            workers,
            interval_ms = interval.as_millis() as u64,
            "Housekeeper started"
        );
        Ok(())
    }

    fn stop(mut self: Box<Self>) -> DriverResult<()> {
        // Dropping the sender disconnects every worker's receiver.
        drop(self.stop_tx.take());

        let mut failed = 0usize;
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                failed += 1;
            }
        }

        if failed > 0 {
            return Err(DriverError::Drain(format!("{failed} worker(s) panicked")));
        }

        tracing::debug!(
            sweeps = self.sweeps.load(Ordering::SeqCst),
            "Housekeeper drained"
        );
        Ok(())
    }
}

/// One worker: sweep on every tick until the stop channel closes.
fn worker_loop(id: usize, stop_rx: Receiver<()>, sweeps: Arc<AtomicU64>, interval: Duration) {
    loop {
        match stop_rx.recv_timeout(interval) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                sweeps.fetch_add(1, Ordering::SeqCst);
                tracing::trace!(worker = id, "Housekeeping sweep");
            }
        }
    }
}
