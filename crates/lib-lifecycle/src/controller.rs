//! Driver lifecycle control.
//!
//! This module owns the process-facing init/shutdown state machine:
//!
//! - `Controller` serializes initialize and shutdown behind one mutex
//!   and tracks where the driver is in its life.
//! - Teardown runs on a drain thread so a wedged driver cannot hold the
//!   caller past the grace period. A timed-out drain stays pending and a
//!   later shutdown call waits on that same drain again; a second
//!   teardown is never started.
//! - The process-global controller backs the free `initialize` and
//!   `shutdown` functions and the exit-time hook.

use crate::driver::{Driver, DriverError, DriverFactory};
use crate::error::{LifecycleError, LifecycleResult};
use crate::hook::{ExitHook, ProcessExitHook};
use crate::housekeeper::HousekeeperDriver;
use crate::options::{Options, DEFAULT_GRACE_PERIOD};
use crossbeam::channel::{self, Receiver, RecvTimeoutError};
use std::sync::{Mutex, MutexGuard, OnceLock};
use std::time::Duration;

/// Helper trait to recover from poisoned mutexes.
///
/// If a thread panicked while holding the controller lock, the lock
/// becomes "poisoned". Every state transition completes before the lock
/// is released, so the data is still coherent and we take it back rather
/// than refuse all further teardown.
trait RecoverMutex<T> {
    fn lock_recover(&self) -> MutexGuard<'_, T>;
}

impl<T> RecoverMutex<T> for Mutex<T> {
    fn lock_recover(&self) -> MutexGuard<'_, T> {
        self.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Controller mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

/// Outcome sent by the drain thread when `Driver::stop` finishes.
type DrainResult = Result<(), DriverError>;

/// Where the driver is in its life. Resources ride with the state:
/// only `Initialized` owns a driver, only `ShuttingDown` owns a pending
/// drain.
enum LifecycleState {
    /// No successful initialize yet.
    Uninitialized,

    /// Driver started and serving.
    Initialized { driver: Box<dyn Driver> },

    /// Drain thread running; the receiver yields its outcome.
    ShuttingDown { drain: Receiver<DrainResult> },

    /// Teardown concluded, cleanly or not. Permanent.
    Terminated,
}

struct ControllerInner {
    state: LifecycleState,

    /// Grace period captured from the options that won initialize.
    grace: Duration,

    /// The exit hook owes an automatic shutdown.
    auto_shutdown: bool,
}

/// Serialized init/shutdown gate around one embedded driver.
///
/// All operations are synchronous and blocking. A single internal mutex
/// serializes them: concurrent initialize attempts resolve to one
/// winner, and at most one shutdown attempt is in flight at a time.
///
/// The process-global instance behind [`initialize`] and [`shutdown`]
/// drives the default [`HousekeeperDriver`]; hosts embedding a custom
/// driver build their own controller with a factory.
pub struct Controller {
    inner: Mutex<ControllerInner>,
    factory: DriverFactory,
    exit_hook: Box<dyn ExitHook>,
}

impl Controller {
    /// Create a controller driving the default housekeeper runtime.
    pub fn new() -> Self {
        Self::with_driver_factory(|| Box::new(HousekeeperDriver::new()))
    }

    /// Create a controller with a custom driver factory.
    ///
    /// The factory runs once per initialize attempt; a failed attempt
    /// discards its instance and a retry gets a fresh one.
    pub fn with_driver_factory<F>(factory: F) -> Self
    where
        F: Fn() -> Box<dyn Driver> + Send + Sync + 'static,
    {
        Self {
            inner: Mutex::new(ControllerInner {
                state: LifecycleState::Uninitialized,
                grace: DEFAULT_GRACE_PERIOD,
                auto_shutdown: false,
            }),
            factory: Box::new(factory),
            exit_hook: Box::new(ProcessExitHook),
        }
    }

    /// Replace the exit-hook mechanism.
    ///
    /// The default registers with the C runtime; embedders whose
    /// platform manages teardown differently substitute their own here.
    pub fn with_exit_hook(mut self, exit_hook: Box<dyn ExitHook>) -> Self {
        self.exit_hook = exit_hook;
        self
    }

    /// Bring the driver up.
    ///
    /// Succeeds at most once per controller. On success the driver is
    /// running and the caller owes it exactly one later `shutdown`. On
    /// failure the controller rolls back to its pristine state and a
    /// corrected attempt may try again; nothing is partially configured
    /// in between.
    ///
    /// Call this from `main` onward. Do not call it from a static
    /// initializer: the driver may touch process facilities that are not
    /// up before `main`.
    ///
    /// # Errors
    ///
    /// - `AlreadyInitialized` if a successful initialize already
    ///   happened, including while a shutdown is still in flight.
    /// - `AlreadyTerminated` once a shutdown has concluded; the driver
    ///   is never restartable within the same process.
    /// - `SetupFailure` if exit-hook registration is unavailable, or the
    ///   driver's startup fails or panics.
    pub fn initialize(&self, options: &Options) -> LifecycleResult<()> {
        let mut inner = self.inner.lock_recover();

        match inner.state {
            LifecycleState::Uninitialized => {}
            LifecycleState::Initialized { .. } | LifecycleState::ShuttingDown { .. } => {
                return Err(LifecycleError::AlreadyInitialized);
            }
            LifecycleState::Terminated => return Err(LifecycleError::AlreadyTerminated),
        }

        // The at-exit guarantee must be secured before the driver starts;
        // failing afterwards would leave a running driver nobody owes a
        // shutdown to.
        if options.call_shutdown_at_exit {
            self.exit_hook.register().map_err(|reason| {
                tracing::warn!(%reason, "Exit hook registration failed");
                LifecycleError::setup_failure(format!("Exit hook unavailable: {reason}"))
            })?;
        }

        let mut driver = (self.factory)();
        let started =
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| driver.start(options)));

        match started {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Driver startup failed");
                return Err(LifecycleError::setup_failure(e.to_string()));
            }
            Err(panic) => {
                let message = panic_message(panic);
                tracing::error!(message = %message, "Driver startup panicked");
                return Err(LifecycleError::setup_failure(format!(
                    "Startup panicked: {message}"
                )));
            }
        }

        inner.state = LifecycleState::Initialized { driver };
        inner.grace = options.shutdown_grace_period;
        inner.auto_shutdown = options.call_shutdown_at_exit;

        tracing::info!(
            call_shutdown_at_exit = options.call_shutdown_at_exit,
            grace_ms = options.shutdown_grace_period.as_millis() as u64,
            "Driver initialized"
        );
        Ok(())
    }

    /// Tear the driver down, waiting up to the grace period.
    ///
    /// The drain runs on its own thread; this call waits for its
    /// outcome. If the grace period elapses first, the call returns
    /// `ExceededTimeLimit` while the drain keeps running, and a later
    /// call resumes waiting on it.
    ///
    /// # Errors
    ///
    /// - `NotInitialized` before any successful initialize.
    /// - `AlreadyTerminated` once teardown has concluded.
    /// - `ExceededTimeLimit` if the drain outlived the grace period; the
    ///   only retryable failure.
    /// - `TeardownFailure` if the driver's stop failed or panicked. The
    ///   controller still reaches its terminal state, but resources may
    ///   not have been released; treat the process as suspect.
    pub fn shutdown(&self) -> LifecycleResult<()> {
        let mut inner = self.inner.lock_recover();

        let drain = match std::mem::replace(&mut inner.state, LifecycleState::Terminated) {
            LifecycleState::Uninitialized => {
                inner.state = LifecycleState::Uninitialized;
                return Err(LifecycleError::NotInitialized);
            }
            LifecycleState::Terminated => return Err(LifecycleError::AlreadyTerminated),
            LifecycleState::Initialized { driver } => {
                tracing::debug!("Draining driver");
                spawn_drain(driver)
            }
            LifecycleState::ShuttingDown { drain } => {
                tracing::debug!("Resuming wait on pending drain");
                drain
            }
        };

        let grace = inner.grace;
        match drain.recv_timeout(grace) {
            Ok(Ok(())) => {
                inner.auto_shutdown = false;
                tracing::info!("Driver terminated");
                Ok(())
            }
            Ok(Err(e)) => {
                inner.auto_shutdown = false;
                tracing::error!(error = %e, "Driver teardown failed");
                Err(LifecycleError::teardown_failure(e.to_string()))
            }
            Err(RecvTimeoutError::Timeout) => {
                inner.state = LifecycleState::ShuttingDown { drain };
                tracing::warn!(
                    grace_ms = grace.as_millis() as u64,
                    "Drain still running past grace period"
                );
                Err(LifecycleError::ExceededTimeLimit { grace })
            }
            Err(RecvTimeoutError::Disconnected) => {
                inner.auto_shutdown = false;
                tracing::error!("Drain thread exited without reporting");
                Err(LifecycleError::teardown_failure(
                    "Drain thread exited without reporting",
                ))
            }
        }
    }

    /// One automatic shutdown attempt on behalf of the exit hook.
    ///
    /// Does nothing unless the winning initialize asked for it and the
    /// driver has not already been torn down by hand.
    pub(crate) fn shutdown_at_exit(&self) {
        let armed = {
            let inner = self.inner.lock_recover();
            inner.auto_shutdown
                && matches!(
                    inner.state,
                    LifecycleState::Initialized { .. } | LifecycleState::ShuttingDown { .. }
                )
        };
        if !armed {
            return;
        }

        match self.shutdown() {
            Ok(()) => tracing::info!("Exit-time driver shutdown completed"),
            // Another thread finished the teardown between the armed
            // check and here.
            Err(LifecycleError::AlreadyTerminated) => {}
            Err(e) => tracing::warn!(error = %e, "Exit-time driver shutdown failed"),
        }
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

/// Hand the driver to a detached drain thread.
///
/// The thread reports over a bounded channel; capacity one and a single
/// send mean it never blocks on a receiver that already gave up.
fn spawn_drain(driver: Box<dyn Driver>) -> Receiver<DrainResult> {
    let (tx, rx) = channel::bounded(1);
    std::thread::spawn(move || {
        let outcome =
            match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| driver.stop())) {
                Ok(result) => result,
                Err(panic) => Err(DriverError::Panicked(panic_message(panic))),
            };
        let _ = tx.send(outcome);
    });
    rx
}

/// Extract a printable message from a panic payload.
fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

static GLOBAL: OnceLock<Controller> = OnceLock::new();

/// The process-global controller backing the free functions.
pub(crate) fn global() -> &'static Controller {
    GLOBAL.get_or_init(Controller::new)
}

/// Initialize the process-global driver.
///
/// See [`Controller::initialize`] for the contract. Most hosts should
/// prefer [`DriverGuard::new`](crate::guard::DriverGuard::new), which
/// pairs this call with a scope-bound shutdown obligation.
pub fn initialize(options: &Options) -> LifecycleResult<()> {
    global().initialize(options)
}

/// Shut the process-global driver down.
///
/// See [`Controller::shutdown`] for the contract.
pub fn shutdown() -> LifecycleResult<()> {
    global().shutdown()
}

/// Exit-time entry point, called by the registered hook.
pub(crate) fn run_exit_shutdown() {
    if let Some(controller) = GLOBAL.get() {
        controller.shutdown_at_exit();
    }
}
