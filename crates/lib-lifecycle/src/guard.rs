//! Scope-bound ownership of the shutdown obligation.
//!
//! A successful initialize leaves the host owing the driver exactly one
//! shutdown. [`DriverGuard`] makes that debt a value: it attempts the
//! initialize on construction, records the outcome, and discharges the
//! shutdown from its destructor unless the host already settled it by
//! hand or routed it to the exit hook.

use crate::controller::{self, Controller};
use crate::error::LifecycleResult;
use crate::options::Options;

/// RAII handle for one initialize attempt and the teardown it may owe.
///
/// Construction performs the initialize and captures its result; the
/// guard is returned either way so the host decides how to react. While
/// an armed guard is alive the driver is running; when it drops, the
/// driver is shut down on a best-effort basis. Destructors cannot
/// return errors, so a failed discharge is reported through the log.
#[must_use = "the guard discharges the driver shutdown when dropped"]
pub struct DriverGuard<'c> {
    controller: &'c Controller,
    status: LifecycleResult<()>,
    owes_shutdown: bool,
}

impl DriverGuard<'static> {
    /// Initialize the process-global driver and bind its teardown to
    /// this guard's scope.
    pub fn new(options: Options) -> Self {
        Self::with_controller(controller::global(), options)
    }
}

impl<'c> DriverGuard<'c> {
    /// Initialize against a specific controller.
    ///
    /// If the options route teardown to the exit hook, the guard stands
    /// down and leaves the obligation there.
    pub fn with_controller(controller: &'c Controller, options: Options) -> Self {
        let hook_owns_shutdown = options.call_shutdown_at_exit;
        let status = controller.initialize(&options);
        let owes_shutdown = status.is_ok() && !hook_owns_shutdown;
        Self {
            controller,
            status,
            owes_shutdown,
        }
    }

    /// The captured outcome of the initialize attempt.
    pub fn status(&self) -> &LifecycleResult<()> {
        &self.status
    }

    /// Whether this guard's initialize attempt won.
    pub fn initialized(&self) -> bool {
        self.status.is_ok()
    }

    /// Require that initialization succeeded.
    ///
    /// # Panics
    ///
    /// Panics with the captured error if the initialize attempt failed.
    pub fn assert_initialized(&self) {
        if let Err(e) = &self.status {
            panic!("Driver failed to initialize: {e}");
        }
    }

    /// Settle the shutdown now instead of at scope exit.
    ///
    /// On success the destructor is disarmed. A retryable failure keeps
    /// the obligation armed so the host (or the destructor) can try
    /// again; any other failure means the controller reached its
    /// terminal state and there is nothing left to discharge.
    ///
    /// # Errors
    ///
    /// Propagates the result of [`Controller::shutdown`].
    pub fn shutdown(&mut self) -> LifecycleResult<()> {
        let result = self.controller.shutdown();
        match &result {
            Ok(()) => self.owes_shutdown = false,
            Err(e) if e.is_retryable() => {}
            Err(_) => self.owes_shutdown = false,
        }
        result
    }
}

impl Drop for DriverGuard<'_> {
    fn drop(&mut self) {
        if !self.owes_shutdown {
            return;
        }
        // Destructors cannot propagate errors; report through the log.
        match self.controller.shutdown() {
            Ok(()) => tracing::debug!("Driver shut down at scope exit"),
            Err(e) => tracing::warn!(error = %e, "Driver shutdown at scope exit failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{Driver, DriverError, DriverResult};
    use crate::error::LifecycleError;
    use crate::hook::ExitHook;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct NullHook;

    impl ExitHook for NullHook {
        fn register(&self) -> Result<(), String> {
            Ok(())
        }
    }

    struct CountingDriver {
        stops: Arc<AtomicUsize>,
        stop_delay: Duration,
    }

    impl Driver for CountingDriver {
        fn start(&mut self, _options: &Options) -> DriverResult<()> {
            Ok(())
        }

        fn stop(self: Box<Self>) -> DriverResult<()> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            if !self.stop_delay.is_zero() {
                std::thread::sleep(self.stop_delay);
            }
            Ok(())
        }
    }

    struct FailingDriver;

    impl Driver for FailingDriver {
        fn start(&mut self, _options: &Options) -> DriverResult<()> {
            Err(DriverError::Setup("no backend".to_string()))
        }

        fn stop(self: Box<Self>) -> DriverResult<()> {
            Ok(())
        }
    }

    struct BrokenStopDriver {
        stops: Arc<AtomicUsize>,
    }

    impl Driver for BrokenStopDriver {
        fn start(&mut self, _options: &Options) -> DriverResult<()> {
            Ok(())
        }

        fn stop(self: Box<Self>) -> DriverResult<()> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            Err(DriverError::Drain("flush failed".to_string()))
        }
    }

    fn controller_with(stops: Arc<AtomicUsize>, stop_delay: Duration) -> Controller {
        Controller::with_driver_factory(move || {
            Box::new(CountingDriver {
                stops: stops.clone(),
                stop_delay,
            })
        })
        .with_exit_hook(Box::new(NullHook))
    }

    #[test]
    fn test_guard_discharges_on_drop() {
        let stops = Arc::new(AtomicUsize::new(0));
        let controller = controller_with(stops.clone(), Duration::ZERO);

        {
            let guard = DriverGuard::with_controller(&controller, Options::default());
            guard.assert_initialized();
            assert_eq!(stops.load(Ordering::SeqCst), 0);
        }

        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert!(matches!(
            controller.shutdown(),
            Err(LifecycleError::AlreadyTerminated)
        ));
    }

    #[test]
    fn test_explicit_shutdown_disarms_the_destructor() {
        let stops = Arc::new(AtomicUsize::new(0));
        let controller = controller_with(stops.clone(), Duration::ZERO);

        {
            let mut guard = DriverGuard::with_controller(&controller, Options::default());
            guard.shutdown().unwrap();
            assert_eq!(stops.load(Ordering::SeqCst), 1);
        }

        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_at_exit_option_leaves_obligation_with_the_hook() {
        let stops = Arc::new(AtomicUsize::new(0));
        let controller = controller_with(stops.clone(), Duration::ZERO);

        {
            let guard = DriverGuard::with_controller(
                &controller,
                Options::default().with_call_shutdown_at_exit(true),
            );
            assert!(guard.initialized());
        }

        // The exit hook owns the teardown now, not the guard.
        assert_eq!(stops.load(Ordering::SeqCst), 0);
        controller.shutdown().unwrap();
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_initialize_arms_nothing() {
        let controller = Controller::with_driver_factory(|| Box::new(FailingDriver))
            .with_exit_hook(Box::new(NullHook));

        {
            let guard = DriverGuard::with_controller(&controller, Options::default());
            assert!(!guard.initialized());
            assert!(matches!(
                guard.status(),
                Err(LifecycleError::SetupFailure { .. })
            ));
        }

        assert!(matches!(
            controller.shutdown(),
            Err(LifecycleError::NotInitialized)
        ));
    }

    #[test]
    fn test_second_guard_captures_already_initialized() {
        let stops = Arc::new(AtomicUsize::new(0));
        let controller = controller_with(stops.clone(), Duration::ZERO);

        let guard = DriverGuard::with_controller(&controller, Options::default());
        assert!(guard.initialized());

        {
            let second = DriverGuard::with_controller(&controller, Options::default());
            assert!(matches!(
                second.status(),
                Err(LifecycleError::AlreadyInitialized)
            ));
        }

        // The losing guard owed nothing.
        assert_eq!(stops.load(Ordering::SeqCst), 0);
        drop(guard);
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[should_panic(expected = "Driver failed to initialize")]
    fn test_assert_initialized_panics_on_failure() {
        let controller = Controller::with_driver_factory(|| Box::new(FailingDriver))
            .with_exit_hook(Box::new(NullHook));
        let guard = DriverGuard::with_controller(&controller, Options::default());
        guard.assert_initialized();
    }

    #[test]
    fn test_timed_out_explicit_shutdown_keeps_the_obligation() {
        let stops = Arc::new(AtomicUsize::new(0));
        let controller = controller_with(stops.clone(), Duration::from_millis(150));

        {
            let mut guard = DriverGuard::with_controller(
                &controller,
                Options::default().with_shutdown_grace_period(Duration::from_millis(20)),
            );
            let err = guard.shutdown().unwrap_err();
            assert!(err.is_retryable());

            // Let the drain finish so the destructor's attempt reaps it.
            std::thread::sleep(Duration::from_millis(300));
        }

        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert!(matches!(
            controller.shutdown(),
            Err(LifecycleError::AlreadyTerminated)
        ));
    }

    #[test]
    fn test_failed_teardown_is_not_retried_by_the_destructor() {
        let stops = Arc::new(AtomicUsize::new(0));
        let controller = {
            let stops = stops.clone();
            Controller::with_driver_factory(move || {
                Box::new(BrokenStopDriver {
                    stops: stops.clone(),
                })
            })
            .with_exit_hook(Box::new(NullHook))
        };

        {
            let mut guard = DriverGuard::with_controller(&controller, Options::default());
            let err = guard.shutdown().unwrap_err();
            assert!(err.is_fatal());
        }

        // One teardown attempt total; the terminal failure stood the
        // guard down.
        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert!(matches!(
            controller.shutdown(),
            Err(LifecycleError::AlreadyTerminated)
        ));
    }

    #[test]
    fn test_guard_discharges_during_unwind() {
        let stops = Arc::new(AtomicUsize::new(0));
        let controller = controller_with(stops.clone(), Duration::ZERO);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let guard = DriverGuard::with_controller(&controller, Options::default());
            guard.assert_initialized();
            panic!("host failure");
        }));

        assert!(result.is_err());
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }
}
