//! Process-exit shutdown hook.
//!
//! When `Options::call_shutdown_at_exit` is set, the controller must
//! guarantee one automatic shutdown at process exit. The production
//! mechanism is a C-runtime `atexit` handler; registration happens at
//! most once per process no matter how many initialize attempts ask for
//! it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;

/// Registration seam for the exit-time shutdown call.
///
/// The production implementation registers with the C runtime. Tests
/// substitute recording hooks to drive registration failures.
pub trait ExitHook: Send + Sync {
    /// Register the exit-time callback.
    ///
    /// Must be idempotent: repeated calls report the outcome of the one
    /// real registration.
    fn register(&self) -> Result<(), String>;
}

/// Exit hook backed by `libc::atexit`.
pub struct ProcessExitHook;

static REGISTER: Once = Once::new();
static REGISTERED: AtomicBool = AtomicBool::new(false);

impl ExitHook for ProcessExitHook {
    fn register(&self) -> Result<(), String> {
        REGISTER.call_once(|| {
            // SAFETY: exit_handler is an extern "C" fn taking no
            // arguments, which is the exact shape atexit expects.
            let rc = unsafe { libc::atexit(exit_handler) };
            REGISTERED.store(rc == 0, Ordering::SeqCst);
        });

        if REGISTERED.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err("atexit registration rejected by the C runtime".to_string())
        }
    }
}

/// The registered callback. Runs during process exit, after `main`
/// returns or `exit` is called.
///
/// Unwinding out of an `extern "C"` frame aborts the process, so the
/// whole body is contained.
extern "C" fn exit_handler() {
    let _ = std::panic::catch_unwind(crate::controller::run_exit_shutdown);
}
