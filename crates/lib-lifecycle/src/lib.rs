//! # lib-lifecycle
//!
//! Process-wide lifecycle control for the embedded client driver.
//!
//! This crate owns bringing the driver up and tearing it down:
//!
//! - One-shot `initialize`/`shutdown` gate with a typed state machine
//! - Bounded-wait teardown with a retryable timeout
//! - Optional automatic shutdown at process exit via the C runtime
//! - [`DriverGuard`], an RAII handle binding the teardown to a scope
//! - A pluggable [`Driver`] trait with the housekeeper runtime as the
//!   default implementation
//!
//! # Call ordering
//!
//! The contract mirrors what hosts embedding the driver must uphold:
//!
//! 1. `initialize` succeeds at most once per process and only from
//!    `main` onward, never from a static initializer.
//! 2. Every successful `initialize` obligates exactly one `shutdown`,
//!    discharged by hand, by a [`DriverGuard`], or by the exit hook.
//! 3. `shutdown` waits up to the grace period; a timeout is the one
//!    retryable failure and a retry resumes the same drain.
//! 4. Once `shutdown` concludes the driver is terminated for good; the
//!    process cannot re-initialize it.

pub mod controller;
pub mod driver;
pub mod error;
pub mod guard;
pub mod hook;
pub mod housekeeper;
pub mod options;

pub use controller::{initialize, shutdown, Controller};
pub use driver::{Driver, DriverError, DriverFactory, DriverResult};
pub use error::{LifecycleError, LifecycleResult};
pub use guard::DriverGuard;
pub use hook::{ExitHook, ProcessExitHook};
pub use housekeeper::HousekeeperDriver;
pub use options::{Options, ParamValue, DEFAULT_GRACE_PERIOD};
