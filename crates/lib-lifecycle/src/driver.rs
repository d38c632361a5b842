//! The driver collaborator seam.
//!
//! The lifecycle layer does not know what the embedded driver actually
//! does. It sees a `Driver`: something it can start once with the
//! caller's options and later stop, blocking until the driver has
//! drained.

use crate::options::Options;
use thiserror::Error;

/// Errors reported by a driver implementation.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Startup could not acquire or configure a required resource.
    #[error("Setup failed: {0}")]
    Setup(String),

    /// Drain did not complete cleanly.
    #[error("Drain failed: {0}")]
    Drain(String),

    /// The driver panicked inside a lifecycle call.
    #[error("Driver panicked: {0}")]
    Panicked(String),
}

/// Result type for driver operations.
pub type DriverResult<T> = Result<T, DriverError>;

/// The embedded driver as the lifecycle controller sees it.
///
/// Implementations own the driver's global machinery (worker threads,
/// sockets, caches). The controller guarantees `start` is called at most
/// once per instance and `stop` consumes the instance, so implementations
/// need no re-entry guards of their own.
///
/// `stop` must block until the driver has fully drained, without a
/// deadline of its own; the controller times the whole drain against the
/// caller's grace period. Neither method may call back into the
/// lifecycle surface.
pub trait Driver: Send {
    /// Start the driver's global machinery.
    fn start(&mut self, options: &Options) -> DriverResult<()>;

    /// Stop the driver, blocking until all background work has drained.
    fn stop(self: Box<Self>) -> DriverResult<()>;
}

/// Factory producing a fresh driver per initialize attempt.
pub type DriverFactory = Box<dyn Fn() -> Box<dyn Driver> + Send + Sync>;
