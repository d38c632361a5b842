//! Error types for driver lifecycle operations.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during driver lifecycle operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// A successful initialize has already happened in this process.
    #[error("Driver already initialized")]
    AlreadyInitialized,

    /// The driver has been torn down and can never be brought back up.
    #[error("Driver already terminated")]
    AlreadyTerminated,

    /// Shutdown was requested before any successful initialize.
    #[error("Driver not initialized")]
    NotInitialized,

    /// Driver startup failed. The controller rolled back to its pristine
    /// state; nothing is partially configured afterwards.
    #[error("Driver setup failed: {message}")]
    SetupFailure { message: String },

    /// Teardown did not finish within the grace period. The drain keeps
    /// running; calling shutdown again waits on it anew.
    #[error("Shutdown did not complete within {grace:?}")]
    ExceededTimeLimit { grace: Duration },

    /// Teardown reported an error or panicked. Resources may not have
    /// been released.
    #[error("Driver teardown failed: {message}")]
    TeardownFailure { message: String },
}

impl LifecycleError {
    /// Create a setup failure.
    pub fn setup_failure(message: impl Into<String>) -> Self {
        Self::SetupFailure {
            message: message.into(),
        }
    }

    /// Create a teardown failure.
    pub fn teardown_failure(message: impl Into<String>) -> Self {
        Self::TeardownFailure {
            message: message.into(),
        }
    }

    /// Check if the failed operation may be retried.
    ///
    /// Only a timed-out shutdown qualifies: the drain is still running
    /// and a later call can wait for it again. Every other failure is
    /// final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ExceededTimeLimit { .. })
    }

    /// Check if the process should be treated as unsafe to continue in.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::TeardownFailure { .. })
    }
}

/// Result type for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let timeout = LifecycleError::ExceededTimeLimit {
            grace: Duration::from_secs(1),
        };
        assert!(timeout.is_retryable());

        assert!(!LifecycleError::AlreadyInitialized.is_retryable());
        assert!(!LifecycleError::AlreadyTerminated.is_retryable());
        assert!(!LifecycleError::NotInitialized.is_retryable());
        assert!(!LifecycleError::setup_failure("no backend").is_retryable());
        assert!(!LifecycleError::teardown_failure("worker hung").is_retryable());
    }

    #[test]
    fn test_fatal_classification() {
        assert!(LifecycleError::teardown_failure("worker panicked").is_fatal());

        let timeout = LifecycleError::ExceededTimeLimit {
            grace: Duration::from_secs(1),
        };
        assert!(!timeout.is_fatal());
        assert!(!LifecycleError::NotInitialized.is_fatal());
        assert!(!LifecycleError::setup_failure("no backend").is_fatal());
    }

    #[test]
    fn test_display_messages() {
        let e = LifecycleError::setup_failure("bind refused");
        assert_eq!(e.to_string(), "Driver setup failed: bind refused");

        let e = LifecycleError::ExceededTimeLimit {
            grace: Duration::from_millis(250),
        };
        assert!(e.to_string().contains("250ms"));
    }
}
