//! Driver startup options.
//!
//! `Options` is the immutable configuration value handed to `initialize`.
//! The controller reads only `call_shutdown_at_exit` and
//! `shutdown_grace_period`; everything under `params` passes through to
//! the driver untouched.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Default grace period for a single shutdown attempt.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(30);

/// Driver parameter value types.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    /// Floating-point value.
    Float(f64),

    /// Integer value.
    Integer(i64),

    /// String value.
    String(String),

    /// Boolean value.
    Boolean(bool),
}

impl ParamValue {
    /// Try to extract as f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Try to extract as i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            Self::Float(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// Try to extract as string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to extract as bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            Self::Integer(i) => Some(*i != 0),
            _ => None,
        }
    }
}

/// Startup options for the embedded driver.
///
/// Build with `Options::default()` and refine with the `with_*` setters.
/// The value is treated as immutable once handed to `initialize`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Options {
    /// Register a process-exit hook that performs the shutdown call.
    ///
    /// When set, the scoped guard owes no shutdown of its own; the hook
    /// carries the obligation instead.
    #[serde(default)]
    pub call_shutdown_at_exit: bool,

    /// Maximum time a single shutdown call waits for the driver to drain.
    ///
    /// Zero is legal and makes each shutdown call a poll: it reaps a
    /// finished drain immediately or reports the time limit exceeded.
    #[serde(default = "default_grace_period")]
    pub shutdown_grace_period: Duration,

    /// Driver-specific parameters, passed through opaquely.
    #[serde(default)]
    pub params: HashMap<String, ParamValue>,
}

fn default_grace_period() -> Duration {
    DEFAULT_GRACE_PERIOD
}

impl Default for Options {
    fn default() -> Self {
        Self {
            call_shutdown_at_exit: false,
            shutdown_grace_period: DEFAULT_GRACE_PERIOD,
            params: HashMap::new(),
        }
    }
}

impl Options {
    /// Create default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether shutdown runs automatically at process exit.
    pub fn with_call_shutdown_at_exit(mut self, value: bool) -> Self {
        self.call_shutdown_at_exit = value;
        self
    }

    /// Set the grace period for a single shutdown attempt.
    pub fn with_shutdown_grace_period(mut self, grace: Duration) -> Self {
        self.shutdown_grace_period = grace;
        self
    }

    /// Add a driver parameter.
    pub fn with_param(mut self, name: impl Into<String>, value: ParamValue) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    /// Look up a driver parameter by name.
    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }
}
