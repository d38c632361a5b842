//! Harness configuration loading and validation.

use anyhow::{Context, Result};
use lib_lifecycle::{Options, ParamValue};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Top-level harness configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Run name/description.
    pub name: String,

    /// Driver initialization settings.
    #[serde(default)]
    pub driver: DriverSection,

    /// Run-shape parameters.
    #[serde(default)]
    pub run: RunSection,
}

/// Driver initialization settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DriverSection {
    /// Register an automatic shutdown with the C runtime at exit.
    #[serde(default)]
    pub call_shutdown_at_exit: bool,

    /// Grace period for each shutdown attempt (ms).
    #[serde(default = "default_grace_ms")]
    pub shutdown_grace_ms: u64,

    /// Driver parameter overrides. Scalar values only.
    #[serde(default)]
    pub params: HashMap<String, serde_json::Value>,
}

/// Run-shape parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSection {
    /// How long to hold the driver up before draining (ms).
    #[serde(default = "default_hold_ms")]
    pub hold_ms: u64,

    /// How many times to retry a timed-out shutdown.
    #[serde(default = "default_max_retries")]
    pub max_shutdown_retries: u32,
}

fn default_grace_ms() -> u64 { 30_000 }
fn default_hold_ms() -> u64 { 250 }
fn default_max_retries() -> u32 { 3 }

impl Default for DriverSection {
    fn default() -> Self {
        Self {
            call_shutdown_at_exit: false,
            shutdown_grace_ms: default_grace_ms(),
            params: HashMap::new(),
        }
    }
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            hold_ms: default_hold_ms(),
            max_shutdown_retries: default_max_retries(),
        }
    }
}

impl HarnessConfig {
    /// Translate the driver section into library options.
    pub fn driver_options(&self) -> Result<Options> {
        let mut options = Options::new()
            .with_call_shutdown_at_exit(self.driver.call_shutdown_at_exit)
            .with_shutdown_grace_period(Duration::from_millis(self.driver.shutdown_grace_ms));

        for (key, value) in &self.driver.params {
            options = options.with_param(key.clone(), json_to_param(key, value)?);
        }

        Ok(options)
    }
}

/// Map a JSON scalar onto a driver parameter value.
fn json_to_param(key: &str, value: &serde_json::Value) -> Result<ParamValue> {
    match value {
        serde_json::Value::Bool(b) => Ok(ParamValue::Boolean(*b)),
        serde_json::Value::String(s) => Ok(ParamValue::String(s.clone())),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(ParamValue::Integer(i))
            } else if let Some(f) = n.as_f64() {
                Ok(ParamValue::Float(f))
            } else {
                anyhow::bail!("Driver parameter {:?} has an unrepresentable number", key)
            }
        }
        _ => anyhow::bail!(
            "Driver parameter {:?} must be a scalar (boolean, number, or string)",
            key
        ),
    }
}

/// Load configuration from a file.
pub fn load_config(path: &Path) -> Result<HarnessConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: HarnessConfig = if path.extension().map_or(false, |e| e == "json") {
        serde_json::from_str(&content)?
    } else {
        // Assume TOML
        toml::from_str(&content).with_context(|| "Failed to parse config as TOML")?
    };

    validate_config(&config)?;

    Ok(config)
}

/// Validate configuration.
fn validate_config(config: &HarnessConfig) -> Result<()> {
    if config.name.trim().is_empty() {
        anyhow::bail!("Config must carry a non-empty run name");
    }

    // Driver parameters cross the trait boundary as scalars.
    for (key, value) in &config.driver.params {
        if !(value.is_boolean() || value.is_number() || value.is_string()) {
            anyhow::bail!(
                "Driver parameter {:?} must be a scalar (boolean, number, or string)",
                key
            );
        }
    }

    Ok(())
}
