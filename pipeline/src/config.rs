//! Pipeline configuration
//!
//! Precedence: built-in defaults < TOML file < `GATE_*` environment variables.
//! Command-line overrides are applied on top by the binary.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigError;
use crate::gate::{ConfidenceGate, DEFAULT_THRESHOLD};

/// Default truncation limit, in whitespace-separated units
pub const DEFAULT_MAX_INPUT_UNITS: usize = 256;

/// Default bound on a single arbitration wait
pub const DEFAULT_ARBITRATION_TIMEOUT_SECS: u64 = 120;

/// Tunables for the decision pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Primary confidences strictly below this trigger the fallback path
    pub threshold: f64,
    /// Input is truncated to this many units before primary classification
    pub max_input_units: usize,
    /// Arbitration waits longer than this resolve via the safe default
    pub arbitration_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            max_input_units: DEFAULT_MAX_INPUT_UNITS,
            arbitration_timeout_secs: DEFAULT_ARBITRATION_TIMEOUT_SECS,
        }
    }
}

impl PipelineConfig {
    /// Parse from TOML text; missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `GATE_*` overrides from the process environment.
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (tests inject a map here).
    pub fn with_env_from<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("GATE_THRESHOLD") {
            self.threshold = parse_env("GATE_THRESHOLD", &v)?;
        }
        if let Some(v) = lookup("GATE_MAX_INPUT_UNITS") {
            self.max_input_units = parse_env("GATE_MAX_INPUT_UNITS", &v)?;
        }
        if let Some(v) = lookup("GATE_ARBITRATION_TIMEOUT_SECS") {
            self.arbitration_timeout_secs = parse_env("GATE_ARBITRATION_TIMEOUT_SECS", &v)?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfidenceGate::new(self.threshold)?;
        if self.max_input_units == 0 {
            return Err(ConfigError::InvalidMaxInputUnits);
        }
        Ok(())
    }

    pub fn gate(&self) -> Result<ConfidenceGate, ConfigError> {
        ConfidenceGate::new(self.threshold)
    }

    pub fn arbitration_timeout(&self) -> Duration {
        Duration::from_secs(self.arbitration_timeout_secs)
    }
}

pub(crate) fn parse_env<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var: var.to_string(),
        value: value.to_string(),
    })
}
