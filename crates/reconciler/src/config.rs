//! Engine configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tendril_core::{Error, Result};

/// Configuration for the scheduling loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Minimum remaining slice time, in microseconds, needed to start
    /// another unit of work.
    #[serde(default = "default_min_slice_remaining_us")]
    pub min_slice_remaining_us: u64,

    /// Hard cap on units processed by a single tick.
    #[serde(default)]
    pub max_units_per_tick: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_slice_remaining_us: default_min_slice_remaining_us(),
            max_units_per_tick: None,
        }
    }
}

impl EngineConfig {
    /// Create a config with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config from TOML text and validate it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Toml`] on a parse failure and
    /// [`Error::InvalidConfig`] when a value is out of range.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileReadFailed`] when the file cannot be read, plus
    /// everything [`EngineConfig::from_toml_str`] returns.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| Error::file_read_failed(path, e.to_string()))?;
        Self::from_toml_str(&source)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `max_units_per_tick` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.max_units_per_tick == Some(0) {
            return Err(Error::invalid_config(
                "max_units_per_tick must be greater than 0 when set",
            ));
        }
        Ok(())
    }

    /// Minimum remaining slice time as a duration.
    #[must_use]
    pub const fn min_slice_remaining(&self) -> Duration {
        Duration::from_micros(self.min_slice_remaining_us)
    }
}

const fn default_min_slice_remaining_us() -> u64 {
    1_000 // 1ms
}
