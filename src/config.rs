//! Runner configuration
//!
//! ```ignore
//! let config = RunnerConfig::default()
//!     .with_yield_iterations(64)
//!     .with_yield_period_ms(5);
//! config.validate()?;
//! ```
//!
//! Configuration is plain data and can be loaded from JSON; fields left out
//! take their defaults.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use strata_concurrency::DEFAULT_MAX_YIELD_MICROS;

/// Default `get_next` calls between automatic yields
pub const DEFAULT_YIELD_ITERATIONS: u32 = 128;

/// Default time between automatic yields
pub const DEFAULT_YIELD_PERIOD_MS: u64 = 10;

/// How runners driven by the engine yield
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Yield after this many results pulled
    pub yield_iterations: u32,
    /// Yield after this much time, whichever comes first
    pub yield_period_ms: u64,
    /// Upper bound on one suspension
    pub max_yield_micros: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            yield_iterations: DEFAULT_YIELD_ITERATIONS,
            yield_period_ms: DEFAULT_YIELD_PERIOD_MS,
            max_yield_micros: DEFAULT_MAX_YIELD_MICROS,
        }
    }
}

impl RunnerConfig {
    /// Set the iteration count between yields
    pub fn with_yield_iterations(mut self, iterations: u32) -> Self {
        self.yield_iterations = iterations;
        self
    }

    /// Set the time between yields
    pub fn with_yield_period_ms(mut self, period_ms: u64) -> Self {
        self.yield_period_ms = period_ms;
        self
    }

    /// Set the maximum suspension
    pub fn with_max_yield_micros(mut self, micros: u64) -> Self {
        self.max_yield_micros = micros;
        self
    }

    /// Time between yields as a [`Duration`]
    pub fn yield_period(&self) -> Duration {
        Duration::from_millis(self.yield_period_ms)
    }

    /// Parse a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every value is in range
    pub fn validate(&self) -> Result<()> {
        if self.yield_iterations == 0 {
            return Err(Error::InvalidConfig(
                "yield_iterations must be positive".to_string(),
            ));
        }
        if self.yield_period_ms == 0 {
            return Err(Error::InvalidConfig(
                "yield_period_ms must be positive".to_string(),
            ));
        }
        if self.max_yield_micros == 0 {
            return Err(Error::InvalidConfig(
                "max_yield_micros must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
