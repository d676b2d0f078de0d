//! Runtime Configuration
//!
//! Every field has a default, so an empty JSON object (or
//! `RuntimeConfig::default()`) gives the standard behaviour.
//!
//! ```json
//! { "sweep_interval": 256, "warn_readonly_writes": true, "default_flush": "post" }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::reactive::Flush;

/// Upper bound for `sweep_interval`. Larger values effectively disable
/// sweeping and are almost certainly a typo.
const MAX_SWEEP_INTERVAL: usize = 1 << 24;

/// Tunables of a [`Runtime`](crate::reactive::Runtime).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Sweep dead targets after this many newly registered ones. 0 disables
    /// automatic sweeping; `Runtime::sweep` still works.
    pub sweep_interval: usize,

    /// Emit a [`Warning`](crate::error::Warning) when a read-only handle is
    /// written to.
    pub warn_readonly_writes: bool,

    /// Flush timing of watchers that do not pick one.
    pub default_flush: Flush,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            sweep_interval: 1024,
            warn_readonly_writes: true,
            default_flush: Flush::Sync,
        }
    }
}

impl RuntimeConfig {
    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON config from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sweep_interval > MAX_SWEEP_INTERVAL {
            return Err(ConfigError::Invalid {
                field: "sweep_interval",
                reason: format!(
                    "{} exceeds the maximum of {MAX_SWEEP_INTERVAL}; use 0 to disable sweeping",
                    self.sweep_interval
                ),
            });
        }
        Ok(())
    }
}
