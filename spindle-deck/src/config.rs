//! Daemon configuration
//!
//! A small optional TOML file covers what the command line does not:
//! the main-loop poll cadence, the event-bus capacity, and the opaque
//! driver options handed through to the audio subsystem. Missing file
//! or missing keys fall back to built-in defaults; a file that exists
//! but does not parse is a configuration error, not a silent default.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use spindle_common::{Error, Result};

use crate::audio::DriverOptions;

/// Daemon configuration, TOML-loadable
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Main-loop cadence between playback-advance steps, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Event-bus capacity (events buffered per subscriber)
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Output driver section
    #[serde(default)]
    pub driver: DriverConfig,
}

/// Driver section of the config file
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DriverConfig {
    /// Opaque options passed through to the audio subsystem unmodified
    #[serde(default)]
    pub options: DriverOptions,
}

fn default_poll_interval_ms() -> u64 {
    50
}

fn default_event_capacity() -> usize {
    64
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            event_capacity: default_event_capacity(),
            driver: DriverConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::BadConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: Config = toml::from_str(&raw).map_err(|e| {
            Error::BadConfig(format!("cannot parse {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(Error::BadConfig(
                "poll_interval_ms must be nonzero".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(Error::BadConfig(
                "event_capacity must be nonzero".to_string(),
            ));
        }
        Ok(())
    }

    /// Poll cadence as a duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
