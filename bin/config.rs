//! Configuration for the rigbridge binary.
//!
//! Built-in defaults, optionally overridden by a TOML file, overridden by CLI
//! arguments or their environment variables.

use std::{net::SocketAddr, path::Path, time::Duration};

use clap::Parser;
use rigbridge::DEFAULT_STATUS_PATH;
use serde::{Deserialize, Serialize};

/// CLI arguments for rigbridge.
#[derive(Debug, Parser)]
#[command(name = "rigbridge")]
#[command(about = "Status channel between the test-rig web UI and the rig controller")]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, env = "RIGBRIDGE_CONFIG")]
    pub config: Option<String>,

    /// Address to bind the HTTP server to.
    #[arg(long, env = "RIGBRIDGE_BIND_ADDR")]
    pub bind_addr: Option<SocketAddr>,

    /// Path of the status file shared with the rig controller.
    #[arg(long, env = "RIGBRIDGE_STATUS_FILE")]
    pub status_file: Option<String>,

    /// Interval between progress stream ticks in milliseconds.
    #[arg(long, env = "RIGBRIDGE_STREAM_INTERVAL_MS")]
    pub stream_interval_ms: Option<u64>,

    /// Run a simulated rig controller against the status file.
    #[arg(long, env = "RIGBRIDGE_SIMULATE_CONTROLLER")]
    pub simulate_controller: bool,

    /// Duration of one simulated controller cycle in milliseconds.
    #[arg(long, env = "RIGBRIDGE_CONTROLLER_CYCLE_MS")]
    pub controller_cycle_ms: Option<u64>,
}

/// Configuration for rigbridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address to bind the HTTP server to.
    pub bind_addr: SocketAddr,

    /// Path of the status file shared with the rig controller.
    pub status_file: String,

    /// Interval between progress stream ticks in milliseconds.
    pub stream_interval_ms: u64,

    /// Whether to run the simulated rig controller.
    pub simulate_controller: bool,

    /// Duration of one simulated controller cycle in milliseconds.
    pub controller_cycle_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            status_file: DEFAULT_STATUS_PATH.to_string(),
            stream_interval_ms: 1000,
            simulate_controller: false,
            controller_cycle_ms: 1000,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(ConfigError::Parse)
    }

    /// Load configuration from CLI arguments, optionally overriding with a config file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_cli(Cli::parse())
    }

    /// Resolve configuration from already-parsed CLI arguments.
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        // Start with config file if provided
        let mut config =
            if let Some(ref path) = cli.config { Self::from_file(path)? } else { Self::default() };

        // CLI args override config file values
        if let Some(bind_addr) = cli.bind_addr {
            config.bind_addr = bind_addr;
        }

        if let Some(status_file) = cli.status_file {
            config.status_file = status_file;
        }

        if let Some(ms) = cli.stream_interval_ms {
            config.stream_interval_ms = ms;
        }

        if cli.simulate_controller {
            config.simulate_controller = true;
        }

        if let Some(ms) = cli.controller_cycle_ms {
            config.controller_cycle_ms = ms;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.stream_interval_ms == 0 {
            return Err(ConfigError::Invalid("stream_interval_ms must be positive".to_string()));
        }
        if self.controller_cycle_ms == 0 {
            return Err(ConfigError::Invalid("controller_cycle_ms must be positive".to_string()));
        }
        Ok(())
    }

    /// Returns the stream tick interval.
    pub const fn stream_interval(&self) -> Duration {
        Duration::from_millis(self.stream_interval_ms)
    }

    /// Returns the simulated controller cycle duration.
    pub const fn controller_cycle(&self) -> Duration {
        Duration::from_millis(self.controller_cycle_ms)
    }
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse configuration file.
    #[error("failed to parse config: {0}")]
    Parse(toml::de::Error),

    /// A configuration value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}
