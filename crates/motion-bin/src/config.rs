//! Layered configuration using Figment
//!
//! Configuration is loaded from:
//! 1. a TOML file (default `config/motion.toml`)
//! 2. environment variables prefixed with `MOTION_`, nested keys split on
//!    `__` (e.g. `MOTION_CONTROLLER__PART=wrist`)
//!
//! # Example
//! ```no_run
//! use motion_bin::MotionConfig;
//!
//! let config = MotionConfig::load()?;
//! config.validate()?;
//! println!("Controller: {}", config.controller.address);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use motion_core::limits::{DEFAULT_SETTLE_TIMEOUT_SECS, DIAL_TIMEOUT, FIVE_DEGREES_RAD};
use motion_driver_mock::SimulationConfig;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Default configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/motion.toml";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "MOTION_";

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MotionConfig {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Controller endpoint
    #[serde(default)]
    pub controller: ControllerSection,
    /// Motion tuning
    #[serde(default)]
    pub motion: MotionSection,
    /// Simulated controller served at the controller address
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Multi-line, coloured
    #[default]
    Pretty,
    /// Single line per event
    Compact,
    /// One JSON object per event
    Json,
}

/// Application-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    #[serde(default = "default_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Where the controller is and how to reach it
#[derive(Debug, Clone, Deserialize)]
pub struct ControllerSection {
    /// Endpoint address
    #[serde(default = "default_address")]
    pub address: String,
    /// Instance name sent with every RPC
    #[serde(default = "default_instance_name")]
    pub instance_name: String,
    /// Position-controlled part moved by skills
    #[serde(default = "default_part")]
    pub part: String,
    /// Dial timeout in milliseconds
    #[serde(default = "default_dial_timeout_ms")]
    pub dial_timeout_ms: u64,
}

/// Motion tuning shared by skills
#[derive(Debug, Clone, Deserialize)]
pub struct MotionSection {
    /// Settle timeout encoded in motion graphs
    #[serde(default = "default_settle_timeout")]
    pub settle_timeout_secs: f64,
    /// Wiggle amplitude in radians
    #[serde(default = "default_wiggle_offset")]
    pub wiggle_offset_rad: f64,
}

// Default value functions
fn default_name() -> String {
    "motion-skills".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_address() -> String {
    "sim://robot_controller".to_string()
}

fn default_instance_name() -> String {
    "robot_controller".to_string()
}

fn default_part() -> String {
    "arm".to_string()
}

fn default_dial_timeout_ms() -> u64 {
    DIAL_TIMEOUT.as_millis() as u64
}

fn default_settle_timeout() -> f64 {
    DEFAULT_SETTLE_TIMEOUT_SECS
}

fn default_wiggle_offset() -> f64 {
    FIVE_DEGREES_RAD
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

impl Default for ControllerSection {
    fn default() -> Self {
        Self {
            address: default_address(),
            instance_name: default_instance_name(),
            part: default_part(),
            dial_timeout_ms: default_dial_timeout_ms(),
        }
    }
}

impl Default for MotionSection {
    fn default() -> Self {
        Self {
            settle_timeout_secs: default_settle_timeout(),
            wiggle_offset_rad: default_wiggle_offset(),
        }
    }
}

impl ControllerSection {
    /// Dial timeout as a duration.
    pub fn dial_timeout(&self) -> Duration {
        Duration::from_millis(self.dial_timeout_ms)
    }
}

impl MotionConfig {
    /// Load from the default file and the environment
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load from a specific file and the environment
    ///
    /// A missing file is not an error; defaults and environment apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, figment::Error> {
        Self::figment(path).extract()
    }

    /// The provider stack used by [`load_from`](Self::load_from).
    pub fn figment<P: AsRef<Path>>(path: P) -> Figment {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            ));
        }

        if self.controller.dial_timeout_ms == 0 {
            return Err("controller.dial_timeout_ms must be positive".to_string());
        }
        let settle = self.motion.settle_timeout_secs;
        if settle.is_nan() || settle <= 0.0 {
            return Err(format!(
                "motion.settle_timeout_secs must be positive, got {}",
                self.motion.settle_timeout_secs
            ));
        }
        if !self.motion.wiggle_offset_rad.is_finite() {
            return Err("motion.wiggle_offset_rad must be finite".to_string());
        }
        if self.simulation.tick_period_us == 0 {
            return Err("simulation.tick_period_us must be positive".to_string());
        }

        let mut names = HashSet::new();
        for part in &self.simulation.parts {
            if !names.insert(&part.name) {
                return Err(format!("Duplicate simulated part: {}", part.name));
            }
            if part.resolved_positions().is_none() {
                return Err(format!(
                    "Simulated part '{}' has {} joints but {} initial positions",
                    part.name,
                    part.joint_count,
                    part.initial_positions.len()
                ));
            }
        }

        Ok(())
    }
}
