//! Configuration of simulated parts and timing.

use crate::mode::MockMode;
use motion_core::limits::{DEFAULT_STATUS_INTERVAL_TICKS, DEFAULT_TICK_PERIOD};
use serde::Deserialize;
use std::time::Duration;

/// How a simulated part follows a point-to-point move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SettleBehavior {
    /// Reaches and settles on the goal on the first tick.
    #[default]
    Settle,
    /// Moves linearly to the goal over `ticks` ticks, then settles.
    Ramp {
        /// Duration of the move in ticks.
        ticks: u64,
    },
    /// The setpoint finishes at once but the joints never settle.
    Stall,
}

/// Configuration of one simulated part.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimulatedPartConfig {
    /// Part name.
    pub name: String,
    /// Number of joints.
    pub joint_count: usize,
    /// Initial joint positions (default: all zero).
    #[serde(default)]
    pub initial_positions: Vec<f64>,
    /// Motion behaviour (default: settle).
    #[serde(default)]
    pub behavior: SettleBehavior,
}

impl SimulatedPartConfig {
    /// Part with `joint_count` joints at zero that settles immediately.
    pub fn new(name: impl Into<String>, joint_count: usize) -> Self {
        Self {
            name: name.into(),
            joint_count,
            initial_positions: Vec::new(),
            behavior: SettleBehavior::default(),
        }
    }

    /// Set initial joint positions.
    pub fn with_positions(mut self, positions: Vec<f64>) -> Self {
        self.initial_positions = positions;
        self
    }

    /// Set motion behaviour.
    pub fn with_behavior(mut self, behavior: SettleBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Initial positions, zero-filled when none were configured.
    ///
    /// Returns `None` if configured positions disagree with the joint count.
    pub fn resolved_positions(&self) -> Option<Vec<f64>> {
        if self.initial_positions.is_empty() {
            Some(vec![0.0; self.joint_count])
        } else if self.initial_positions.len() == self.joint_count {
            Some(self.initial_positions.clone())
        } else {
            None
        }
    }
}

/// Complete simulation configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// Tick pacing.
    #[serde(default)]
    pub mode: MockMode,
    /// Real-time control period in microseconds (default: 1000).
    #[serde(default = "default_tick_period_us")]
    pub tick_period_us: u64,
    /// Ticks between periodic status events (default: 50).
    #[serde(default = "default_status_interval")]
    pub status_interval_ticks: u64,
    /// Simulated parts.
    #[serde(default)]
    pub parts: Vec<SimulatedPartConfig>,
}

fn default_tick_period_us() -> u64 {
    DEFAULT_TICK_PERIOD.as_micros() as u64
}

fn default_status_interval() -> u64 {
    DEFAULT_STATUS_INTERVAL_TICKS
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            mode: MockMode::default(),
            tick_period_us: default_tick_period_us(),
            status_interval_ticks: default_status_interval(),
            parts: Vec::new(),
        }
    }
}

impl SimulationConfig {
    /// Tick period as a duration.
    pub fn tick_period(&self) -> Duration {
        Duration::from_micros(self.tick_period_us)
    }
}
