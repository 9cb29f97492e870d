//! Part configuration and status snapshots.

use crate::error::ControllerError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sensed state of one joint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct JointState {
    /// Sensed position (rad).
    pub position_sensed: f64,
    /// Sensed velocity (rad/s).
    #[serde(default)]
    pub velocity_sensed: f64,
}

/// Immutable snapshot of a part's joint states.
///
/// Never refreshes itself: after commanding motion, fetch a new snapshot
/// instead of assuming this one is still current.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartStatus {
    /// Part this snapshot belongs to.
    pub part_name: String,
    /// Controller tick at which the snapshot was taken.
    pub tick: u64,
    /// One entry per joint.
    pub joint_states: Vec<JointState>,
}

impl PartStatus {
    /// Snapshot with zero velocity at the given positions.
    pub fn from_positions(part_name: impl Into<String>, tick: u64, positions: &[f64]) -> Self {
        Self {
            part_name: part_name.into(),
            tick,
            joint_states: positions
                .iter()
                .map(|&position_sensed| JointState {
                    position_sensed,
                    velocity_sensed: 0.0,
                })
                .collect(),
        }
    }

    /// Number of joints reported.
    pub fn joint_count(&self) -> usize {
        self.joint_states.len()
    }

    /// Sensed positions, one per joint.
    pub fn positions(&self) -> Vec<f64> {
        self.joint_states.iter().map(|j| j.position_sensed).collect()
    }
}

/// Static configuration of a part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartConfig {
    /// Part name.
    pub name: String,
    /// Number of joints.
    pub joint_count: usize,
    /// Whether the part accepts joint position commands.
    #[serde(default = "default_position_controlled")]
    pub position_controlled: bool,
}

fn default_position_controlled() -> bool {
    true
}

/// Static configuration of a controller instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Real-time control frequency (Hz).
    pub control_frequency_hz: f64,
    /// Parts by name.
    pub parts: BTreeMap<String, PartConfig>,
}

impl ControllerConfig {
    /// Configuration of one part.
    pub fn part_config(&self, name: &str) -> Result<&PartConfig, ControllerError> {
        self.parts
            .get(name)
            .ok_or_else(|| ControllerError::UnknownPart(name.to_string()))
    }

    /// Names of all parts.
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(String::as_str)
    }
}
