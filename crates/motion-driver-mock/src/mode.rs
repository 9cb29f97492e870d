//! Operational modes for the simulated controller.
//!
//! - **Instant**: ticks back to back, yielding between them; deterministic
//!   and fast, for unit tests
//! - **Realistic**: sleeps one tick period between ticks, for demos and
//!   integration runs

use serde::Deserialize;

/// Operational modes for the simulated controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MockMode {
    /// No wall-clock delay between ticks
    #[default]
    Instant,
    /// One tick period of wall-clock delay between ticks
    Realistic,
}
