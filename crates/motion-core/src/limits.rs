//! Shared timing constants and defaults.
//!
//! Centralizes the timeouts used across the client, the simulated controller
//! and the skills so that they stay consistent.

use std::time::Duration;

// =============================================================================
// Timeout Constants
// =============================================================================

/// Default bound on dialing a controller (5 seconds).
///
/// A dial that does not complete within this window fails the
/// `Disconnected -> Connected` transition with a connection error.
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound on releasing a remote session during shutdown (2 seconds).
pub const SESSION_RELEASE_TIMEOUT: Duration = Duration::from_secs(2);

/// Default settle timeout encoded into motion graphs (2 seconds).
///
/// Compared against `xfa.setpoint_done_for_seconds` by timeout reactions.
pub const DEFAULT_SETTLE_TIMEOUT_SECS: f64 = 2.0;

// =============================================================================
// Controller Defaults
// =============================================================================

/// Default real-time control period of the simulated controller (1 kHz).
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(1);

/// Default number of ticks between periodic part status events.
pub const DEFAULT_STATUS_INTERVAL_TICKS: u64 = 50;

// =============================================================================
// Motion Defaults
// =============================================================================

/// Five degrees in radians, the default wiggle amplitude.
pub const FIVE_DEGREES_RAD: f64 = 0.0872665;
