//! Real-time conditions.
//!
//! A [`Condition`] is a pure predicate over the signals of the currently
//! active action. It is shipped to the controller as data and evaluated there
//! on every control tick; the client never evaluates conditions itself.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Read access to the signals of one active action.
///
/// Implemented by the controller (or a simulation of it) for whatever state it
/// keeps per action. Unknown signal names return `None`.
pub trait SignalSource {
    /// The built-in done flag of the action.
    fn is_done(&self) -> bool;

    /// Value of a boolean signal.
    fn boolean(&self, name: &str) -> Option<bool>;

    /// Value of a numeric signal.
    fn number(&self, name: &str) -> Option<f64>;
}

/// A boolean predicate over a named real-time signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    /// The action reports that it is done.
    Done,
    /// A boolean signal is `true`.
    BooleanSignalTrue {
        /// Signal name, e.g. `xfa.is_settled`.
        signal: String,
    },
    /// A numeric signal is greater than or equal to a threshold.
    SignalAtLeast {
        /// Signal name, e.g. `xfa.setpoint_done_for_seconds`.
        signal: String,
        /// Inclusive lower bound.
        threshold: f64,
    },
}

impl Condition {
    /// `Done`
    pub fn done() -> Self {
        Condition::Done
    }

    /// `BooleanSignalTrue(signal)`
    pub fn is_true(signal: impl Into<String>) -> Self {
        Condition::BooleanSignalTrue {
            signal: signal.into(),
        }
    }

    /// `SignalAtLeast(signal, threshold)`
    pub fn at_least(signal: impl Into<String>, threshold: f64) -> Self {
        Condition::SignalAtLeast {
            signal: signal.into(),
            threshold,
        }
    }

    /// Name of the signal this condition reads, if any.
    pub fn signal(&self) -> Option<&str> {
        match self {
            Condition::Done => None,
            Condition::BooleanSignalTrue { signal } | Condition::SignalAtLeast { signal, .. } => {
                Some(signal)
            }
        }
    }

    /// Evaluate against the current signal values.
    ///
    /// A signal that the source does not know evaluates to `false`, and so
    /// does a `NaN` numeric value.
    pub fn evaluate(&self, source: &dyn SignalSource) -> bool {
        match self {
            Condition::Done => source.is_done(),
            Condition::BooleanSignalTrue { signal } => source.boolean(signal).unwrap_or(false),
            Condition::SignalAtLeast { signal, threshold } => source
                .number(signal)
                .map(|value| value >= *threshold)
                .unwrap_or(false),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Done => write!(f, "done"),
            Condition::BooleanSignalTrue { signal } => write!(f, "{signal} == true"),
            Condition::SignalAtLeast { signal, threshold } => write!(f, "{signal} >= {threshold}"),
        }
    }
}
