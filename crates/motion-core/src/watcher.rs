//! Client-side watcher callbacks.
//!
//! Watcher callbacks run in the supervisory (non real-time) domain, on the
//! task that drives the session's watcher loop. They receive the event that
//! triggered them and a [`LoopControl`] owned by the loop, through which they
//! request termination. The control is borrowed for the duration of a single
//! callback, so callbacks of concurrent sessions can never observe each
//! other's flags.

use crate::ids::{ActionId, ReactionId};
use std::fmt;

/// Payload handed to a watcher callback when its reaction fires.
#[derive(Debug, Clone, PartialEq)]
pub struct WatcherEvent {
    /// Part whose action fired the reaction.
    pub part: String,
    /// Controller tick on which the condition became true.
    pub tick: u64,
    /// Action that owns the reaction.
    pub action: ActionId,
    /// The reaction that fired.
    pub reaction: ReactionId,
}

/// Why the watcher loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatcherOutcome {
    /// A callback reported regular completion.
    Finished,
    /// A callback reported that a timeout condition fired.
    ///
    /// This is a normal outcome encoded in the action graph, not a fault.
    TimedOut {
        /// Human readable description supplied by the callback.
        reason: String,
    },
}

impl WatcherOutcome {
    /// `true` for [`WatcherOutcome::Finished`].
    pub fn is_finished(&self) -> bool {
        matches!(self, WatcherOutcome::Finished)
    }
}

impl fmt::Display for WatcherOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatcherOutcome::Finished => write!(f, "finished"),
            WatcherOutcome::TimedOut { reason } => write!(f, "timed out: {reason}"),
        }
    }
}

/// Loop-termination flag owned by one run of the watcher loop.
#[derive(Debug, Default)]
pub struct LoopControl {
    exit: Option<WatcherOutcome>,
    dispatched: usize,
}

impl LoopControl {
    /// Fresh control with no termination requested.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop the loop after the current callback, reporting completion.
    pub fn quit(&mut self) {
        self.request_exit(WatcherOutcome::Finished);
    }

    /// Stop the loop after the current callback, reporting a timeout.
    pub fn quit_timed_out(&mut self, reason: impl Into<String>) {
        self.request_exit(WatcherOutcome::TimedOut {
            reason: reason.into(),
        });
    }

    /// Whether some callback already asked the loop to stop.
    pub fn is_quit_requested(&self) -> bool {
        self.exit.is_some()
    }

    /// Number of callbacks dispatched so far.
    pub fn dispatched(&self) -> usize {
        self.dispatched
    }

    /// Record that one callback has been dispatched.
    pub fn record_dispatch(&mut self) {
        self.dispatched += 1;
    }

    /// Take the requested outcome, if any.
    pub fn take_exit(&mut self) -> Option<WatcherOutcome> {
        self.exit.take()
    }

    // The first request wins; later ones from the same event are ignored.
    fn request_exit(&mut self, outcome: WatcherOutcome) {
        if self.exit.is_none() {
            self.exit = Some(outcome);
        }
    }
}

/// Client code run when a watcher reaction fires.
///
/// Invoked exactly once per firing, synchronously on the watcher loop. Must
/// not block.
pub type WatcherCallback = Box<dyn FnMut(&WatcherEvent, &mut LoopControl) + Send + 'static>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_exit_request_wins() {
        let mut control = LoopControl::new();
        assert!(!control.is_quit_requested());

        control.quit_timed_out("settle timeout");
        control.quit();

        assert!(control.is_quit_requested());
        assert_eq!(
            control.take_exit(),
            Some(WatcherOutcome::TimedOut {
                reason: "settle timeout".into()
            })
        );
        assert!(control.take_exit().is_none());
    }

    #[test]
    fn test_callback_mutates_control() {
        let mut callback: WatcherCallback = Box::new(|event, control| {
            if event.action == ActionId(2) {
                control.quit();
            }
        });
        let mut control = LoopControl::new();
        let event = WatcherEvent {
            part: "arm".into(),
            tick: 3,
            action: ActionId(2),
            reaction: ReactionId(1),
        };
        callback(&event, &mut control);
        assert_eq!(control.take_exit(), Some(WatcherOutcome::Finished));
    }
}
