//! The controller's status/event stream.
//!
//! Within one part the controller emits events in the order its real-time
//! ticks produced them. Consumers must neither reorder nor drop events.

use crate::ids::{ActionId, ReactionId};
use crate::part::PartStatus;
use crate::watcher::WatcherEvent;
use serde::{Deserialize, Serialize};

/// What happened on a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    /// Periodic part status.
    Status {
        /// Snapshot at this tick.
        status: PartStatus,
    },
    /// The client started an action.
    ActionStarted {
        /// Started action.
        action: ActionId,
    },
    /// A realtime transition moved the part to another action.
    RealtimeTransition {
        /// Reaction that fired.
        reaction: ReactionId,
        /// Previously active action.
        from: ActionId,
        /// Newly active action.
        to: ActionId,
    },
    /// A watcher reaction fired; the client should run its callback.
    WatcherReaction {
        /// Reaction that fired.
        reaction: ReactionId,
        /// Action owning the reaction.
        action: ActionId,
    },
}

/// One entry of the event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerEvent {
    /// Control tick that produced the event.
    pub tick: u64,
    /// Part the event is about.
    pub part: String,
    /// Payload.
    #[serde(flatten)]
    pub kind: EventKind,
}

impl ControllerEvent {
    /// The watcher payload, if this event is a watcher reaction.
    pub fn as_watcher_event(&self) -> Option<WatcherEvent> {
        match self.kind {
            EventKind::WatcherReaction { reaction, action } => Some(WatcherEvent {
                part: self.part.clone(),
                tick: self.tick,
                action,
                reaction,
            }),
            _ => None,
        }
    }

    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self.kind {
            EventKind::Status { .. } => "status",
            EventKind::ActionStarted { .. } => "action_started",
            EventKind::RealtimeTransition { .. } => "realtime_transition",
            EventKind::WatcherReaction { .. } => "watcher_reaction",
        }
    }
}
