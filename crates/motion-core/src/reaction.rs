//! Reactions: a condition bound to exactly one trigger.
//!
//! The client composes [`Reaction`]s, whose [`Trigger`] may hold a live
//! closure. Before upload every reaction is split into its real-time half, a
//! serializable [`RealtimeReaction`] that the controller evaluates, and, for
//! watcher triggers, the callback that stays on the client keyed by the
//! reaction's [`ReactionId`].

use crate::condition::Condition;
use crate::ids::{ActionId, ReactionId};
use crate::watcher::{LoopControl, WatcherCallback, WatcherEvent};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What happens when a reaction's condition becomes true.
pub enum Trigger {
    /// Activate another action inside the controller, without a client round
    /// trip.
    RealtimeTransition(ActionId),
    /// Notify the client's watcher loop, which runs the callback.
    Watcher(WatcherCallback),
}

impl fmt::Debug for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::RealtimeTransition(target) => {
                f.debug_tuple("RealtimeTransition").field(target).finish()
            }
            Trigger::Watcher(_) => f.write_str("Watcher(..)"),
        }
    }
}

/// Client-side reaction as attached to an [`Action`](crate::action::Action).
#[derive(Debug)]
pub struct Reaction {
    /// Predicate evaluated by the controller.
    pub condition: Condition,
    /// Response to the predicate becoming true.
    pub trigger: Trigger,
}

impl Reaction {
    /// Reaction that starts `target` in real time.
    pub fn realtime(condition: Condition, target: ActionId) -> Self {
        Self {
            condition,
            trigger: Trigger::RealtimeTransition(target),
        }
    }

    /// Reaction that runs `callback` on the watcher loop.
    pub fn watcher<F>(condition: Condition, callback: F) -> Self
    where
        F: FnMut(&WatcherEvent, &mut LoopControl) + Send + 'static,
    {
        Self {
            condition,
            trigger: Trigger::Watcher(Box::new(callback)),
        }
    }

    /// Target of a realtime transition, if this is one.
    pub fn transition_target(&self) -> Option<ActionId> {
        match self.trigger {
            Trigger::RealtimeTransition(target) => Some(target),
            Trigger::Watcher(_) => None,
        }
    }
}

/// Real-time response of an uploaded reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RealtimeResponse {
    /// Make `target` the active action of the part.
    StartAction {
        /// Action to activate.
        target: ActionId,
    },
    /// Emit a watcher event for the client.
    NotifyWatcher,
}

/// The controller-side half of a reaction. Pure data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeReaction {
    /// Session-unique reaction id.
    pub id: ReactionId,
    /// Predicate evaluated every control tick.
    pub condition: Condition,
    /// What the controller does when the predicate becomes true.
    pub response: RealtimeResponse,
}

impl RealtimeReaction {
    /// Target of a realtime transition, if this is one.
    pub fn transition_target(&self) -> Option<ActionId> {
        match self.response {
            RealtimeResponse::StartAction { target } => Some(target),
            RealtimeResponse::NotifyWatcher => None,
        }
    }
}
