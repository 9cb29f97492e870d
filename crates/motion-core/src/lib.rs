//! Core types and traits for real-time action/reaction control sessions.
//!
//! This crate holds the pure data model that is shared by the session client,
//! the simulated controller, and the skills built on top of them:
//!
//! - [`action`] / [`graph`] - motion primitive instances and the action graph
//!   uploaded to the controller in one batch
//! - [`condition`] / [`reaction`] - real-time predicates and what happens when
//!   they become true
//! - [`part`] - static part configuration and point-in-time part status
//! - [`event`] - the ordered status/event stream produced by the controller
//! - [`lifecycle`] - the session state machine
//! - [`watcher`] - the client-side (non real-time) callback surface
//! - [`channel`] - the RPC seam between a client and a controller
//! - [`error`] - error taxonomy for controller RPCs and sessions
//!
//! # Two execution domains
//!
//! Everything reachable from [`reaction::RealtimeReaction`] is plain,
//! serializable data evaluated by the controller on every control tick.
//! Watcher callbacks ([`watcher::WatcherCallback`]) are live client code and
//! never leave the process; they are split off from the graph before upload
//! and dispatched by the session's watcher loop.
//!
//! ```rust,ignore
//! use motion_core::prelude::*;
//!
//! let second = ActionId(2);
//! let first_move = Action::new(ActionId(1), point_to_point::ACTION_TYPE_NAME, "arm")
//!     .with_fixed_params(point_to_point::fixed_params(goal, zero_velocity)?)
//!     .with_reaction(Reaction::realtime(Condition::Done, second))
//!     .with_reaction(Reaction::watcher(
//!         Condition::at_least(point_to_point::SETPOINT_DONE_FOR_SECONDS, 2.0),
//!         |_event, control| control.quit_timed_out("failed to reach goal"),
//!     ));
//! ```

pub mod action;
pub mod channel;
pub mod condition;
pub mod error;
pub mod event;
pub mod graph;
pub mod ids;
pub mod lifecycle;
pub mod limits;
pub mod part;
pub mod primitives;
pub mod reaction;
pub mod watcher;

/// Commonly used types, re-exported for `use motion_core::prelude::*`.
pub mod prelude {
    pub use crate::action::{Action, ActionDescriptor, FixedParams};
    pub use crate::channel::{CallContext, ChannelFactory, ControlChannel, EventStream};
    pub use crate::condition::{Condition, SignalSource};
    pub use crate::error::{ControllerError, SessionError, SessionResult};
    pub use crate::event::{ControllerEvent, EventKind};
    pub use crate::graph::{ActionGraph, CompiledGraph};
    pub use crate::ids::{ActionId, ReactionId, RemoteSessionId};
    pub use crate::lifecycle::SessionState;
    pub use crate::part::{ControllerConfig, JointState, PartConfig, PartStatus};
    pub use crate::primitives::point_to_point;
    pub use crate::reaction::{RealtimeReaction, RealtimeResponse, Reaction, Trigger};
    pub use crate::watcher::{LoopControl, WatcherCallback, WatcherEvent, WatcherOutcome};
}
