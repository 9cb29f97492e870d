//! Identifier newtypes.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_newtype {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "#{}"), self.0)
            }
        }
    };
}

id_newtype!(
    /// Identifier of an action instance, unique within one session.
    ///
    /// Used by the client to reference actions and by the controller to
    /// address realtime transitions.
    ActionId,
    "action"
);

id_newtype!(
    /// Identifier of a reaction, assigned by the session at upload time.
    ///
    /// The controller echoes it back in watcher events so the client can find
    /// the callback that belongs to the reaction.
    ReactionId,
    "reaction"
);

id_newtype!(
    /// Identifier of a session as known by the controller.
    RemoteSessionId,
    "session"
);

/// Hands out increasing [`ReactionId`]s.
#[derive(Debug, Default)]
pub struct ReactionIdAllocator {
    next: u64,
}

impl ReactionIdAllocator {
    /// Allocator whose first id is `ReactionId(1)`.
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Allocate the next id.
    pub fn allocate(&mut self) -> ReactionId {
        let id = ReactionId(self.next.max(1));
        self.next = id.0 + 1;
        id
    }
}
