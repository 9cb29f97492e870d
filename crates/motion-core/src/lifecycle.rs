//! Session lifecycle state machine.
//!
//! ```text
//! Disconnected ─▶ Connected ─▶ PartsRegistered ─▶ GraphUploaded ─▶ Running
//!       │              │               │                 │            │
//!       └──────────────┴───────────────┴─────────────────┴────────────┴─▶ Terminated
//! ```
//!
//! Forward transitions are strictly sequential; only termination may be
//! entered from any state.

use std::fmt;

/// State of a control session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No channel to the controller.
    Disconnected,
    /// Channel open, remote session created.
    Connected,
    /// Parts exclusively claimed for this session.
    PartsRegistered,
    /// Action graph accepted by the controller.
    GraphUploaded,
    /// Entry action started; the watcher loop may run.
    Running,
    /// Session released. Terminal.
    Terminated,
}

impl SessionState {
    /// The only state a forward transition may lead to.
    pub fn successor(self) -> Option<SessionState> {
        match self {
            SessionState::Disconnected => Some(SessionState::Connected),
            SessionState::Connected => Some(SessionState::PartsRegistered),
            SessionState::PartsRegistered => Some(SessionState::GraphUploaded),
            SessionState::GraphUploaded => Some(SessionState::Running),
            SessionState::Running => Some(SessionState::Terminated),
            SessionState::Terminated => None,
        }
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        match next {
            SessionState::Terminated => self != SessionState::Terminated,
            _ => self.successor() == Some(next),
        }
    }

    /// `true` once the session has been released.
    pub fn is_terminal(self) -> bool {
        self == SessionState::Terminated
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Disconnected => write!(f, "disconnected"),
            SessionState::Connected => write!(f, "connected"),
            SessionState::PartsRegistered => write!(f, "parts_registered"),
            SessionState::GraphUploaded => write!(f, "graph_uploaded"),
            SessionState::Running => write!(f, "running"),
            SessionState::Terminated => write!(f, "terminated"),
        }
    }
}
