//! Error types for controller RPCs and control sessions.
//!
//! Two layers, mirroring the boundary between the controller and its client:
//!
//! - **`ControllerError`**: what the controller (or the transport in front of
//!   it) reports for a single RPC. It knows nothing about which session
//!   transition the caller was attempting.
//! - **`SessionError`**: the caller-facing taxonomy. The session maps each
//!   `ControllerError` according to the operation in flight, e.g. a
//!   `PartClaimed` during registration becomes a `Registration` error and a
//!   `GraphRejected` during upload becomes `UploadRejected`.
//!
//! None of these errors are retried internally. Every error raised by a
//! lifecycle transition is terminal for that transition; the caller decides
//! whether to retry with a fresh session.
//!
//! A settle timeout is *not* an error: it is a reaction encoded in the action
//! graph and surfaces as [`WatcherOutcome::TimedOut`](crate::watcher::WatcherOutcome).

use crate::ids::{ActionId, RemoteSessionId};
use crate::lifecycle::SessionState;
use thiserror::Error;

/// Convenience alias for session-level results.
pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// Error reported by a controller for one RPC.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControllerError {
    /// The controller cannot be reached or has gone away.
    #[error("Controller unavailable: {0}")]
    Unavailable(String),

    /// The session id is not (or no longer) known to the controller.
    #[error("Unknown session: {0}")]
    UnknownSession(RemoteSessionId),

    /// The part does not exist on this controller.
    #[error("Unknown part: {0}")]
    UnknownPart(String),

    /// The action is not part of any graph uploaded to the session.
    #[error("Unknown action: {0}")]
    UnknownAction(ActionId),

    /// The part is exclusively held by another live session.
    #[error("Part '{part}' is already claimed by {holder}")]
    PartClaimed {
        /// Requested part.
        part: String,
        /// Session currently holding it.
        holder: RemoteSessionId,
    },

    /// The uploaded graph was rejected as a whole.
    #[error("Action graph rejected: {0}")]
    GraphRejected(String),

    /// The request is not valid in the session's current remote state.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Caller-facing error of a control session.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Invalid input caught before any session RPC (bad joint index,
    /// parameter/joint count mismatch, unknown entry action).
    ///
    /// **Recovery**: fix the input.
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// The controller could not be reached within the dial timeout, or went
    /// away during a non-streaming call.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A requested part is exclusively held by another session.
    ///
    /// **Recovery**: pick another part or wait for the holder to finish. The
    /// session stays `Connected`.
    #[error("Registration of part '{part}' failed: {reason}")]
    Registration {
        /// Part that could not be claimed.
        part: String,
        /// Controller-provided reason.
        reason: String,
    },

    /// The controller rejected the action graph. No action of the batch was
    /// installed and the session stays `PartsRegistered`.
    #[error("Action graph upload rejected: {0}")]
    UploadRejected(String),

    /// The event stream ended before any callback requested termination.
    ///
    /// Distinct from normal completion: the motion may still be in progress.
    #[error("Event stream closed after {events_received} events before the watcher loop was told to stop")]
    StreamClosed {
        /// Number of events received before the stream ended.
        events_received: usize,
    },

    /// The session has terminated; no further operations are possible.
    #[error("Session closed")]
    SessionClosed,

    /// A lifecycle transition was attempted out of order.
    #[error("Cannot {operation} while session is {state}")]
    OutOfOrder {
        /// Attempted operation.
        operation: &'static str,
        /// State the session was in.
        state: SessionState,
    },

    /// The session was cancelled by its owner.
    #[error("Session cancelled")]
    Cancelled,

    /// Any other controller failure.
    #[error(transparent)]
    Controller(#[from] ControllerError),
}

impl SessionError {
    /// Whether the caller can recover by changing its input and retrying with
    /// a fresh session.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SessionError::Precondition(_) | SessionError::Registration { .. }
        )
    }
}
