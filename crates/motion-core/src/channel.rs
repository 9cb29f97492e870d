//! The RPC seam between a session client and a controller.
//!
//! [`ControlChannel`] is the controller's RPC surface as seen by the client.
//! The wire encoding is the implementor's business; this crate only fixes the
//! operations and their ordering contract. [`ChannelFactory`] opens channels
//! from an equipment address.
//!
//! Every call carries a [`CallContext`] so that the caller can attach
//! metadata such as the controller instance name.

use crate::action::ActionDescriptor;
use crate::error::ControllerError;
use crate::event::ControllerEvent;
use crate::ids::{ActionId, RemoteSessionId};
use crate::part::{ControllerConfig, PartStatus};
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Metadata key carrying the controller instance name.
pub const INSTANCE_NAME_KEY: &str = "x-resource-instance-name";

/// Metadata key carrying a per-call request id.
pub const REQUEST_ID_KEY: &str = "x-request-id";

/// Per-call metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallContext {
    metadata: BTreeMap<String, String>,
}

impl CallContext {
    /// Empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace one metadata entry.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Add or replace one metadata entry in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// Look up a metadata entry.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// Controller instance name, if set.
    pub fn instance_name(&self) -> Option<&str> {
        self.get(INSTANCE_NAME_KEY)
    }

    /// All entries.
    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }
}

/// Ordered stream of controller events for one session.
///
/// Ends (`None`) when the controller closes the stream.
pub type EventStream = BoxStream<'static, ControllerEvent>;

/// RPC surface of a real-time controller.
///
/// # Contract
/// - `add_actions` is atomic: the whole batch is installed or none of it.
/// - `start_actions` is fire-and-forget; further transitions happen inside
///   the controller.
/// - `watch_events` only delivers events produced after it was called.
///   Subscribe before starting actions.
/// - `end_session` releases every part held by the session.
#[async_trait]
pub trait ControlChannel: Send + Sync {
    /// Static controller configuration.
    async fn get_config(&self, ctx: &CallContext) -> Result<ControllerConfig, ControllerError>;

    /// Current status of one part.
    async fn get_part_status(
        &self,
        ctx: &CallContext,
        part: &str,
    ) -> Result<PartStatus, ControllerError>;

    /// Create a remote session.
    async fn open_session(&self, ctx: &CallContext) -> Result<RemoteSessionId, ControllerError>;

    /// Claim exclusive real-time control of `parts`. All or nothing.
    async fn register_parts(
        &self,
        ctx: &CallContext,
        session: RemoteSessionId,
        parts: &[String],
    ) -> Result<(), ControllerError>;

    /// Upload a batch of actions atomically.
    async fn add_actions(
        &self,
        ctx: &CallContext,
        session: RemoteSessionId,
        actions: Vec<ActionDescriptor>,
    ) -> Result<(), ControllerError>;

    /// Activate actions.
    async fn start_actions(
        &self,
        ctx: &CallContext,
        session: RemoteSessionId,
        actions: &[ActionId],
    ) -> Result<(), ControllerError>;

    /// Subscribe to the session's event stream.
    async fn watch_events(
        &self,
        ctx: &CallContext,
        session: RemoteSessionId,
    ) -> Result<EventStream, ControllerError>;

    /// Release the remote session and its parts.
    async fn end_session(
        &self,
        ctx: &CallContext,
        session: RemoteSessionId,
    ) -> Result<(), ControllerError>;
}

/// Opens [`ControlChannel`]s to controller addresses.
#[async_trait]
pub trait ChannelFactory: Send + Sync {
    /// Dial `address`. May block for as long as the transport takes; callers
    /// bound it with their own timeout.
    async fn make_channel(&self, address: &str) -> Result<Arc<dyn ControlChannel>, ControllerError>;
}
