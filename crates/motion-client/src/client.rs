//! Connections to a controller and the pre-graph RPCs.

use motion_core::channel::{CallContext, ControlChannel, INSTANCE_NAME_KEY, REQUEST_ID_KEY};
use motion_core::error::{ControllerError, SessionError, SessionResult};
use motion_core::part::{ControllerConfig, PartStatus};
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// An open channel to one controller instance.
#[derive(Clone)]
pub struct ControllerConnection {
    channel: Arc<dyn ControlChannel>,
    address: String,
    instance_name: String,
}

impl fmt::Debug for ControllerConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerConnection")
            .field("address", &self.address)
            .field("instance_name", &self.instance_name)
            .finish_non_exhaustive()
    }
}

impl ControllerConnection {
    /// Wrap an already dialed channel.
    pub fn new(
        channel: Arc<dyn ControlChannel>,
        address: impl Into<String>,
        instance_name: impl Into<String>,
    ) -> Self {
        Self {
            channel,
            address: address.into(),
            instance_name: instance_name.into(),
        }
    }

    /// The underlying channel.
    pub fn channel(&self) -> &Arc<dyn ControlChannel> {
        &self.channel
    }

    /// Address this connection was dialed at.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Controller instance name sent with every call.
    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    /// Metadata for one RPC: the instance name and a fresh request id.
    pub fn call_context(&self) -> CallContext {
        CallContext::new()
            .with(INSTANCE_NAME_KEY, self.instance_name.as_str())
            .with(REQUEST_ID_KEY, Uuid::new_v4().to_string())
    }
}

/// Map a failure of a non-streaming call.
pub(crate) fn call_error(err: ControllerError) -> SessionError {
    match err {
        ControllerError::Unavailable(reason) => SessionError::Connection(reason),
        other => SessionError::Controller(other),
    }
}

/// Configuration and status queries made before building a graph.
///
/// Both calls may be slow; make them once per skill invocation and never
/// from inside a watcher callback.
#[derive(Debug, Clone)]
pub struct ControllerClient {
    connection: ControllerConnection,
}

impl ControllerClient {
    /// Client over an open connection.
    pub fn new(connection: ControllerConnection) -> Self {
        Self { connection }
    }

    /// The connection used by this client.
    pub fn connection(&self) -> &ControllerConnection {
        &self.connection
    }

    /// Static controller configuration.
    pub async fn get_config(&self) -> SessionResult<ControllerConfig> {
        let ctx = self.connection.call_context();
        debug!(address = %self.connection.address, "Fetching controller config");
        self.connection
            .channel
            .get_config(&ctx)
            .await
            .map_err(call_error)
    }

    /// Snapshot of one part. Never refreshed; fetch again after any motion.
    pub async fn get_single_part_status(&self, part: &str) -> SessionResult<PartStatus> {
        let ctx = self.connection.call_context();
        debug!(address = %self.connection.address, part, "Fetching part status");
        self.connection
            .channel
            .get_part_status(&ctx, part)
            .await
            .map_err(call_error)
    }
}
