//! Resolved equipment and dialing.

use crate::client::ControllerConnection;
use motion_core::channel::ChannelFactory;
use motion_core::error::{SessionError, SessionResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{info, warn};

/// A controller resolved for a skill request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentHandle {
    /// Equipment name.
    pub name: String,
    /// Address of the controller endpoint.
    pub address: String,
    /// Controller instance name attached to every RPC.
    pub instance_name: String,
    /// Part of the controller that this equipment moves.
    pub position_part_name: String,
}

impl EquipmentHandle {
    /// Handle whose instance name equals its equipment name.
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        position_part_name: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            instance_name: name.clone(),
            name,
            address: address.into(),
            position_part_name: position_part_name.into(),
        }
    }
}

/// Equipment of one request, keyed by slot name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentPack {
    handles: BTreeMap<String, EquipmentHandle>,
}

impl EquipmentPack {
    /// Empty pack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the handle in `slot`.
    pub fn with(mut self, slot: impl Into<String>, handle: EquipmentHandle) -> Self {
        self.handles.insert(slot.into(), handle);
        self
    }

    /// Handle in `slot`.
    pub fn get(&self, slot: &str) -> Option<&EquipmentHandle> {
        self.handles.get(slot)
    }

    /// Slot names.
    pub fn slots(&self) -> impl Iterator<Item = &str> {
        self.handles.keys().map(String::as_str)
    }
}

/// Dial the controller behind `handle`, giving up after `dial_timeout`.
pub async fn connect_to_equipment(
    factory: &dyn ChannelFactory,
    handle: &EquipmentHandle,
    dial_timeout: Duration,
) -> SessionResult<ControllerConnection> {
    match tokio::time::timeout(dial_timeout, factory.make_channel(&handle.address)).await {
        Ok(Ok(channel)) => {
            info!(equipment = %handle.name, address = %handle.address, "Connected to controller");
            Ok(ControllerConnection::new(
                channel,
                handle.address.clone(),
                handle.instance_name.clone(),
            ))
        }
        Ok(Err(e)) => {
            warn!(equipment = %handle.name, address = %handle.address, error = %e, "Dial failed");
            Err(SessionError::Connection(format!(
                "cannot reach '{}' at {}: {e}",
                handle.name, handle.address
            )))
        }
        Err(_) => {
            warn!(equipment = %handle.name, address = %handle.address, ?dial_timeout, "Dial timed out");
            Err(SessionError::Connection(format!(
                "dial to '{}' at {} timed out after {dial_timeout:?}",
                handle.name, handle.address
            )))
        }
    }
}
