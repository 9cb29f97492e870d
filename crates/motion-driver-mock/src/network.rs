//! Address book of simulated controllers.

use crate::controller::SimulatedController;
use async_trait::async_trait;
use motion_core::channel::{ChannelFactory, ControlChannel};
use motion_core::error::ControllerError;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
enum Endpoint {
    Controller(SimulatedController),
    Refuse(String),
    BlackHole,
}

/// [`ChannelFactory`] that resolves addresses to in-process controllers.
///
/// Unknown addresses are refused. A black-holed address never answers, so
/// only the caller's dial timeout ends the attempt.
#[derive(Debug, Clone, Default)]
pub struct SimulatedNetwork {
    endpoints: Arc<Mutex<BTreeMap<String, Endpoint>>>,
}

impl SimulatedNetwork {
    /// Empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `controller` at `address`.
    pub fn attach(&self, address: impl Into<String>, controller: SimulatedController) {
        self.endpoints
            .lock()
            .insert(address.into(), Endpoint::Controller(controller));
    }

    /// Refuse dials to `address` with `reason`.
    pub fn refuse(&self, address: impl Into<String>, reason: impl Into<String>) {
        self.endpoints
            .lock()
            .insert(address.into(), Endpoint::Refuse(reason.into()));
    }

    /// Make dials to `address` hang forever.
    pub fn black_hole(&self, address: impl Into<String>) {
        self.endpoints
            .lock()
            .insert(address.into(), Endpoint::BlackHole);
    }
}

#[async_trait]
impl ChannelFactory for SimulatedNetwork {
    async fn make_channel(&self, address: &str) -> Result<Arc<dyn ControlChannel>, ControllerError> {
        let endpoint = self.endpoints.lock().get(address).cloned();
        debug!(address, "Dialing simulated controller");
        match endpoint {
            Some(Endpoint::Controller(controller)) => Ok(Arc::new(controller)),
            Some(Endpoint::Refuse(reason)) => Err(ControllerError::Unavailable(reason)),
            Some(Endpoint::BlackHole) => futures::future::pending().await,
            None => Err(ControllerError::Unavailable(format!(
                "no controller listening at '{address}'"
            ))),
        }
    }
}
