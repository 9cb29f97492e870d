//! The skill interface.

use crate::error::SkillError;
use async_trait::async_trait;
use motion_client::{CancelHandle, EquipmentPack};
use motion_core::channel::ChannelFactory;
use motion_core::limits::{DEFAULT_SETTLE_TIMEOUT_SECS, DIAL_TIMEOUT, FIVE_DEGREES_RAD};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// What a skill requires of the equipment in one slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentSelector {
    /// The equipment must expose a position-controlled part.
    pub position_controlled_part: bool,
}

/// One invocation of a skill.
#[derive(Debug, Clone, Default)]
pub struct ExecuteRequest {
    /// Skill parameters, decoded by the skill.
    pub params: serde_json::Value,
    /// Resolved equipment by slot.
    pub equipment: EquipmentPack,
}

impl ExecuteRequest {
    /// Request with `params` and `equipment`.
    pub fn new(params: serde_json::Value, equipment: EquipmentPack) -> Self {
        Self { params, equipment }
    }
}

/// Services and tuning available to a running skill.
#[derive(Clone)]
pub struct ExecuteContext {
    /// Dials controllers.
    pub channel_factory: Arc<dyn ChannelFactory>,
    /// Bound on dialing a controller.
    pub dial_timeout: Duration,
    /// Settle timeout encoded in motion graphs, in seconds.
    pub settle_timeout_secs: f64,
    /// Wiggle amplitude in radians.
    pub wiggle_offset_rad: f64,
    /// Cancels the sessions the skill opens.
    pub cancel: CancelHandle,
}

impl fmt::Debug for ExecuteContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecuteContext")
            .field("dial_timeout", &self.dial_timeout)
            .field("settle_timeout_secs", &self.settle_timeout_secs)
            .field("wiggle_offset_rad", &self.wiggle_offset_rad)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl ExecuteContext {
    /// Context with default timeouts and offset.
    pub fn new(channel_factory: Arc<dyn ChannelFactory>) -> Self {
        Self {
            channel_factory,
            dial_timeout: DIAL_TIMEOUT,
            settle_timeout_secs: DEFAULT_SETTLE_TIMEOUT_SECS,
            wiggle_offset_rad: FIVE_DEGREES_RAD,
            cancel: CancelHandle::new(),
        }
    }

    /// Override the dial timeout.
    pub fn with_dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }

    /// Override the settle timeout.
    pub fn with_settle_timeout_secs(mut self, secs: f64) -> Self {
        self.settle_timeout_secs = secs;
        self
    }

    /// Override the wiggle amplitude.
    pub fn with_wiggle_offset_rad(mut self, rad: f64) -> Self {
        self.wiggle_offset_rad = rad;
        self
    }

    /// Share `cancel` with the sessions the skill opens.
    pub fn with_cancel(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Result of a successful skill invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecuteResult {
    /// Skill-specific output.
    pub output: serde_json::Value,
}

/// A unit of robot behaviour that can be registered and executed.
#[async_trait]
pub trait Skill: Send + Sync {
    /// Skill name, unique within its package.
    fn name(&self) -> &'static str;

    /// Package the skill belongs to.
    fn package(&self) -> &'static str;

    /// One-line description.
    fn doc_string(&self) -> &'static str;

    /// Equipment slots the skill needs.
    fn required_equipment(&self) -> BTreeMap<&'static str, EquipmentSelector>;

    /// Parameters used when the caller supplies none.
    fn default_parameters(&self) -> serde_json::Value;

    /// Run the skill to completion.
    async fn execute(
        &self,
        request: ExecuteRequest,
        context: &ExecuteContext,
    ) -> Result<ExecuteResult, SkillError>;

    /// Fully qualified id, `package.name`.
    fn id(&self) -> String {
        format!("{}.{}", self.package(), self.name())
    }
}
