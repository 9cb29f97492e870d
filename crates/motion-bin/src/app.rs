//! Wiring of skills to a simulated controller.

use crate::config::MotionConfig;
use anyhow::Context;
use motion_client::{CancelHandle, EquipmentHandle, EquipmentPack};
use motion_driver_mock::{SimulatedController, SimulatedNetwork};
use motion_skills::wiggle::ROBOT_SLOT;
use motion_skills::{ExecuteContext, ExecuteRequest, ExecuteResult, SkillRegistry};
use std::sync::Arc;
use tracing::info;

/// One line per registered skill: id, required slots and description.
pub fn describe_skills(registry: &SkillRegistry) -> Vec<String> {
    registry
        .iter()
        .map(|skill| {
            let slots: Vec<&str> = skill.required_equipment().into_keys().collect();
            format!(
                "{:<28} [{}] {}",
                skill.id(),
                slots.join(", "),
                skill.doc_string()
            )
        })
        .collect()
}

/// Serve a simulated controller built from `config` at the configured
/// address.
pub fn simulated_network(
    config: &MotionConfig,
) -> anyhow::Result<(SimulatedNetwork, SimulatedController)> {
    let controller =
        SimulatedController::from_config(&config.controller.instance_name, &config.simulation)
            .context("building simulated controller")?;
    let network = SimulatedNetwork::new();
    network.attach(&config.controller.address, controller.clone());
    info!(
        address = %config.controller.address,
        parts = config.simulation.parts.len(),
        "Simulated controller online"
    );
    Ok((network, controller))
}

/// Run the wiggle-joint skill on `joint` of `part` (default: the configured
/// part).
///
/// Cancelling `cancel` stops the run; the future still resolves, after the
/// session has been released.
pub async fn run_wiggle(
    config: &MotionConfig,
    registry: &SkillRegistry,
    joint: i64,
    part: Option<&str>,
    cancel: CancelHandle,
) -> anyhow::Result<ExecuteResult> {
    let (network, _controller) = simulated_network(config)?;
    let part = part.unwrap_or(&config.controller.part);

    let handle = EquipmentHandle::new(
        config.controller.instance_name.as_str(),
        config.controller.address.as_str(),
        part,
    );
    let request = ExecuteRequest::new(
        serde_json::json!({ "joint_number": joint }),
        EquipmentPack::new().with(ROBOT_SLOT, handle),
    );
    let context = ExecuteContext::new(Arc::new(network))
        .with_dial_timeout(config.controller.dial_timeout())
        .with_settle_timeout_secs(config.motion.settle_timeout_secs)
        .with_wiggle_offset_rad(config.motion.wiggle_offset_rad)
        .with_cancel(cancel);

    let skill = registry.get("wiggle_joint")?;
    let result = skill
        .execute(request, &context)
        .await
        .with_context(|| format!("{} failed on joint {joint} of {part}", skill.id()))?;
    Ok(result)
}
