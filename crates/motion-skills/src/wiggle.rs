//! Wiggle one joint of a robot part.
//!
//! The motion is two point-to-point moves on the same part:
//!
//! 1. move the selected joint out by the offset, keeping every other joint
//!    where it is; when done, switch to the second move in real time
//! 2. move back to the original positions; when settled, stop the watcher
//!    loop
//!
//! Each move also carries a settle-timeout reaction that stops the loop with
//! [`WatcherOutcome::TimedOut`].

use crate::error::SkillError;
use crate::skill::{EquipmentSelector, ExecuteContext, ExecuteRequest, ExecuteResult, Skill};
use async_trait::async_trait;
use motion_client::{connect_to_equipment, ControllerClient, Session};
use motion_core::action::Action;
use motion_core::condition::Condition;
use motion_core::error::{SessionError, SessionResult};
use motion_core::graph::ActionGraph;
use motion_core::ids::ActionId;
use motion_core::limits::DEFAULT_SETTLE_TIMEOUT_SECS;
use motion_core::part::PartStatus;
use motion_core::primitives::point_to_point;
use motion_core::reaction::Reaction;
use motion_core::watcher::{LoopControl, WatcherEvent, WatcherOutcome};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{error, info};

/// Equipment slot of the robot.
pub const ROBOT_SLOT: &str = "robot";

/// Id of the outward move.
pub const FIRST_MOVE: ActionId = ActionId(1);

/// Id of the return move.
pub const SECOND_MOVE: ActionId = ActionId(2);

/// Parameters of [`WiggleJoint`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WiggleJointParams {
    /// Zero-based index of the joint to wiggle.
    #[serde(default)]
    pub joint_number: i64,
}

fn on_settled(event: &WatcherEvent, control: &mut LoopControl) {
    info!(part = %event.part, tick = event.tick, "Finished moving joint.");
    control.quit();
}

fn on_timeout(event: &WatcherEvent, control: &mut LoopControl) {
    error!(part = %event.part, action = %event.action, tick = event.tick, "Failed to reach goal");
    control.quit_timed_out(format!("{} did not settle", event.action));
}

/// [`build_wiggle_graph_with_timeout`] with the default settle timeout.
pub fn build_wiggle_graph(
    part_status: &PartStatus,
    joint_index: i64,
    offset: f64,
) -> SessionResult<ActionGraph> {
    build_wiggle_graph_with_timeout(part_status, joint_index, offset, DEFAULT_SETTLE_TIMEOUT_SECS)
}

/// Out-and-back graph for one joint of `part_status`'s part.
///
/// Entry action is [`FIRST_MOVE`]. Fails with a precondition error, without
/// touching any controller, if `joint_index` is not a joint of the part.
pub fn build_wiggle_graph_with_timeout(
    part_status: &PartStatus,
    joint_index: i64,
    offset: f64,
    settle_timeout_secs: f64,
) -> SessionResult<ActionGraph> {
    let part = part_status.part_name.as_str();
    let original = part_status.positions();
    let index = usize::try_from(joint_index)
        .ok()
        .filter(|index| *index < original.len())
        .ok_or_else(|| {
            SessionError::Precondition(format!("Joint {joint_index} does not exist on {part}"))
        })?;

    let mut first_goal = original.clone();
    first_goal[index] += offset;
    let zero_velocity = vec![0.0; original.len()];

    let timeout = || {
        Reaction::watcher(
            Condition::at_least(point_to_point::SETPOINT_DONE_FOR_SECONDS, settle_timeout_secs),
            on_timeout,
        )
    };

    let first_move = Action::new(FIRST_MOVE, point_to_point::ACTION_TYPE_NAME, part)
        .with_fixed_params(point_to_point::fixed_params(first_goal, zero_velocity.clone())?)
        .with_reaction(Reaction::realtime(Condition::done(), SECOND_MOVE))
        .with_reaction(timeout());

    let second_move = Action::new(SECOND_MOVE, point_to_point::ACTION_TYPE_NAME, part)
        .with_fixed_params(point_to_point::fixed_params(original, zero_velocity)?)
        .with_reaction(Reaction::watcher(
            Condition::is_true(point_to_point::IS_SETTLED),
            on_settled,
        ))
        .with_reaction(timeout());

    ActionGraph::from_actions([first_move, second_move])
}

/// Moves one joint of a robot out by a small offset and back.
#[derive(Debug, Clone, Copy, Default)]
pub struct WiggleJoint;

#[async_trait]
impl Skill for WiggleJoint {
    fn name(&self) -> &'static str {
        "wiggle_joint"
    }

    fn package(&self) -> &'static str {
        "com.example"
    }

    fn doc_string(&self) -> &'static str {
        "Wiggles a single joint on a robot."
    }

    fn required_equipment(&self) -> BTreeMap<&'static str, EquipmentSelector> {
        BTreeMap::from([(
            ROBOT_SLOT,
            EquipmentSelector {
                position_controlled_part: true,
            },
        )])
    }

    fn default_parameters(&self) -> serde_json::Value {
        serde_json::json!({ "joint_number": 0 })
    }

    async fn execute(
        &self,
        request: ExecuteRequest,
        context: &ExecuteContext,
    ) -> Result<ExecuteResult, SkillError> {
        let params: WiggleJointParams = serde_json::from_value(request.params)
            .map_err(|e| SkillError::InvalidParameters(e.to_string()))?;
        let handle = request
            .equipment
            .get(ROBOT_SLOT)
            .ok_or_else(|| SkillError::MissingEquipment(ROBOT_SLOT.to_string()))?;

        let connection =
            connect_to_equipment(context.channel_factory.as_ref(), handle, context.dial_timeout)
                .await?;
        let client = ControllerClient::new(connection.clone());

        let part = handle.position_part_name.as_str();
        let config = client.get_config().await?;
        let part_config = config.part_config(part).map_err(SessionError::from)?;
        if !part_config.position_controlled {
            return Err(SkillError::UnsuitableEquipment(format!(
                "part '{part}' of {} is not position controlled",
                handle.name
            )));
        }
        let status = client.get_single_part_status(part).await?;

        let graph = build_wiggle_graph_with_timeout(
            &status,
            params.joint_number,
            context.wiggle_offset_rad,
            context.settle_timeout_secs,
        )
        .map_err(|e| match e {
            SessionError::Precondition(_) => SessionError::Precondition(format!(
                "Joint {} does not exist on {}",
                params.joint_number, handle.name
            )),
            other => other,
        })?;

        let mut session =
            Session::start_with_cancel(connection, [part], context.cancel.clone()).await?;
        info!(equipment = %handle.name, part, joint = params.joint_number, "Starting Wiggle.");
        let outcome = session.upload_and_run(graph, FIRST_MOVE).await?;
        info!(equipment = %handle.name, part, %outcome, "Finished Wiggle.");

        // A settle timeout was logged by its callback; it is reported, not
        // raised.
        let output = match outcome {
            WatcherOutcome::Finished => serde_json::json!({
                "part": part,
                "joint_number": params.joint_number,
                "outcome": "finished",
            }),
            WatcherOutcome::TimedOut { reason } => serde_json::json!({
                "part": part,
                "joint_number": params.joint_number,
                "outcome": "timed_out",
                "reason": reason,
            }),
        };
        Ok(ExecuteResult { output })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use motion_client::{ControllerConnection, EquipmentHandle, EquipmentPack};
    use motion_core::action::ActionDescriptor;
    use motion_core::ids::ReactionIdAllocator;
    use motion_core::primitives::point_to_point::PointToPointMoveFixedParams;
    use motion_core::reaction::RealtimeResponse;
    use motion_driver_mock::{
        SettleBehavior, SimulatedController, SimulatedNetwork, SimulatedPartConfig,
    };
    use std::sync::Arc;
    use tracing_test::traced_test;

    const DELTA: f64 = 0.0872665;

    fn six_joints_at_zero() -> PartStatus {
        PartStatus::from_positions("arm", 0, &[0.0; 6])
    }

    fn descriptors(graph: ActionGraph) -> Vec<ActionDescriptor> {
        graph.compile(&mut ReactionIdAllocator::new()).descriptors
    }

    fn goal(descriptor: &ActionDescriptor) -> Vec<f64> {
        descriptor
            .fixed_params
            .decode::<PointToPointMoveFixedParams>()
            .unwrap()
            .goal_position
    }

    #[test]
    fn test_wiggle_goals() {
        let graph = build_wiggle_graph(&six_joints_at_zero(), 2, DELTA).unwrap();
        let moves = descriptors(graph);

        assert_eq!(moves[0].id, FIRST_MOVE);
        assert_eq!(goal(&moves[0]), vec![0.0, 0.0, DELTA, 0.0, 0.0, 0.0]);
        assert_eq!(moves[1].id, SECOND_MOVE);
        assert_eq!(goal(&moves[1]), vec![0.0; 6]);
    }

    #[test]
    fn test_out_and_back_for_every_joint() {
        let current = [0.3, -1.2, 0.7, 2.0];
        let status = PartStatus::from_positions("arm", 7, &current);
        for index in 0..current.len() {
            let moves = descriptors(build_wiggle_graph(&status, index as i64, DELTA).unwrap());
            let out = goal(&moves[0]);
            for (j, (goal, start)) in out.iter().zip(current).enumerate() {
                if j == index {
                    assert_eq!(*goal, start + DELTA);
                } else {
                    assert_eq!(*goal, start);
                }
            }
            assert_eq!(goal(&moves[1]), current.to_vec());
        }
    }

    #[test]
    fn test_reaction_layout() {
        let moves = descriptors(build_wiggle_graph(&six_joints_at_zero(), 0, DELTA).unwrap());

        let first = &moves[0].reactions;
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].condition, Condition::Done);
        assert_eq!(first[0].response, RealtimeResponse::StartAction { target: SECOND_MOVE });
        assert_eq!(
            first[1].condition,
            Condition::at_least(point_to_point::SETPOINT_DONE_FOR_SECONDS, 2.0)
        );
        assert_eq!(first[1].response, RealtimeResponse::NotifyWatcher);

        let second = &moves[1].reactions;
        assert_eq!(second[0].condition, Condition::is_true(point_to_point::IS_SETTLED));
        assert_eq!(second[0].response, RealtimeResponse::NotifyWatcher);
        assert_eq!(second[1].response, RealtimeResponse::NotifyWatcher);
    }

    #[test]
    fn test_joint_index_out_of_range() {
        let status = six_joints_at_zero();
        for index in [-1, 6, 42] {
            let err = build_wiggle_graph(&status, index, DELTA).unwrap_err();
            match err {
                SessionError::Precondition(msg) => {
                    assert!(msg.contains(&index.to_string()), "{msg}");
                    assert!(msg.contains("arm"), "{msg}");
                }
                other => panic!("unexpected error {other:?}"),
            }
        }
    }

    fn arm(behavior: SettleBehavior) -> SimulatedController {
        SimulatedController::builder()
            .name("robot_controller")
            .part(SimulatedPartConfig::new("arm", 6).with_behavior(behavior))
            .build()
            .unwrap()
    }

    async fn run_wiggle(controller: &SimulatedController) -> (SessionResult<WatcherOutcome>, Session) {
        let connection =
            ControllerConnection::new(Arc::new(controller.clone()), "sim://robot", "robot_controller");
        let client = ControllerClient::new(connection.clone());
        let status = client.get_single_part_status("arm").await.unwrap();
        let graph = build_wiggle_graph(&status, 2, DELTA).unwrap();

        let mut session = Session::start(connection, ["arm"]).await.unwrap();
        let outcome = session.upload_and_run(graph, FIRST_MOVE).await;
        (outcome, session)
    }

    #[tokio::test]
    #[traced_test]
    async fn test_settling_controller_finishes() {
        let controller = arm(SettleBehavior::Settle);
        let (outcome, session) = run_wiggle(&controller).await;

        assert_eq!(outcome.unwrap(), WatcherOutcome::Finished);
        assert_eq!(session.stats().transitions, 1);
        assert_eq!(session.stats().callbacks, 1);
        assert!(logs_contain("Finished moving joint."));
        assert!(!logs_contain("Failed to reach goal"));
        assert_eq!(controller.part_positions("arm"), Some(vec![0.0; 6]));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_stalled_controller_times_out() {
        let controller = arm(SettleBehavior::Stall);
        let (outcome, session) = run_wiggle(&controller).await;

        assert!(matches!(outcome.unwrap(), WatcherOutcome::TimedOut { .. }));
        assert_eq!(session.stats().transitions, 0);
        assert_eq!(session.stats().callbacks, 1);
        assert!(logs_contain("Failed to reach goal"));
        assert!(!logs_contain("Finished moving joint."));
    }

    fn request(joint_number: i64) -> ExecuteRequest {
        ExecuteRequest::new(
            serde_json::json!({ "joint_number": joint_number }),
            EquipmentPack::new().with(
                ROBOT_SLOT,
                EquipmentHandle::new("robot_controller", "sim://robot", "arm"),
            ),
        )
    }

    fn context(controller: &SimulatedController) -> ExecuteContext {
        let network = SimulatedNetwork::new();
        network.attach("sim://robot", controller.clone());
        ExecuteContext::new(Arc::new(network))
    }

    #[tokio::test]
    #[traced_test]
    async fn test_execute_logs_progress() {
        let controller = arm(SettleBehavior::Ramp { ticks: 20 });
        let result = WiggleJoint
            .execute(request(5), &context(&controller))
            .await
            .unwrap();

        assert_eq!(result.output["joint_number"], 5);
        assert_eq!(result.output["outcome"], "finished");
        assert!(logs_contain("Starting Wiggle."));
        assert!(logs_contain("Finished moving joint."));
        assert!(logs_contain("Finished Wiggle."));
        assert_eq!(controller.session_count(), 0);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_execute_timeout_is_reported_not_raised() {
        let controller = arm(SettleBehavior::Stall);
        let ctx = context(&controller).with_settle_timeout_secs(0.05);
        let result = WiggleJoint.execute(request(1), &ctx).await.unwrap();

        assert_eq!(result.output["outcome"], "timed_out");
        assert_eq!(result.output["joint_number"], 1);
        assert!(result.output["reason"]
            .as_str()
            .unwrap()
            .contains("did not settle"));
        assert!(logs_contain("Failed to reach goal"));
        assert!(logs_contain("Finished Wiggle."));
        assert_eq!(controller.part_owner("arm"), None);
    }
}
