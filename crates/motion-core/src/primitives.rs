//! Controller-side motion primitives known to this crate.

/// Joint-space point-to-point move.
///
/// Moves every joint of a part to a goal position, arriving with a goal
/// velocity. Exposes two signals besides the done flag:
///
/// - [`IS_SETTLED`]: the joints have settled on the goal
/// - [`SETPOINT_DONE_FOR_SECONDS`]: time since the trajectory setpoint
///   reached the goal, whether or not the joints followed
pub mod point_to_point {
    use crate::action::FixedParams;
    use crate::error::{SessionError, SessionResult};
    use serde::{Deserialize, Serialize};

    /// Action type tag.
    pub const ACTION_TYPE_NAME: &str = "xfa.point_to_point_move";

    /// Boolean signal: joints settled on the goal.
    pub const IS_SETTLED: &str = "xfa.is_settled";

    /// Numeric signal: seconds since the setpoint reached the goal.
    pub const SETPOINT_DONE_FOR_SECONDS: &str = "xfa.setpoint_done_for_seconds";

    /// Boolean signal names.
    pub const BOOLEAN_SIGNALS: &[&str] = &[IS_SETTLED];

    /// Numeric signal names.
    pub const NUMERIC_SIGNALS: &[&str] = &[SETPOINT_DONE_FOR_SECONDS];

    /// Fixed parameters of a point-to-point move.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct PointToPointMoveFixedParams {
        /// Goal position, one entry per joint.
        pub goal_position: Vec<f64>,
        /// Goal velocity, one entry per joint.
        pub goal_velocity: Vec<f64>,
    }

    impl PointToPointMoveFixedParams {
        /// Number of joints addressed by these parameters, if consistent.
        pub fn joint_count(&self) -> Option<usize> {
            (self.goal_position.len() == self.goal_velocity.len())
                .then_some(self.goal_position.len())
        }
    }

    /// Encode fixed params for a move to `goal_position`.
    ///
    /// Both vectors must have one entry per joint.
    pub fn fixed_params(goal_position: Vec<f64>, goal_velocity: Vec<f64>) -> SessionResult<FixedParams> {
        if goal_position.len() != goal_velocity.len() {
            return Err(SessionError::Precondition(format!(
                "goal position has {} entries but goal velocity has {}",
                goal_position.len(),
                goal_velocity.len()
            )));
        }
        if goal_position.is_empty() {
            return Err(SessionError::Precondition(
                "point-to-point move needs at least one joint".into(),
            ));
        }
        FixedParams::encode(&PointToPointMoveFixedParams {
            goal_position,
            goal_velocity,
        })
    }

    /// Whether `name` is a signal of this primitive.
    pub fn has_signal(name: &str) -> bool {
        BOOLEAN_SIGNALS.contains(&name) || NUMERIC_SIGNALS.contains(&name)
    }

}
