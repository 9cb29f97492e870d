//! Per-tick motion simulation and reaction evaluation.

use crate::config::SettleBehavior;
use motion_core::condition::SignalSource;
use motion_core::ids::{ActionId, ReactionId};
use motion_core::primitives::point_to_point::{
    PointToPointMoveFixedParams, IS_SETTLED, SETPOINT_DONE_FOR_SECONDS,
};
use motion_core::reaction::{RealtimeReaction, RealtimeResponse};

/// Signal values of one active point-to-point move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct MotionSignals {
    done: bool,
    is_settled: bool,
    setpoint_done_for_seconds: f64,
}

impl SignalSource for MotionSignals {
    fn is_done(&self) -> bool {
        self.done
    }

    fn boolean(&self, name: &str) -> Option<bool> {
        (name == IS_SETTLED).then_some(self.is_settled)
    }

    fn number(&self, name: &str) -> Option<f64> {
        (name == SETPOINT_DONE_FOR_SECONDS).then_some(self.setpoint_done_for_seconds)
    }
}

/// A reaction that fired on this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Firing {
    Watcher { reaction: ReactionId },
    Transition { reaction: ReactionId, to: ActionId },
}

/// The action currently driving one part.
#[derive(Debug, Clone)]
pub(crate) struct ActiveMotion {
    pub(crate) action: ActionId,
    reactions: Vec<RealtimeReaction>,
    fired: Vec<bool>,
    start: Vec<f64>,
    goal: Vec<f64>,
    elapsed_ticks: u64,
    setpoint_done_tick: Option<u64>,
    settled: bool,
}

impl ActiveMotion {
    pub(crate) fn new(
        action: ActionId,
        reactions: Vec<RealtimeReaction>,
        params: &PointToPointMoveFixedParams,
        current: Vec<f64>,
    ) -> Self {
        let fired = vec![false; reactions.len()];
        Self {
            action,
            reactions,
            fired,
            start: current,
            goal: params.goal_position.clone(),
            elapsed_ticks: 0,
            setpoint_done_tick: None,
            settled: false,
        }
    }

    /// Advance the motion by one tick, updating the part's positions.
    pub(crate) fn advance(&mut self, behavior: SettleBehavior, positions: &mut Vec<f64>) {
        self.elapsed_ticks += 1;
        let now = self.elapsed_ticks;

        match behavior {
            SettleBehavior::Settle => {
                positions.clone_from(&self.goal);
                self.setpoint_done_tick.get_or_insert(now);
                self.settled = true;
            }
            SettleBehavior::Ramp { ticks } => {
                let total = ticks.max(1);
                let fraction = (now as f64 / total as f64).min(1.0);
                *positions = self
                    .start
                    .iter()
                    .zip(&self.goal)
                    .map(|(start, goal)| start + (goal - start) * fraction)
                    .collect();
                if now >= total {
                    self.setpoint_done_tick.get_or_insert(now);
                    self.settled = true;
                }
            }
            SettleBehavior::Stall => {
                self.setpoint_done_tick.get_or_insert(now);
                self.settled = false;
            }
        }
    }

    /// Signal values after the last `advance`, with `dt` seconds per tick.
    pub(crate) fn signals(&self, dt: f64) -> MotionSignals {
        let setpoint_done_for_seconds = self
            .setpoint_done_tick
            .map(|done_at| (self.elapsed_ticks - done_at) as f64 * dt)
            .unwrap_or(0.0);
        MotionSignals {
            done: self.settled,
            is_settled: self.settled,
            setpoint_done_for_seconds,
        }
    }

    /// Fire every armed reaction whose condition holds, in declaration order,
    /// stopping after the first realtime transition.
    pub(crate) fn evaluate(&mut self, signals: &dyn SignalSource) -> Vec<Firing> {
        let mut firings = Vec::new();
        for (reaction, fired) in self.reactions.iter().zip(self.fired.iter_mut()) {
            if *fired || !reaction.condition.evaluate(signals) {
                continue;
            }
            *fired = true;
            match reaction.response {
                RealtimeResponse::NotifyWatcher => firings.push(Firing::Watcher {
                    reaction: reaction.id,
                }),
                RealtimeResponse::StartAction { target } => {
                    firings.push(Firing::Transition {
                        reaction: reaction.id,
                        to: target,
                    });
                    break;
                }
            }
        }
        firings
    }
}
