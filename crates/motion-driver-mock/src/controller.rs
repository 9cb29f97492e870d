//! Simulated real-time controller.

use crate::config::{SettleBehavior, SimulatedPartConfig, SimulationConfig};
use crate::mode::MockMode;
use crate::realtime::{ActiveMotion, Firing};
use async_trait::async_trait;
use futures::channel::mpsc;
use futures::StreamExt;
use motion_core::action::ActionDescriptor;
use motion_core::channel::{CallContext, ControlChannel, EventStream};
use motion_core::error::ControllerError;
use motion_core::event::{ControllerEvent, EventKind};
use motion_core::graph::TransitionGraph;
use motion_core::ids::{ActionId, RemoteSessionId};
use motion_core::limits::{DEFAULT_STATUS_INTERVAL_TICKS, DEFAULT_TICK_PERIOD};
use motion_core::part::{ControllerConfig, PartConfig, PartStatus};
use motion_core::primitives::point_to_point::{self, PointToPointMoveFixedParams};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// One RPC as received by the simulated controller.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// RPC name, e.g. `add_actions`.
    pub operation: &'static str,
    /// Metadata the caller attached.
    pub context: CallContext,
}

// =============================================================================
// Internal State
// =============================================================================

#[derive(Debug)]
struct InstalledAction {
    descriptor: ActionDescriptor,
    params: PointToPointMoveFixedParams,
}

#[derive(Debug)]
struct SimPart {
    config: PartConfig,
    behavior: SettleBehavior,
    positions: Vec<f64>,
    owner: Option<RemoteSessionId>,
}

#[derive(Debug, Default)]
struct SimSession {
    parts: Vec<String>,
    actions: BTreeMap<ActionId, InstalledAction>,
    active: BTreeMap<String, ActiveMotion>,
    subscribers: Vec<mpsc::UnboundedSender<ControllerEvent>>,
    task: Option<JoinHandle<()>>,
}

impl SimSession {
    fn publish(&mut self, events: Vec<ControllerEvent>) {
        if events.is_empty() {
            return;
        }
        self.subscribers.retain(|tx| !tx.is_closed());
        for event in events {
            for tx in &self.subscribers {
                // A receiver dropped since `retain` just stops listening.
                let _ = tx.unbounded_send(event.clone());
            }
        }
    }

    fn close(&mut self) {
        self.subscribers.clear();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[derive(Debug)]
struct ControllerState {
    up: bool,
    clock: u64,
    parts: BTreeMap<String, SimPart>,
    sessions: BTreeMap<RemoteSessionId, SimSession>,
    next_session: u64,
    calls: Vec<RecordedCall>,
}

impl ControllerState {
    fn record(&mut self, operation: &'static str, ctx: &CallContext) {
        self.calls.push(RecordedCall {
            operation,
            context: ctx.clone(),
        });
    }

    fn ensure_up(&self) -> Result<(), ControllerError> {
        if self.up {
            Ok(())
        } else {
            Err(ControllerError::Unavailable("controller is down".into()))
        }
    }

    fn session_mut(&mut self, id: RemoteSessionId) -> Result<&mut SimSession, ControllerError> {
        self.sessions
            .get_mut(&id)
            .ok_or(ControllerError::UnknownSession(id))
    }
}

#[derive(Debug)]
struct Shared {
    name: String,
    mode: MockMode,
    tick_period: Duration,
    status_interval: u64,
    config: ControllerConfig,
    state: Mutex<ControllerState>,
}

impl Shared {
    /// Run one control tick for `session_id`. Returns `false` once the
    /// session is gone or the controller is down.
    fn step(&self, session_id: RemoteSessionId) -> bool {
        let mut guard = self.state.lock();
        let ControllerState {
            up,
            clock,
            parts,
            sessions,
            ..
        } = &mut *guard;
        if !*up {
            return false;
        }
        let Some(session) = sessions.get_mut(&session_id) else {
            return false;
        };

        *clock += 1;
        let tick = *clock;
        let dt = self.tick_period.as_secs_f64();
        let mut events = Vec::new();
        let mut transitions = Vec::new();

        for (part_name, motion) in session.active.iter_mut() {
            let Some(part) = parts.get_mut(part_name) else {
                continue;
            };
            motion.advance(part.behavior, &mut part.positions);
            let signals = motion.signals(dt);
            for firing in motion.evaluate(&signals) {
                let kind = match firing {
                    Firing::Watcher { reaction } => EventKind::WatcherReaction {
                        reaction,
                        action: motion.action,
                    },
                    Firing::Transition { reaction, to } => {
                        transitions.push(to);
                        EventKind::RealtimeTransition {
                            reaction,
                            from: motion.action,
                            to,
                        }
                    }
                };
                events.push(ControllerEvent {
                    tick,
                    part: part_name.clone(),
                    kind,
                });
            }
        }

        for target in transitions {
            if let Some(installed) = session.actions.get(&target) {
                let part = installed.descriptor.part.clone();
                let current = parts
                    .get(&part)
                    .map(|p| p.positions.clone())
                    .unwrap_or_default();
                let motion = ActiveMotion::new(
                    target,
                    installed.descriptor.reactions.clone(),
                    &installed.params,
                    current,
                );
                session.active.insert(part, motion);
            }
        }

        if tick % self.status_interval == 0 {
            for part_name in &session.parts {
                if let Some(part) = parts.get(part_name) {
                    events.push(ControllerEvent {
                        tick,
                        part: part_name.clone(),
                        kind: EventKind::Status {
                            status: PartStatus::from_positions(part_name, tick, &part.positions),
                        },
                    });
                }
            }
        }

        session.publish(events);
        true
    }
}

/// Real-time loop of one session.
async fn run_realtime(shared: Arc<Shared>, session: RemoteSessionId) {
    debug!(controller = %shared.name, %session, "Real-time loop started");
    while shared.step(session) {
        match shared.mode {
            MockMode::Instant => tokio::task::yield_now().await,
            MockMode::Realistic => tokio::time::sleep(shared.tick_period).await,
        }
    }
    debug!(controller = %shared.name, %session, "Real-time loop stopped");
}

// =============================================================================
// SimulatedController
// =============================================================================

/// In-process simulated controller.
///
/// Cheap to clone; clones share the same state. Implements
/// [`ControlChannel`], so it can be handed to a session directly or through a
/// [`SimulatedNetwork`](crate::SimulatedNetwork).
///
/// # Example
///
/// ```rust,ignore
/// let controller = SimulatedController::builder()
///     .name("robot_controller")
///     .part(SimulatedPartConfig::new("arm", 6))
///     .build()?;
///
/// let channel: Arc<dyn ControlChannel> = Arc::new(controller.clone());
/// ```
#[derive(Debug, Clone)]
pub struct SimulatedController {
    shared: Arc<Shared>,
}

impl SimulatedController {
    /// Create a builder.
    pub fn builder() -> SimulatedControllerBuilder {
        SimulatedControllerBuilder::new()
    }

    /// Build from a parsed simulation configuration.
    pub fn from_config(
        name: impl Into<String>,
        config: &SimulationConfig,
    ) -> Result<Self, ControllerError> {
        config
            .parts
            .iter()
            .cloned()
            .fold(
                Self::builder()
                    .name(name)
                    .mode(config.mode)
                    .tick_period(config.tick_period())
                    .status_interval_ticks(config.status_interval_ticks),
                SimulatedControllerBuilder::part,
            )
            .build()
    }

    /// Controller name.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Every RPC received so far, in arrival order.
    pub fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.shared.state.lock().calls.clone()
    }

    /// Number of received RPCs named `operation`.
    pub fn call_count(&self, operation: &str) -> usize {
        self.shared
            .state
            .lock()
            .calls
            .iter()
            .filter(|call| call.operation == operation)
            .count()
    }

    /// Current joint positions of a part.
    pub fn part_positions(&self, part: &str) -> Option<Vec<f64>> {
        self.shared
            .state
            .lock()
            .parts
            .get(part)
            .map(|p| p.positions.clone())
    }

    /// Session currently holding a part.
    pub fn part_owner(&self, part: &str) -> Option<RemoteSessionId> {
        self.shared.state.lock().parts.get(part).and_then(|p| p.owner)
    }

    /// Actions installed in a session.
    pub fn installed_actions(&self, session: RemoteSessionId) -> Vec<ActionId> {
        self.shared
            .state
            .lock()
            .sessions
            .get(&session)
            .map(|s| s.actions.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Action currently driving a part, if any session is moving it.
    pub fn active_action(&self, part: &str) -> Option<ActionId> {
        let state = self.shared.state.lock();
        state
            .sessions
            .values()
            .find_map(|s| s.active.get(part).map(|m| m.action))
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.shared.state.lock().sessions.len()
    }

    /// Simulate a controller crash: close every event stream, stop every
    /// real-time loop and fail further RPCs with `Unavailable`.
    pub fn crash(&self) {
        let mut state = self.shared.state.lock();
        warn!(controller = %self.shared.name, "Simulated controller crash");
        state.up = false;
        for session in state.sessions.values_mut() {
            session.close();
        }
    }

    /// Bring a crashed controller back up with no sessions and no owners.
    pub fn restart(&self) {
        let mut state = self.shared.state.lock();
        for session in state.sessions.values_mut() {
            session.close();
        }
        state.sessions.clear();
        for part in state.parts.values_mut() {
            part.owner = None;
        }
        state.up = true;
        info!(controller = %self.shared.name, "Simulated controller restarted");
    }

    fn validate_batch(
        state: &ControllerState,
        session: &SimSession,
        actions: &[ActionDescriptor],
    ) -> Result<Vec<PointToPointMoveFixedParams>, ControllerError> {
        let reject = |msg: String| -> Result<Vec<PointToPointMoveFixedParams>, ControllerError> {
            Err(ControllerError::GraphRejected(msg))
        };

        if session.parts.is_empty() {
            return Err(ControllerError::InvalidRequest(
                "no parts registered for this session".into(),
            ));
        }
        if actions.is_empty() {
            return reject("empty action batch".into());
        }

        let mut batch_ids = BTreeSet::new();
        let mut decoded = Vec::with_capacity(actions.len());
        for action in actions {
            if !batch_ids.insert(action.id) || session.actions.contains_key(&action.id) {
                return reject(format!("duplicate {}", action.id));
            }
            if action.action_type != point_to_point::ACTION_TYPE_NAME {
                return reject(format!(
                    "{} has unknown action type '{}'",
                    action.id, action.action_type
                ));
            }
            if !session.parts.contains(&action.part) {
                return reject(format!(
                    "{} targets part '{}' which is not registered for this session",
                    action.id, action.part
                ));
            }
            let params: PointToPointMoveFixedParams = match action.fixed_params.decode() {
                Ok(params) => params,
                Err(e) => return reject(format!("{} has malformed fixed params: {e}", action.id)),
            };
            let joint_count = state
                .parts
                .get(&action.part)
                .map(|p| p.config.joint_count)
                .unwrap_or_default();
            if params.joint_count() != Some(joint_count) {
                return reject(format!(
                    "{} fixed params have {} goal positions and {} goal velocities, part '{}' has {} joints",
                    action.id,
                    params.goal_position.len(),
                    params.goal_velocity.len(),
                    action.part,
                    joint_count
                ));
            }
            for reaction in &action.reactions {
                if let Some(signal) = reaction.condition.signal() {
                    if !point_to_point::has_signal(signal) {
                        return reject(format!(
                            "{} of {} reads unknown signal '{signal}'",
                            reaction.id, action.id
                        ));
                    }
                }
            }
            decoded.push(params);
        }

        let known: BTreeSet<ActionId> = session.actions.keys().copied().collect();
        let dangling = TransitionGraph::from_descriptors(actions).dangling(&known);
        if let Some(edge) = dangling.first() {
            return reject(edge.to_string());
        }

        Ok(decoded)
    }
}

#[async_trait]
impl ControlChannel for SimulatedController {
    async fn get_config(&self, ctx: &CallContext) -> Result<ControllerConfig, ControllerError> {
        let mut state = self.shared.state.lock();
        state.record("get_config", ctx);
        state.ensure_up()?;
        Ok(self.shared.config.clone())
    }

    async fn get_part_status(
        &self,
        ctx: &CallContext,
        part: &str,
    ) -> Result<PartStatus, ControllerError> {
        let mut state = self.shared.state.lock();
        state.record("get_part_status", ctx);
        state.ensure_up()?;
        let sim = state
            .parts
            .get(part)
            .ok_or_else(|| ControllerError::UnknownPart(part.to_string()))?;
        Ok(PartStatus::from_positions(part, state.clock, &sim.positions))
    }

    async fn open_session(&self, ctx: &CallContext) -> Result<RemoteSessionId, ControllerError> {
        let mut state = self.shared.state.lock();
        state.record("open_session", ctx);
        state.ensure_up()?;
        state.next_session += 1;
        let id = RemoteSessionId(state.next_session);
        state.sessions.insert(id, SimSession::default());
        debug!(controller = %self.shared.name, session = %id, "Session opened");
        Ok(id)
    }

    async fn register_parts(
        &self,
        ctx: &CallContext,
        session: RemoteSessionId,
        parts: &[String],
    ) -> Result<(), ControllerError> {
        let mut guard = self.shared.state.lock();
        guard.record("register_parts", ctx);
        guard.ensure_up()?;
        let state = &mut *guard;

        let sim_session = state
            .sessions
            .get(&session)
            .ok_or(ControllerError::UnknownSession(session))?;
        if !sim_session.parts.is_empty() {
            return Err(ControllerError::InvalidRequest(
                "parts already registered for this session".into(),
            ));
        }
        if parts.is_empty() {
            return Err(ControllerError::InvalidRequest("no parts requested".into()));
        }

        // All or nothing: check every part before claiming any.
        for name in parts {
            let part = state
                .parts
                .get(name)
                .ok_or_else(|| ControllerError::UnknownPart(name.clone()))?;
            if let Some(holder) = part.owner.filter(|holder| *holder != session) {
                return Err(ControllerError::PartClaimed {
                    part: name.clone(),
                    holder,
                });
            }
        }
        for name in parts {
            if let Some(part) = state.parts.get_mut(name) {
                part.owner = Some(session);
            }
        }
        state.session_mut(session)?.parts = parts.to_vec();
        info!(controller = %self.shared.name, %session, ?parts, "Parts registered");
        Ok(())
    }

    async fn add_actions(
        &self,
        ctx: &CallContext,
        session: RemoteSessionId,
        actions: Vec<ActionDescriptor>,
    ) -> Result<(), ControllerError> {
        let mut guard = self.shared.state.lock();
        guard.record("add_actions", ctx);
        guard.ensure_up()?;
        let state = &mut *guard;

        let sim_session = state
            .sessions
            .get(&session)
            .ok_or(ControllerError::UnknownSession(session))?;
        let decoded = match Self::validate_batch(state, sim_session, &actions) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(controller = %self.shared.name, %session, error = %e, "Rejected action batch");
                return Err(e);
            }
        };

        let sim_session = state.session_mut(session)?;
        let count = actions.len();
        for (descriptor, params) in actions.into_iter().zip(decoded) {
            sim_session
                .actions
                .insert(descriptor.id, InstalledAction { descriptor, params });
        }
        debug!(controller = %self.shared.name, %session, count, "Installed action batch");
        Ok(())
    }

    async fn start_actions(
        &self,
        ctx: &CallContext,
        session: RemoteSessionId,
        actions: &[ActionId],
    ) -> Result<(), ControllerError> {
        let mut guard = self.shared.state.lock();
        guard.record("start_actions", ctx);
        guard.ensure_up()?;
        let state = &mut *guard;
        let tick = state.clock;

        let sim_session = state
            .sessions
            .get_mut(&session)
            .ok_or(ControllerError::UnknownSession(session))?;
        if let Some(missing) = actions.iter().find(|id| !sim_session.actions.contains_key(*id)) {
            return Err(ControllerError::UnknownAction(*missing));
        }

        let mut events = Vec::with_capacity(actions.len());
        for id in actions {
            if let Some(installed) = sim_session.actions.get(id) {
                let part = installed.descriptor.part.clone();
                let current = state
                    .parts
                    .get(&part)
                    .map(|p| p.positions.clone())
                    .unwrap_or_default();
                let motion = ActiveMotion::new(
                    *id,
                    installed.descriptor.reactions.clone(),
                    &installed.params,
                    current,
                );
                sim_session.active.insert(part.clone(), motion);
                events.push(ControllerEvent {
                    tick,
                    part,
                    kind: EventKind::ActionStarted { action: *id },
                });
            }
        }
        sim_session.publish(events);

        let running = sim_session
            .task
            .as_ref()
            .is_some_and(|task| !task.is_finished());
        if !running {
            let shared = Arc::clone(&self.shared);
            sim_session.task = Some(tokio::spawn(run_realtime(shared, session)));
        }
        info!(controller = %self.shared.name, %session, ?actions, "Started actions");
        Ok(())
    }

    async fn watch_events(
        &self,
        ctx: &CallContext,
        session: RemoteSessionId,
    ) -> Result<EventStream, ControllerError> {
        let mut state = self.shared.state.lock();
        state.record("watch_events", ctx);
        state.ensure_up()?;
        let (tx, rx) = mpsc::unbounded();
        state.session_mut(session)?.subscribers.push(tx);
        Ok(rx.boxed())
    }

    async fn end_session(
        &self,
        ctx: &CallContext,
        session: RemoteSessionId,
    ) -> Result<(), ControllerError> {
        let mut state = self.shared.state.lock();
        state.record("end_session", ctx);
        state.ensure_up()?;
        let mut removed = state
            .sessions
            .remove(&session)
            .ok_or(ControllerError::UnknownSession(session))?;
        removed.close();
        for part in state.parts.values_mut() {
            if part.owner == Some(session) {
                part.owner = None;
            }
        }
        info!(controller = %self.shared.name, %session, "Session ended");
        Ok(())
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`SimulatedController`].
#[derive(Debug, Clone)]
pub struct SimulatedControllerBuilder {
    name: String,
    mode: MockMode,
    tick_period: Duration,
    status_interval: u64,
    parts: Vec<SimulatedPartConfig>,
}

impl Default for SimulatedControllerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedControllerBuilder {
    /// Builder with default timing and no parts.
    pub fn new() -> Self {
        Self {
            name: "simulated_controller".into(),
            mode: MockMode::default(),
            tick_period: DEFAULT_TICK_PERIOD,
            status_interval: DEFAULT_STATUS_INTERVAL_TICKS,
            parts: Vec::new(),
        }
    }

    /// Controller name used in logs.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Tick pacing.
    pub fn mode(mut self, mode: MockMode) -> Self {
        self.mode = mode;
        self
    }

    /// Real-time control period.
    pub fn tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    /// Ticks between periodic status events.
    pub fn status_interval_ticks(mut self, ticks: u64) -> Self {
        self.status_interval = ticks;
        self
    }

    /// Add a part.
    pub fn part(mut self, part: SimulatedPartConfig) -> Self {
        self.parts.push(part);
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<SimulatedController, ControllerError> {
        if self.tick_period.is_zero() {
            return Err(ControllerError::InvalidRequest(
                "tick period must be positive".into(),
            ));
        }

        let mut parts = BTreeMap::new();
        let mut config = ControllerConfig {
            control_frequency_hz: 1.0 / self.tick_period.as_secs_f64(),
            parts: BTreeMap::new(),
        };
        for part in self.parts {
            if part.joint_count == 0 {
                return Err(ControllerError::InvalidRequest(format!(
                    "part '{}' has no joints",
                    part.name
                )));
            }
            let positions = part.resolved_positions().ok_or_else(|| {
                ControllerError::InvalidRequest(format!(
                    "part '{}' has {} joints but {} initial positions",
                    part.name,
                    part.joint_count,
                    part.initial_positions.len()
                ))
            })?;
            let part_config = PartConfig {
                name: part.name.clone(),
                joint_count: part.joint_count,
                position_controlled: true,
            };
            if parts.contains_key(&part.name) {
                return Err(ControllerError::InvalidRequest(format!(
                    "duplicate part '{}'",
                    part.name
                )));
            }
            config.parts.insert(part.name.clone(), part_config.clone());
            parts.insert(
                part.name,
                SimPart {
                    config: part_config,
                    behavior: part.behavior,
                    positions,
                    owner: None,
                },
            );
        }

        Ok(SimulatedController {
            shared: Arc::new(Shared {
                name: self.name,
                mode: self.mode,
                tick_period: self.tick_period,
                status_interval: self.status_interval.max(1),
                config,
                state: Mutex::new(ControllerState {
                    up: true,
                    clock: 0,
                    parts,
                    sessions: BTreeMap::new(),
                    next_session: 0,
                    calls: Vec::new(),
                }),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use motion_core::action::FixedParams;
    use motion_core::condition::Condition;
    use motion_core::ids::ReactionId;
    use motion_core::reaction::{RealtimeReaction, RealtimeResponse};

    fn controller() -> SimulatedController {
        SimulatedController::builder()
            .part(SimulatedPartConfig::new("arm", 2))
            .part(SimulatedPartConfig::new("gripper", 1))
            .build()
            .unwrap()
    }

    fn ctx() -> CallContext {
        CallContext::new()
    }

    fn descriptor(id: u64, reactions: Vec<RealtimeReaction>) -> ActionDescriptor {
        ActionDescriptor {
            id: ActionId(id),
            action_type: point_to_point::ACTION_TYPE_NAME.into(),
            part: "arm".into(),
            fixed_params: point_to_point::fixed_params(vec![0.1, 0.2], vec![0.0, 0.0]).unwrap(),
            reactions,
        }
    }

    fn transition(id: u64, target: u64) -> RealtimeReaction {
        RealtimeReaction {
            id: ReactionId(id),
            condition: Condition::Done,
            response: RealtimeResponse::StartAction {
                target: ActionId(target),
            },
        }
    }

    async fn registered(controller: &SimulatedController) -> RemoteSessionId {
        let session = controller.open_session(&ctx()).await.unwrap();
        controller
            .register_parts(&ctx(), session, &["arm".to_string()])
            .await
            .unwrap();
        session
    }

    #[test]
    fn test_builder_rejects_bad_parts() {
        let err = SimulatedController::builder()
            .part(SimulatedPartConfig::new("arm", 2).with_positions(vec![0.0]))
            .build()
            .unwrap_err();
        assert!(matches!(err, ControllerError::InvalidRequest(_)));

        let err = SimulatedController::builder()
            .part(SimulatedPartConfig::new("arm", 2))
            .part(SimulatedPartConfig::new("arm", 2))
            .build()
            .unwrap_err();
        assert!(matches!(err, ControllerError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_config_reflects_parts() {
        let controller = controller();
        let config = controller.get_config(&ctx()).await.unwrap();
        assert_eq!(config.part_config("arm").unwrap().joint_count, 2);
        assert!((config.control_frequency_hz - 1000.0).abs() < 1e-9);
        assert_eq!(controller.call_count("get_config"), 1);
    }

    #[tokio::test]
    async fn test_exclusive_registration() {
        let controller = controller();
        let first = registered(&controller).await;
        let second = controller.open_session(&ctx()).await.unwrap();

        let err = controller
            .register_parts(&ctx(), second, &["gripper".to_string(), "arm".to_string()])
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ControllerError::PartClaimed {
                part: "arm".into(),
                holder: first
            }
        );
        // all or nothing: the free gripper was not claimed either
        assert_eq!(controller.part_owner("gripper"), None);

        controller.end_session(&ctx(), first).await.unwrap();
        assert_eq!(controller.part_owner("arm"), None);
        controller
            .register_parts(&ctx(), second, &["arm".to_string()])
            .await
            .unwrap();
        assert_eq!(controller.part_owner("arm"), Some(second));
    }

    #[tokio::test]
    async fn test_upload_requires_registration() {
        let controller = controller();
        let session = controller.open_session(&ctx()).await.unwrap();
        let err = controller
            .add_actions(&ctx(), session, vec![descriptor(1, vec![])])
            .await
            .unwrap_err();
        assert!(matches!(err, ControllerError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_dangling_transition_rejects_whole_batch() {
        let controller = controller();
        let session = registered(&controller).await;

        let err = controller
            .add_actions(
                &ctx(),
                session,
                vec![descriptor(1, vec![transition(1, 2)]), descriptor(3, vec![transition(2, 7)])],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ControllerError::GraphRejected(_)));
        assert!(controller.installed_actions(session).is_empty());
    }

    #[tokio::test]
    async fn test_transition_may_target_previously_installed_action() {
        let controller = controller();
        let session = registered(&controller).await;

        controller
            .add_actions(&ctx(), session, vec![descriptor(1, vec![])])
            .await
            .unwrap();
        controller
            .add_actions(&ctx(), session, vec![descriptor(2, vec![transition(1, 1)])])
            .await
            .unwrap();
        assert_eq!(
            controller.installed_actions(session),
            vec![ActionId(1), ActionId(2)]
        );
    }

    #[tokio::test]
    async fn test_malformed_payloads_rejected() {
        let controller = controller();
        let session = registered(&controller).await;

        let mut wrong_joints = descriptor(1, vec![]);
        wrong_joints.fixed_params = point_to_point::fixed_params(vec![0.0], vec![0.0]).unwrap();

        let mut garbage = descriptor(2, vec![]);
        garbage.fixed_params = FixedParams(serde_json::json!({"goal": "nowhere"}));

        let mut unknown_type = descriptor(3, vec![]);
        unknown_type.action_type = "xfa.cartesian_move".into();

        let mut unknown_signal = descriptor(4, vec![]);
        unknown_signal.reactions.push(RealtimeReaction {
            id: ReactionId(9),
            condition: Condition::is_true("xfa.is_happy"),
            response: RealtimeResponse::NotifyWatcher,
        });

        let mut other_part = descriptor(5, vec![]);
        other_part.part = "gripper".into();

        for bad in [wrong_joints, garbage, unknown_type, unknown_signal, other_part] {
            let id = bad.id;
            let err = controller
                .add_actions(&ctx(), session, vec![bad])
                .await
                .unwrap_err();
            assert!(
                matches!(err, ControllerError::GraphRejected(_)),
                "{id} should be rejected, got {err:?}"
            );
        }
        assert!(controller.installed_actions(session).is_empty());
    }

    #[tokio::test]
    async fn test_start_unknown_action() {
        let controller = controller();
        let session = registered(&controller).await;
        let err = controller
            .start_actions(&ctx(), session, &[ActionId(4)])
            .await
            .unwrap_err();
        assert_eq!(err, ControllerError::UnknownAction(ActionId(4)));
    }

    #[tokio::test]
    async fn test_crash_makes_rpcs_unavailable() {
        let controller = controller();
        let session = registered(&controller).await;
        controller.crash();

        let err = controller.get_config(&ctx()).await.unwrap_err();
        assert!(matches!(err, ControllerError::Unavailable(_)));
        assert!(controller.end_session(&ctx(), session).await.is_err());

        controller.restart();
        assert_eq!(controller.session_count(), 0);
        assert_eq!(controller.part_owner("arm"), None);
        assert!(controller.get_config(&ctx()).await.is_ok());
    }
}
