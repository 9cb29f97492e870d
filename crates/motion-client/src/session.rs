//! Control session: exclusive control of a set of parts and the watcher loop.
//!
//! A [`Session`] walks the lifecycle strictly in order. Each transition is a
//! single RPC and fails without retrying; a failed transition leaves the
//! session in the state it was in. Once [`SessionState::Terminated`] is
//! reached every operation fails with [`SessionError::SessionClosed`].
//!
//! # Watcher loop
//!
//! [`Session::run_watcher_loop`] is a plain dispatcher. It consumes the event
//! stream in arrival order and runs the callback of each watcher reaction
//! that fires, one callback per event, on the calling task. It returns when a
//! callback asks it to stop, when the owner cancels, or with
//! [`SessionError::StreamClosed`] when the stream ends first. There is no
//! loop-level timeout: timeouts are reactions in the graph.

use crate::client::{call_error, ControllerConnection};
use futures::StreamExt;
use motion_core::channel::EventStream;
use motion_core::error::{ControllerError, SessionError, SessionResult};
use motion_core::event::{ControllerEvent, EventKind};
use motion_core::graph::{ActionGraph, ArmedWatcher};
use motion_core::ids::{ActionId, ReactionId, ReactionIdAllocator, RemoteSessionId};
use motion_core::lifecycle::SessionState;
use motion_core::limits::SESSION_RELEASE_TIMEOUT;
use motion_core::watcher::{LoopControl, WatcherOutcome};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

/// Counters of one watcher loop run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Events received from the stream.
    pub events: usize,
    /// Realtime transitions observed.
    pub transitions: usize,
    /// Watcher callbacks invoked.
    pub callbacks: usize,
}

/// Cancels a session from another task.
///
/// Cancelling unblocks a running watcher loop, which then releases the
/// session. A callback already running is allowed to finish. A session that
/// is not running releases itself on its next lifecycle operation.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelHandle {
    /// A handle that is not cancelled, for passing to
    /// [`Session::connect_with_cancel`].
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Client handle of one remote control session.
pub struct Session {
    connection: ControllerConnection,
    remote: RemoteSessionId,
    state: SessionState,
    parts: Vec<String>,
    uploaded: BTreeSet<ActionId>,
    watchers: BTreeMap<ReactionId, ArmedWatcher>,
    reaction_ids: ReactionIdAllocator,
    events: Option<EventStream>,
    cancel: CancelHandle,
    cancel_rx: watch::Receiver<bool>,
    stats: LoopStats,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("remote", &self.remote)
            .field("state", &self.state)
            .field("parts", &self.parts)
            .field("uploaded", &self.uploaded)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Open a remote session. The session starts out `Connected`.
    pub async fn connect(connection: ControllerConnection) -> SessionResult<Self> {
        Self::connect_with_cancel(connection, CancelHandle::new()).await
    }

    /// Open a remote session that `cancel` can close from elsewhere.
    pub async fn connect_with_cancel(
        connection: ControllerConnection,
        cancel: CancelHandle,
    ) -> SessionResult<Self> {
        let ctx = connection.call_context();
        let remote = connection
            .channel()
            .open_session(&ctx)
            .await
            .map_err(call_error)?;
        info!(session = %remote, address = %connection.address(), "Session connected");

        let cancel_rx = cancel.tx.subscribe();
        Ok(Self {
            connection,
            remote,
            state: SessionState::Connected,
            parts: Vec::new(),
            uploaded: BTreeSet::new(),
            watchers: BTreeMap::new(),
            reaction_ids: ReactionIdAllocator::new(),
            events: None,
            cancel,
            cancel_rx,
            stats: LoopStats::default(),
        })
    }

    /// Open a session and claim `parts`.
    ///
    /// If registration fails the session is dropped, which releases it.
    pub async fn start<I, S>(connection: ControllerConnection, parts: I) -> SessionResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::start_with_cancel(connection, parts, CancelHandle::new()).await
    }

    /// [`Session::start`] with a cancel handle supplied by the caller.
    pub async fn start_with_cancel<I, S>(
        connection: ControllerConnection,
        parts: I,
        cancel: CancelHandle,
    ) -> SessionResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut session = Self::connect_with_cancel(connection, cancel).await?;
        session.register_parts(parts).await?;
        Ok(session)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Controller-side session id.
    pub fn remote_id(&self) -> RemoteSessionId {
        self.remote
    }

    /// Registered parts.
    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// Counters of the last watcher loop run.
    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    /// Handle to cancel this session from elsewhere.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    fn expect_state(&self, operation: &'static str, expected: SessionState) -> SessionResult<()> {
        if self.state.is_terminal() {
            return Err(SessionError::SessionClosed);
        }
        if self.state != expected {
            return Err(SessionError::OutOfOrder {
                operation,
                state: self.state,
            });
        }
        Ok(())
    }

    // A cancelled session gives its parts back before reporting it.
    async fn ensure_not_cancelled(&mut self) -> SessionResult<()> {
        let cancelled = *self.cancel_rx.borrow();
        if cancelled {
            info!(session = %self.remote, state = %self.state, "Session cancelled");
            self.release().await;
            return Err(SessionError::Cancelled);
        }
        Ok(())
    }

    fn advance(&mut self, next: SessionState) {
        debug_assert!(self.state.can_transition_to(next));
        debug!(session = %self.remote, from = %self.state, to = %next, "Session state change");
        self.state = next;
    }

    /// `Connected -> PartsRegistered`: claim exclusive control of `parts`.
    ///
    /// On failure the session stays `Connected`.
    pub async fn register_parts<I, S>(&mut self, parts: I) -> SessionResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expect_state("register parts", SessionState::Connected)?;
        self.ensure_not_cancelled().await?;
        let parts: Vec<String> = parts.into_iter().map(Into::into).collect();
        if parts.is_empty() {
            return Err(SessionError::Precondition(
                "a session must register at least one part".into(),
            ));
        }

        let ctx = self.connection.call_context();
        let result = self
            .connection
            .channel()
            .register_parts(&ctx, self.remote, &parts)
            .await;
        if let Err(e) = result {
            warn!(session = %self.remote, ?parts, error = %e, "Part registration failed");
            return Err(match e {
                ControllerError::PartClaimed { part, holder } => SessionError::Registration {
                    part,
                    reason: format!("already claimed by {holder}"),
                },
                ControllerError::UnknownPart(part) => SessionError::Registration {
                    part,
                    reason: "no such part on this controller".into(),
                },
                other => call_error(other),
            });
        }

        info!(session = %self.remote, ?parts, "Parts registered");
        self.parts = parts;
        self.advance(SessionState::PartsRegistered);
        Ok(())
    }

    /// `PartsRegistered -> GraphUploaded`: upload `graph` in one batch.
    ///
    /// The controller validates the batch as a whole. On rejection nothing is
    /// installed and the session stays `PartsRegistered`.
    pub async fn add_actions(&mut self, graph: ActionGraph) -> SessionResult<()> {
        self.expect_state("upload actions", SessionState::PartsRegistered)?;
        self.ensure_not_cancelled().await?;
        if graph.is_empty() {
            return Err(SessionError::Precondition("action graph is empty".into()));
        }

        let compiled = graph.compile(&mut self.reaction_ids);
        let ids: Vec<ActionId> = compiled.descriptors.iter().map(|d| d.id).collect();
        let ctx = self.connection.call_context();
        let result = self
            .connection
            .channel()
            .add_actions(&ctx, self.remote, compiled.descriptors)
            .await;
        if let Err(e) = result {
            warn!(session = %self.remote, error = %e, "Action graph rejected");
            return Err(match e {
                ControllerError::GraphRejected(reason) | ControllerError::InvalidRequest(reason) => {
                    SessionError::UploadRejected(reason)
                }
                other => call_error(other),
            });
        }

        info!(
            session = %self.remote,
            actions = ids.len(),
            watchers = compiled.watchers.len(),
            "Action graph uploaded"
        );
        self.uploaded.extend(ids);
        self.watchers.extend(compiled.watchers);
        self.advance(SessionState::GraphUploaded);
        Ok(())
    }

    /// `GraphUploaded -> Running`: start the entry action.
    ///
    /// Subscribes to the event stream first so that no event of the started
    /// motion can be missed. Activation is fire-and-forget; every later
    /// transition happens inside the controller.
    pub async fn start_action(&mut self, entry: ActionId) -> SessionResult<()> {
        self.expect_state("start an action", SessionState::GraphUploaded)?;
        self.ensure_not_cancelled().await?;
        if !self.uploaded.contains(&entry) {
            return Err(SessionError::Precondition(format!(
                "entry {entry} is not part of the uploaded graph"
            )));
        }

        let channel = self.connection.channel();
        let events = channel
            .watch_events(&self.connection.call_context(), self.remote)
            .await
            .map_err(call_error)?;
        channel
            .start_actions(&self.connection.call_context(), self.remote, &[entry])
            .await
            .map_err(call_error)?;

        info!(session = %self.remote, %entry, "Entry action started");
        self.events = Some(events);
        self.advance(SessionState::Running);
        Ok(())
    }

    /// `Running -> Terminated`: dispatch watcher callbacks until one of them
    /// stops the loop.
    ///
    /// The session is released whatever the result.
    pub async fn run_watcher_loop(&mut self) -> SessionResult<WatcherOutcome> {
        self.expect_state("run the watcher loop", SessionState::Running)?;
        let Some(mut events) = self.events.take() else {
            return Err(SessionError::StreamClosed { events_received: 0 });
        };

        self.stats = LoopStats::default();
        let mut control = LoopControl::new();
        let mut cancel = self.cancel_rx.clone();
        debug!(session = %self.remote, armed = self.watchers.len(), "Watcher loop started");

        let result = loop {
            tokio::select! {
                biased;
                _ = cancel.wait_for(|cancelled| *cancelled) => {
                    info!(session = %self.remote, "Watcher loop cancelled");
                    break Err(SessionError::Cancelled);
                }
                event = events.next() => match event {
                    Some(event) => {
                        self.stats.events += 1;
                        self.dispatch(&event, &mut control);
                        if let Some(outcome) = control.take_exit() {
                            break Ok(outcome);
                        }
                    }
                    None => {
                        warn!(
                            session = %self.remote,
                            events = self.stats.events,
                            "Event stream closed before the watcher loop was stopped"
                        );
                        break Err(SessionError::StreamClosed {
                            events_received: self.stats.events,
                        });
                    }
                },
            }
        };
        drop(events);

        match &result {
            Ok(WatcherOutcome::Finished) => {
                info!(session = %self.remote, stats = ?self.stats, "Watcher loop finished")
            }
            Ok(WatcherOutcome::TimedOut { reason }) => {
                warn!(session = %self.remote, %reason, "Watcher loop stopped on timeout reaction")
            }
            Err(_) => {}
        }

        self.release().await;
        result
    }

    /// Upload `graph`, start `entry` and run the watcher loop to completion.
    pub async fn upload_and_run(
        &mut self,
        graph: ActionGraph,
        entry: ActionId,
    ) -> SessionResult<WatcherOutcome> {
        self.add_actions(graph).await?;
        self.start_action(entry).await?;
        self.run_watcher_loop().await
    }

    /// Release the remote session and its parts.
    pub async fn end(mut self) -> SessionResult<()> {
        if self.state.is_terminal() {
            return Ok(());
        }
        let ctx = self.connection.call_context();
        let result = tokio::time::timeout(
            SESSION_RELEASE_TIMEOUT,
            self.connection.channel().end_session(&ctx, self.remote),
        )
        .await;
        self.terminate();
        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(call_error(e)),
            Err(_) => Err(SessionError::Connection(format!(
                "releasing {} timed out after {SESSION_RELEASE_TIMEOUT:?}",
                self.remote
            ))),
        }
    }

    fn dispatch(&mut self, event: &ControllerEvent, control: &mut LoopControl) {
        match &event.kind {
            EventKind::Status { status } => {
                trace!(session = %self.remote, part = %event.part, tick = status.tick, "Part status");
            }
            EventKind::ActionStarted { action } => {
                debug!(session = %self.remote, part = %event.part, %action, "Action started");
            }
            EventKind::RealtimeTransition { reaction, from, to } => {
                self.stats.transitions += 1;
                debug!(
                    session = %self.remote,
                    part = %event.part,
                    tick = event.tick,
                    %reaction,
                    %from,
                    %to,
                    "Realtime transition"
                );
            }
            EventKind::WatcherReaction { reaction, action } => {
                let Some(watcher_event) = event.as_watcher_event() else {
                    return;
                };
                match self.watchers.get_mut(reaction) {
                    Some(armed) if armed.action == *action => {
                        debug!(session = %self.remote, tick = event.tick, %reaction, %action, "Dispatching watcher");
                        control.record_dispatch();
                        self.stats.callbacks += 1;
                        (armed.callback)(&watcher_event, control);
                    }
                    _ => {
                        warn!(session = %self.remote, %reaction, %action, "Ignoring event for unarmed watcher reaction");
                    }
                }
            }
        }
    }

    async fn release(&mut self) {
        let ctx = self.connection.call_context();
        let result = tokio::time::timeout(
            SESSION_RELEASE_TIMEOUT,
            self.connection.channel().end_session(&ctx, self.remote),
        )
        .await;
        match result {
            Ok(Ok(())) => info!(session = %self.remote, "Session released"),
            Ok(Err(e)) => warn!(session = %self.remote, error = %e, "Failed to release session"),
            Err(_) => warn!(session = %self.remote, "Timed out releasing session"),
        }
        self.terminate();
    }

    fn terminate(&mut self) {
        self.events = None;
        self.watchers.clear();
        self.advance(SessionState::Terminated);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        let channel = Arc::clone(self.connection.channel());
        let ctx = self.connection.call_context();
        let remote = self.remote;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!(session = %remote, state = %self.state, "Releasing dropped session");
                handle.spawn(async move {
                    let released =
                        tokio::time::timeout(SESSION_RELEASE_TIMEOUT, channel.end_session(&ctx, remote))
                            .await;
                    if !matches!(released, Ok(Ok(()))) {
                        warn!(session = %remote, "Failed to release dropped session");
                    }
                });
            }
            Err(_) => {
                warn!(session = %remote, "Session dropped outside a runtime; remote session leaked");
            }
        }
    }
}
