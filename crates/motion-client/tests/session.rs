//! Session lifecycle tests against the simulated controller.

use motion_client::{CancelHandle, ControllerConnection, Session};
use motion_core::channel::REQUEST_ID_KEY;
use motion_core::prelude::*;
use motion_driver_mock::{SettleBehavior, SimulatedController, SimulatedPartConfig};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn controller(behavior: SettleBehavior) -> SimulatedController {
    SimulatedController::builder()
        .part(SimulatedPartConfig::new("arm", 2).with_behavior(behavior))
        .part(SimulatedPartConfig::new("gripper", 1))
        .build()
        .unwrap()
}

fn connection(controller: &SimulatedController) -> ControllerConnection {
    ControllerConnection::new(Arc::new(controller.clone()), "sim://robot", "robot_controller")
}

fn move_arm(id: u64, goal: Vec<f64>) -> Action {
    let velocity = vec![0.0; goal.len()];
    Action::new(ActionId(id), point_to_point::ACTION_TYPE_NAME, "arm")
        .with_fixed_params(point_to_point::fixed_params(goal, velocity).unwrap())
}

/// Out and back, finishing when the second move settles.
fn out_and_back() -> ActionGraph {
    ActionGraph::from_actions([
        move_arm(1, vec![0.1, 0.0]).with_reaction(Reaction::realtime(Condition::Done, ActionId(2))),
        move_arm(2, vec![0.0, 0.0]).with_reaction(Reaction::watcher(
            Condition::is_true(point_to_point::IS_SETTLED),
            |_event, control| control.quit(),
        )),
    ])
    .unwrap()
}

async fn registered(controller: &SimulatedController) -> Session {
    Session::start(connection(controller), ["arm"]).await.unwrap()
}

#[tokio::test]
async fn test_full_lifecycle() {
    let controller = controller(SettleBehavior::Settle);
    let mut session = Session::connect(connection(&controller)).await.unwrap();
    assert_eq!(session.state(), SessionState::Connected);

    session.register_parts(["arm"]).await.unwrap();
    assert_eq!(session.state(), SessionState::PartsRegistered);
    assert_eq!(controller.part_owner("arm"), Some(session.remote_id()));

    session.add_actions(out_and_back()).await.unwrap();
    assert_eq!(session.state(), SessionState::GraphUploaded);

    session.start_action(ActionId(1)).await.unwrap();
    assert_eq!(session.state(), SessionState::Running);

    let outcome = session.run_watcher_loop().await.unwrap();
    assert_eq!(outcome, WatcherOutcome::Finished);
    assert_eq!(session.state(), SessionState::Terminated);
    assert_eq!(session.stats().transitions, 1);
    assert_eq!(session.stats().callbacks, 1);

    assert_eq!(controller.session_count(), 0);
    assert_eq!(controller.part_owner("arm"), None);
    assert_eq!(controller.part_positions("arm"), Some(vec![0.0, 0.0]));
}

#[tokio::test]
async fn test_transitions_cannot_be_skipped() {
    let controller = controller(SettleBehavior::Settle);
    let mut session = Session::connect(connection(&controller)).await.unwrap();

    let err = session.add_actions(out_and_back()).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::OutOfOrder {
            operation: "upload actions",
            state: SessionState::Connected
        }
    ));

    session.register_parts(["arm"]).await.unwrap();
    let err = session.start_action(ActionId(1)).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::OutOfOrder {
            state: SessionState::PartsRegistered,
            ..
        }
    ));
    let err = session.run_watcher_loop().await.unwrap_err();
    assert!(matches!(err, SessionError::OutOfOrder { .. }));

    // nothing reached the controller beyond registration
    assert_eq!(controller.call_count("add_actions"), 0);
    assert_eq!(controller.call_count("start_actions"), 0);
}

#[tokio::test]
async fn test_registration_conflict_keeps_session_connected() {
    let controller = controller(SettleBehavior::Settle);
    let holder = registered(&controller).await;

    let mut contender = Session::connect(connection(&controller)).await.unwrap();
    let err = contender.register_parts(["gripper", "arm"]).await.unwrap_err();

    assert!(matches!(err, SessionError::Registration { ref part, .. } if part == "arm"));
    assert!(err.is_recoverable());
    assert_eq!(contender.state(), SessionState::Connected);
    assert_eq!(controller.part_owner("gripper"), None);

    // picking another part works on the same session
    contender.register_parts(["gripper"]).await.unwrap();
    assert_eq!(contender.state(), SessionState::PartsRegistered);

    holder.end().await.unwrap();
    contender.end().await.unwrap();
    assert_eq!(controller.session_count(), 0);
}

#[tokio::test]
async fn test_start_reports_registration_error() {
    let controller = controller(SettleBehavior::Settle);
    let err = Session::start(connection(&controller), ["wrist"])
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Registration { ref part, .. } if part == "wrist"));
}

#[tokio::test]
async fn test_rejected_upload_is_atomic() {
    let controller = controller(SettleBehavior::Settle);
    let mut session = registered(&controller).await;

    let dangling = ActionGraph::from_actions([
        move_arm(1, vec![0.1, 0.0]).with_reaction(Reaction::realtime(Condition::Done, ActionId(2))),
        move_arm(3, vec![0.0, 0.0]).with_reaction(Reaction::realtime(Condition::Done, ActionId(9))),
    ])
    .unwrap();
    let err = session.add_actions(dangling).await.unwrap_err();

    assert!(matches!(err, SessionError::UploadRejected(_)));
    assert_eq!(session.state(), SessionState::PartsRegistered);
    assert!(controller.installed_actions(session.remote_id()).is_empty());

    session.add_actions(out_and_back()).await.unwrap();
    assert_eq!(
        controller.installed_actions(session.remote_id()),
        vec![ActionId(1), ActionId(2)]
    );
}

#[tokio::test]
async fn test_wrong_joint_count_is_rejected() {
    let controller = controller(SettleBehavior::Settle);
    let mut session = registered(&controller).await;

    let graph = ActionGraph::from_actions([move_arm(1, vec![0.1, 0.0, 0.0])]).unwrap();
    let err = session.add_actions(graph).await.unwrap_err();
    assert!(matches!(err, SessionError::UploadRejected(_)));
}

#[tokio::test]
async fn test_entry_must_be_uploaded() {
    let controller = controller(SettleBehavior::Settle);
    let mut session = registered(&controller).await;
    session.add_actions(out_and_back()).await.unwrap();

    let err = session.start_action(ActionId(7)).await.unwrap_err();
    assert!(matches!(err, SessionError::Precondition(_)));
    assert_eq!(session.state(), SessionState::GraphUploaded);
    assert_eq!(controller.call_count("start_actions"), 0);
}

#[tokio::test]
async fn test_stream_closed_is_not_success() {
    let controller = controller(SettleBehavior::Stall);
    let mut session = registered(&controller).await;
    session.add_actions(out_and_back()).await.unwrap();
    session.start_action(ActionId(1)).await.unwrap();

    controller.crash();
    let err = session.run_watcher_loop().await.unwrap_err();

    assert!(matches!(err, SessionError::StreamClosed { events_received } if events_received >= 1));
    assert_eq!(session.state(), SessionState::Terminated);
}

#[tokio::test]
async fn test_no_dispatch_after_quit() {
    let controller = controller(SettleBehavior::Settle);
    let mut session = registered(&controller).await;

    let late_calls = Arc::new(AtomicUsize::new(0));
    let late = Arc::clone(&late_calls);
    let graph = ActionGraph::from_actions([move_arm(1, vec![0.1, 0.0])
        .with_reaction(Reaction::watcher(Condition::Done, |_event, control| {
            control.quit()
        }))
        .with_reaction(Reaction::watcher(
            Condition::is_true(point_to_point::IS_SETTLED),
            move |_event, _control| {
                late.fetch_add(1, Ordering::SeqCst);
            },
        ))])
    .unwrap();

    let outcome = session.upload_and_run(graph, ActionId(1)).await.unwrap();
    assert!(outcome.is_finished());
    assert_eq!(session.stats().callbacks, 1);
    assert_eq!(late_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_timeout_reaction_is_an_outcome() {
    let controller = controller(SettleBehavior::Stall);
    let mut session = registered(&controller).await;

    let graph = ActionGraph::from_actions([move_arm(1, vec![0.1, 0.0])
        .with_reaction(Reaction::realtime(Condition::Done, ActionId(1)))
        .with_reaction(Reaction::watcher(
            Condition::at_least(point_to_point::SETPOINT_DONE_FOR_SECONDS, 0.01),
            |_event, control| control.quit_timed_out("failed to reach goal"),
        ))])
    .unwrap();

    let outcome = session.upload_and_run(graph, ActionId(1)).await.unwrap();
    assert_eq!(
        outcome,
        WatcherOutcome::TimedOut {
            reason: "failed to reach goal".into()
        }
    );
    assert_eq!(session.stats().transitions, 0);
}

#[tokio::test]
async fn test_cancel_stops_watcher_loop() {
    let controller = controller(SettleBehavior::Settle);
    let mut session = registered(&controller).await;
    let cancel = session.cancel_handle();

    // the only callback cancels instead of quitting
    let graph = ActionGraph::from_actions([move_arm(1, vec![0.1, 0.0]).with_reaction(
        Reaction::watcher(Condition::Done, move |_event, _control| cancel.cancel()),
    )])
    .unwrap();

    let err = session.upload_and_run(graph, ActionId(1)).await.unwrap_err();
    assert!(matches!(err, SessionError::Cancelled));
    assert_eq!(session.state(), SessionState::Terminated);
    assert_eq!(controller.part_owner("arm"), None);
}

#[tokio::test]
async fn test_cancel_before_loop() {
    let controller = controller(SettleBehavior::Stall);
    let mut session = registered(&controller).await;
    session.add_actions(out_and_back()).await.unwrap();
    session.start_action(ActionId(1)).await.unwrap();

    session.cancel_handle().cancel();
    // a running session is still released by the loop
    let err = session.run_watcher_loop().await.unwrap_err();
    assert!(matches!(err, SessionError::Cancelled));
    assert_eq!(session.state(), SessionState::Terminated);
    assert_eq!(controller.session_count(), 0);
}

#[tokio::test]
async fn test_cancel_before_upload_releases_parts() {
    let controller = controller(SettleBehavior::Settle);
    let mut session = registered(&controller).await;
    assert_eq!(controller.part_owner("arm"), Some(session.remote_id()));

    session.cancel_handle().cancel();
    let err = session.add_actions(out_and_back()).await.unwrap_err();

    assert!(matches!(err, SessionError::Cancelled));
    assert_eq!(session.state(), SessionState::Terminated);
    assert_eq!(controller.part_owner("arm"), None);
    assert_eq!(controller.session_count(), 0);
    assert_eq!(controller.call_count("add_actions"), 0);

    let err = session.start_action(ActionId(1)).await.unwrap_err();
    assert!(matches!(err, SessionError::SessionClosed));
}

#[tokio::test]
async fn test_cancel_after_upload_releases_parts() {
    let controller = controller(SettleBehavior::Settle);
    let mut session = registered(&controller).await;
    session.add_actions(out_and_back()).await.unwrap();

    session.cancel_handle().cancel();
    let err = session.start_action(ActionId(1)).await.unwrap_err();

    assert!(matches!(err, SessionError::Cancelled));
    assert_eq!(controller.part_owner("arm"), None);
    assert_eq!(controller.call_count("start_actions"), 0);
}

#[tokio::test]
async fn test_start_with_cancelled_handle() {
    let controller = controller(SettleBehavior::Settle);
    let cancel = CancelHandle::new();
    cancel.cancel();

    let err = Session::start_with_cancel(connection(&controller), ["arm"], cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Cancelled));
    assert_eq!(controller.call_count("register_parts"), 0);
    assert_eq!(controller.session_count(), 0);
}

#[tokio::test]
async fn test_callbacks_run_in_arrival_order() {
    let controller = controller(SettleBehavior::Ramp { ticks: 10 });
    let mut session = registered(&controller).await;

    let seen: Arc<Mutex<Vec<(&'static str, u64)>>> = Arc::default();
    let record = |label: &'static str, quit: bool| {
        let seen = Arc::clone(&seen);
        move |event: &WatcherEvent, control: &mut LoopControl| {
            seen.lock().unwrap().push((label, event.tick));
            if quit {
                control.quit();
            }
        }
    };

    // declared out of firing order: done and settled share a tick, the
    // thresholds come 2 and 5 ticks after the setpoint finishes
    let graph = ActionGraph::from_actions([move_arm(1, vec![0.1, 0.0])
        .with_reaction(Reaction::watcher(
            Condition::at_least(point_to_point::SETPOINT_DONE_FOR_SECONDS, 0.0015),
            record("two_ticks_later", false),
        ))
        .with_reaction(Reaction::watcher(Condition::Done, record("done", false)))
        .with_reaction(Reaction::watcher(
            Condition::is_true(point_to_point::IS_SETTLED),
            record("settled", false),
        ))
        .with_reaction(Reaction::watcher(
            Condition::at_least(point_to_point::SETPOINT_DONE_FOR_SECONDS, 0.0045),
            record("five_ticks_later", true),
        ))])
    .unwrap();

    let outcome = session.upload_and_run(graph, ActionId(1)).await.unwrap();
    assert!(outcome.is_finished());
    assert_eq!(session.stats().callbacks, 4);

    let seen = seen.lock().unwrap().clone();
    let labels: Vec<_> = seen.iter().map(|(label, _)| *label).collect();
    assert_eq!(labels, vec!["done", "settled", "two_ticks_later", "five_ticks_later"]);

    let ticks: Vec<_> = seen.iter().map(|(_, tick)| *tick).collect();
    assert_eq!(ticks[0], ticks[1]);
    assert_eq!(ticks[2], ticks[0] + 2);
    assert_eq!(ticks[3], ticks[0] + 5);
}

#[tokio::test]
async fn test_terminated_session_is_closed() {
    let controller = controller(SettleBehavior::Settle);
    let mut session = registered(&controller).await;
    session.upload_and_run(out_and_back(), ActionId(1)).await.unwrap();

    let err = session.add_actions(out_and_back()).await.unwrap_err();
    assert!(matches!(err, SessionError::SessionClosed));
    let err = session.start_action(ActionId(1)).await.unwrap_err();
    assert!(matches!(err, SessionError::SessionClosed));
    assert!(session.end().await.is_ok());
}

#[tokio::test]
async fn test_every_call_carries_metadata() {
    let controller = controller(SettleBehavior::Settle);
    let mut session = registered(&controller).await;
    session.upload_and_run(out_and_back(), ActionId(1)).await.unwrap();

    let calls = controller.recorded_calls();
    let operations: Vec<_> = calls.iter().map(|c| c.operation).collect();
    assert_eq!(
        operations,
        vec![
            "open_session",
            "register_parts",
            "add_actions",
            "watch_events",
            "start_actions",
            "end_session"
        ]
    );

    let request_ids: BTreeSet<_> = calls
        .iter()
        .map(|c| c.context.get(REQUEST_ID_KEY).unwrap().to_string())
        .collect();
    assert_eq!(request_ids.len(), calls.len());
    assert!(calls
        .iter()
        .all(|c| c.context.instance_name() == Some("robot_controller")));
}

#[tokio::test]
async fn test_drop_releases_session() {
    let controller = controller(SettleBehavior::Settle);
    let session = registered(&controller).await;
    assert_eq!(controller.session_count(), 1);

    drop(session);
    for _ in 0..100 {
        if controller.session_count() == 0 {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(controller.session_count(), 0);
    assert_eq!(controller.part_owner("arm"), None);
}
