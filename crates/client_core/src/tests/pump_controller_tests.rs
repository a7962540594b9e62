use super::*;
use std::collections::HashMap;

use async_trait::async_trait;
use axum::{http::StatusCode, routing::post, Json, Router};
use reqwest::Client;
use serde_json::Value;
use shared::error::FetchErrorKind;
use tokio::sync::oneshot;

use crate::{signal_client::SignalClient, test_support::spawn_server};

type Reply = Result<(), FetchError>;

/// Signal transport whose responses are released by the test. Commands
/// without a gate are acknowledged immediately.
#[derive(Default)]
struct GatedSignal {
    gates: Mutex<HashMap<PumpCommand, oneshot::Receiver<Reply>>>,
    sent: Mutex<Vec<PumpCommand>>,
}

impl GatedSignal {
    async fn gate(&self, command: PumpCommand) -> oneshot::Sender<Reply> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().await.insert(command, rx);
        tx
    }

    async fn sent(&self) -> Vec<PumpCommand> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl SignalTransport for GatedSignal {
    async fn send_signal(&self, command: PumpCommand) -> Reply {
        self.sent.lock().await.push(command);
        let gate = self.gates.lock().await.remove(&command);
        match gate {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(FetchError::transport("gate dropped"))),
            None => Ok(()),
        }
    }
}

fn controller_with(
    signal: Arc<dyn SignalTransport>,
    policy: UpdatePolicy,
) -> (Arc<PumpController>, broadcast::Receiver<ClientEvent>) {
    let (events, rx) = broadcast::channel(32);
    (PumpController::new(signal, policy, events), rx)
}

#[test]
fn state_machine_confirms_latest_request() {
    let mut state = PumpState::default();
    let ticket = state.begin(PumpCommand::On);
    assert!(state.in_flight);
    assert_eq!(state.phase(), PumpPhase::Pending);
    assert_eq!(state.confirmed, None);

    let outcome = state.resolve(ticket, Ok(()));
    assert_eq!(
        outcome,
        SignalOutcome::Confirmed {
            seq: 1,
            command: PumpCommand::On
        }
    );
    assert_eq!(state.confirmed, Some(PumpCommand::On));
    assert!(!state.in_flight);
    assert_eq!(state.phase(), PumpPhase::Idle);
}

#[test]
fn state_machine_rolls_back_failed_request() {
    let mut state = PumpState::default();
    let first = state.begin(PumpCommand::Off);
    state.resolve(first, Ok(()));

    let ticket = state.begin(PumpCommand::On);
    assert_eq!(state.output(), "1");
    let outcome = state.resolve(ticket, Err(FetchError::HttpStatus { code: 503 }));

    assert!(matches!(
        outcome,
        SignalOutcome::RolledBack {
            restored: Some(PumpCommand::Off),
            ..
        }
    ));
    assert_eq!(state.confirmed, Some(PumpCommand::Off));
    assert_eq!(state.requested, PumpCommand::Off);
    assert_eq!(state.output(), "0");
    assert_eq!(state.phase(), PumpPhase::Error);
    let info = state.last_error.as_ref().expect("error recorded");
    assert_eq!(info.seq, 2);
    assert_eq!(info.error.status_code(), Some(503));
}

#[test]
fn state_machine_discards_superseded_resolution() {
    let mut state = PumpState::default();
    let on = state.begin(PumpCommand::On);
    let off = state.begin(PumpCommand::Off);

    state.resolve(off, Ok(()));
    let outcome = state.resolve(on, Ok(()));

    assert_eq!(outcome, SignalOutcome::Superseded { seq: 1, latest: 2 });
    assert_eq!(state.confirmed, Some(PumpCommand::Off));
}

#[tokio::test]
async fn set_state_is_pending_until_acknowledged() {
    let signal = Arc::new(GatedSignal::default());
    let release = signal.gate(PumpCommand::On).await;
    let (pump, _events) = controller_with(signal.clone(), UpdatePolicy::ConfirmationGated);

    let handle = pump.set_state(PumpCommand::On).await;

    let pending = pump.snapshot().await;
    assert!(pending.in_flight);
    assert_eq!(pending.requested, PumpCommand::On);
    assert_eq!(pending.confirmed, None);
    assert_eq!(pump.animation().await, AnimationDirective::STOPPED);

    release.send(Ok(())).expect("release");
    let outcome = handle.await.expect("join");

    assert!(matches!(outcome, SignalOutcome::Confirmed { .. }));
    let state = pump.snapshot().await;
    assert!(!state.in_flight);
    assert_eq!(state.confirmed, Some(PumpCommand::On));
    assert_eq!(pump.animation().await, AnimationDirective::PLAYING);
    assert_eq!(signal.sent().await, vec![PumpCommand::On]);
}

#[tokio::test]
async fn latest_request_wins_when_older_response_arrives_last() {
    let signal = Arc::new(GatedSignal::default());
    let release_on = signal.gate(PumpCommand::On).await;
    let release_off = signal.gate(PumpCommand::Off).await;
    let (pump, _events) = controller_with(signal, UpdatePolicy::ConfirmationGated);

    let on = pump.set_state(PumpCommand::On).await;
    let off = pump.set_state(PumpCommand::Off).await;

    release_off.send(Ok(())).expect("release off");
    let off_outcome = off.await.expect("join off");
    assert_eq!(
        off_outcome,
        SignalOutcome::Confirmed {
            seq: 2,
            command: PumpCommand::Off
        }
    );

    release_on.send(Ok(())).expect("release on");
    let on_outcome = on.await.expect("join on");
    assert_eq!(on_outcome, SignalOutcome::Superseded { seq: 1, latest: 2 });

    let state = pump.snapshot().await;
    assert_eq!(state.confirmed, Some(PumpCommand::Off));
    assert!(!state.in_flight);
}

#[tokio::test]
async fn older_response_arriving_first_keeps_request_in_flight() {
    let signal = Arc::new(GatedSignal::default());
    let release_on = signal.gate(PumpCommand::On).await;
    let release_off = signal.gate(PumpCommand::Off).await;
    let (pump, _events) = controller_with(signal, UpdatePolicy::ConfirmationGated);

    let on = pump.set_state(PumpCommand::On).await;
    let off = pump.set_state(PumpCommand::Off).await;

    release_on.send(Ok(())).expect("release on");
    on.await.expect("join on");
    let state = pump.snapshot().await;
    assert!(state.in_flight);
    assert_eq!(state.confirmed, None);

    release_off.send(Ok(())).expect("release off");
    off.await.expect("join off");
    let state = pump.snapshot().await;
    assert!(!state.in_flight);
    assert_eq!(state.confirmed, Some(PumpCommand::Off));
}

#[tokio::test]
async fn failed_signal_rolls_back_to_previous_confirmation() {
    let signal = Arc::new(GatedSignal::default());
    let (pump, _events) = controller_with(signal.clone(), UpdatePolicy::ConfirmationGated);
    pump.set_state_and_wait(PumpCommand::Off).await;

    let release = signal.gate(PumpCommand::On).await;
    let handle = pump.set_state(PumpCommand::On).await;
    release
        .send(Err(FetchError::transport("connection refused")))
        .expect("release");
    let outcome = handle.await.expect("join");

    assert!(matches!(
        outcome,
        SignalOutcome::RolledBack {
            restored: Some(PumpCommand::Off),
            ..
        }
    ));
    let state = pump.snapshot().await;
    assert_eq!(state.confirmed, Some(PumpCommand::Off));
    assert_eq!(state.requested, PumpCommand::Off);
    assert_eq!(state.phase(), PumpPhase::Error);
    let info = state.last_error.expect("last error");
    assert_eq!(info.error.kind(), FetchErrorKind::Transport);
}

#[tokio::test]
async fn successful_signal_clears_previous_error() {
    let signal = Arc::new(GatedSignal::default());
    let (pump, _events) = controller_with(signal.clone(), UpdatePolicy::ConfirmationGated);

    let release = signal.gate(PumpCommand::On).await;
    let handle = pump.set_state(PumpCommand::On).await;
    release
        .send(Err(FetchError::HttpStatus { code: 502 }))
        .expect("release");
    handle.await.expect("join");
    assert!(pump.snapshot().await.last_error.is_some());

    pump.set_state_and_wait(PumpCommand::On).await;
    let state = pump.snapshot().await;
    assert_eq!(state.last_error, None);
    assert_eq!(state.confirmed, Some(PumpCommand::On));
}

#[tokio::test]
async fn superseded_failure_does_not_record_error() {
    let signal = Arc::new(GatedSignal::default());
    let release_on = signal.gate(PumpCommand::On).await;
    let (pump, _events) = controller_with(signal, UpdatePolicy::ConfirmationGated);

    let on = pump.set_state(PumpCommand::On).await;
    pump.set_state_and_wait(PumpCommand::Off).await;
    release_on
        .send(Err(FetchError::HttpStatus { code: 500 }))
        .expect("release");

    assert!(matches!(
        on.await.expect("join"),
        SignalOutcome::Superseded { .. }
    ));
    let state = pump.snapshot().await;
    assert_eq!(state.last_error, None);
    assert_eq!(state.confirmed, Some(PumpCommand::Off));
}

#[tokio::test]
async fn optimistic_policy_animates_during_flight_and_reverts_on_failure() {
    let signal = Arc::new(GatedSignal::default());
    let (pump, _events) = controller_with(signal.clone(), UpdatePolicy::Optimistic);
    pump.set_state_and_wait(PumpCommand::Off).await;

    let release = signal.gate(PumpCommand::On).await;
    let handle = pump.set_state(PumpCommand::On).await;
    assert_eq!(pump.animation().await, AnimationDirective::PLAYING);
    assert_eq!(pump.snapshot().await.confirmed, Some(PumpCommand::Off));

    release
        .send(Err(FetchError::HttpStatus { code: 500 }))
        .expect("release");
    handle.await.expect("join");

    assert_eq!(pump.animation().await, AnimationDirective::STOPPED);
    assert_eq!(pump.snapshot().await.confirmed, Some(PumpCommand::Off));
}

#[tokio::test]
async fn toggle_issues_opposite_of_displayed_state() {
    let signal = Arc::new(GatedSignal::default());
    let (pump, _events) = controller_with(signal.clone(), UpdatePolicy::ConfirmationGated);

    pump.toggle().await.await.expect("join");
    assert_eq!(pump.snapshot().await.confirmed, Some(PumpCommand::On));

    pump.toggle().await.await.expect("join");
    assert_eq!(pump.snapshot().await.confirmed, Some(PumpCommand::Off));

    assert_eq!(signal.sent().await, vec![PumpCommand::On, PumpCommand::Off]);
}

#[tokio::test]
async fn repeated_command_is_still_sent() {
    let signal = Arc::new(GatedSignal::default());
    let (pump, _events) = controller_with(signal.clone(), UpdatePolicy::ConfirmationGated);

    pump.set_state_and_wait(PumpCommand::On).await;
    pump.set_state_and_wait(PumpCommand::On).await;

    assert_eq!(signal.sent().await, vec![PumpCommand::On, PumpCommand::On]);
    assert_eq!(pump.snapshot().await.latest_seq(), 2);
}

#[tokio::test]
async fn publishes_pending_and_confirmed_snapshots() {
    let signal = Arc::new(GatedSignal::default());
    let (pump, mut events) = controller_with(signal, UpdatePolicy::ConfirmationGated);

    pump.set_state_and_wait(PumpCommand::On).await;

    let Ok(ClientEvent::PumpStateChanged { state, animation }) = events.recv().await else {
        panic!("expected pending pump event");
    };
    assert!(state.in_flight);
    assert_eq!(animation, AnimationDirective::STOPPED);

    let Ok(ClientEvent::PumpStateChanged { state, animation }) = events.recv().await else {
        panic!("expected confirmed pump event");
    };
    assert!(!state.in_flight);
    assert_eq!(state.confirmed, Some(PumpCommand::On));
    assert_eq!(animation, AnimationDirective::PLAYING);
}

async fn handle_flaky_signal(Json(body): Json<Value>) -> (StatusCode, &'static str) {
    if body["signal"] == "1" {
        (StatusCode::INTERNAL_SERVER_ERROR, "pump fault")
    } else {
        (StatusCode::OK, "Signal 0 sent")
    }
}

#[tokio::test]
async fn http_500_on_send_signal_keeps_pump_off() {
    let app = Router::new().route("/send_signal", post(handle_flaky_signal));
    let base = spawn_server(app).await.expect("spawn server");
    let signal = SignalClient::new(
        Client::new(),
        base.join("send_signal").expect("url"),
        "signal",
    );
    let (pump, _events) = controller_with(Arc::new(signal), UpdatePolicy::ConfirmationGated);

    let outcome = pump.set_state_and_wait(PumpCommand::Off).await;
    assert!(matches!(outcome, SignalOutcome::Confirmed { .. }));

    pump.set_state(PumpCommand::On)
        .await
        .await
        .expect("join");

    let state = pump.snapshot().await;
    assert_eq!(state.confirmed, Some(PumpCommand::Off));
    assert!(!state.in_flight);
    let info = state.last_error.expect("last error");
    assert_eq!(info.error, FetchError::HttpStatus { code: 500 });
}
