use super::*;
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::test_support::spawn_server;

#[derive(Clone, Default)]
struct ActuatorState {
    received: Arc<Mutex<Vec<Value>>>,
}

async fn handle_signal(
    State(state): State<ActuatorState>,
    Json(body): Json<Value>,
) -> (StatusCode, String) {
    let message = format!("Signal {} sent", body);
    state.received.lock().await.push(body);
    (StatusCode::OK, message)
}

async fn spawn_actuator(path: &str) -> anyhow::Result<(url::Url, ActuatorState)> {
    let state = ActuatorState::default();
    let app = Router::new()
        .route(path, post(handle_signal))
        .with_state(state.clone());
    Ok((spawn_server(app).await?, state))
}

#[tokio::test]
async fn send_signal_posts_command_literal() {
    let (base, state) = spawn_actuator("/send_signal").await.expect("spawn");
    let client = SignalClient::new(
        Client::new(),
        base.join("send_signal").expect("url"),
        "signal",
    );

    client.send_signal(PumpCommand::On).await.expect("on");
    client.send_signal(PumpCommand::Off).await.expect("off");

    let received = state.received.lock().await.clone();
    assert_eq!(received, vec![json!({"signal": "1"}), json!({"signal": "0"})]);
}

#[tokio::test]
async fn send_signal_uses_configured_field_name() {
    let (base, state) = spawn_actuator("/control").await.expect("spawn");
    let client = SignalClient::new(Client::new(), base.join("control").expect("url"), "state");

    client.send_signal(PumpCommand::On).await.expect("on");

    let received = state.received.lock().await.clone();
    assert_eq!(received, vec![json!({"state": "1"})]);
}

#[tokio::test]
async fn send_signal_surfaces_http_status() {
    let app = Router::new().route(
        "/send_signal",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "actuator offline") }),
    );
    let base = spawn_server(app).await.expect("spawn");
    let client = SignalClient::new(
        Client::new(),
        base.join("send_signal").expect("url"),
        "signal",
    );

    let err = client
        .send_signal(PumpCommand::On)
        .await
        .expect_err("must fail");
    assert_eq!(err, FetchError::HttpStatus { code: 500 });
}
