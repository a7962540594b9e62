use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use shared::{
    domain::{PumpCommand, SensorReading},
    error::ApiError,
    protocol::{command_from_signal_body, SignalAck, CONTROL_PATH, PREDICT_PATH, SEND_SIGNAL_PATH},
};
use tokio::sync::RwLock;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::info;

use crate::model::LeakModel;

const SENSOR1_FIELD: &str = "Sensor1_Pressure";
const SENSOR2_FIELD: &str = "Sensor2_Pressure";
const PUMP_FIELD: &str = "Pump_Pressure";

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

pub struct AppState {
    model: Arc<dyn LeakModel>,
    signal_fields: Vec<String>,
    actuator: RwLock<Option<PumpCommand>>,
}

impl AppState {
    pub fn new(model: Arc<dyn LeakModel>, signal_fields: Vec<String>) -> Self {
        Self {
            model,
            signal_fields,
            actuator: RwLock::new(None),
        }
    }
}

#[derive(Debug, Serialize)]
struct ActuatorStatus {
    signal: Option<PumpCommand>,
}

pub fn build_router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(PREDICT_PATH, post(predict))
        .route(SEND_SIGNAL_PATH, post(send_signal))
        .route(CONTROL_PATH, post(send_signal))
        .route("/actuator", get(actuator))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(state)
}

fn api_error(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ApiError>) {
    (status, Json(ApiError::new(message)))
}

fn json_body(payload: Result<Json<Value>, JsonRejection>) -> Result<Value, (StatusCode, Json<ApiError>)> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(JsonRejection::MissingJsonContentType(_)) => Err(api_error(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Request must be in JSON format",
        )),
        Err(rejection) => Err(api_error(rejection.status(), rejection.body_text())),
    }
}

/// Missing fields read as zero; numeric strings are accepted.
fn pressure(body: &Map<String, Value>, field: &str) -> Result<f64, (StatusCode, Json<ApiError>)> {
    let invalid = || {
        api_error(
            StatusCode::BAD_REQUEST,
            format!("{field} must be a number"),
        )
    };
    match body.get(field) {
        None | Some(Value::Null) => Ok(0.0),
        Some(Value::Number(number)) => number.as_f64().ok_or_else(invalid),
        Some(Value::String(raw)) => raw.trim().parse::<f64>().map_err(|_| invalid()),
        Some(_) => Err(invalid()),
    }
}

async fn healthz() -> &'static str {
    "ok"
}

async fn predict(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    let body = json_body(payload)?;
    let Some(fields) = body.as_object().filter(|fields| !fields.is_empty()) else {
        return Err(api_error(StatusCode::BAD_REQUEST, "Empty JSON request"));
    };

    let reading = SensorReading::new(
        pressure(fields, SENSOR1_FIELD)?,
        pressure(fields, SENSOR2_FIELD)?,
        pressure(fields, PUMP_FIELD)?,
    );
    let leakage = state.model.predict(&reading);
    info!(
        sensor1 = reading.sensor1_pressure,
        sensor2 = reading.sensor2_pressure,
        pump = reading.pump_pressure,
        leakage,
        "predict: evaluated reading"
    );

    Ok(Json(json!({ "Leakage": leakage })))
}

async fn send_signal(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<SignalAck> {
    let body = json_body(payload)?;
    let command = command_from_signal_body(&body, &state.signal_fields).ok_or_else(|| {
        api_error(StatusCode::BAD_REQUEST, "Invalid signal. Use 0 or 1")
    })?;

    *state.actuator.write().await = Some(command);
    info!(signal = command.as_wire(), "actuator: signal sent");

    Ok(Json(SignalAck::for_command(command)))
}

async fn actuator(State(state): State<Arc<AppState>>) -> Json<ActuatorStatus> {
    Json(ActuatorStatus {
        signal: *state.actuator.read().await,
    })
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
