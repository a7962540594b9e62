use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{LeakageValue, PumpCommand, SensorReading};

pub const PREDICT_PATH: &str = "/predict";
pub const SEND_SIGNAL_PATH: &str = "/send_signal";
pub const CONTROL_PATH: &str = "/control";
pub const DEFAULT_SIGNAL_FIELD: &str = "signal";
pub const ALTERNATE_SIGNAL_FIELD: &str = "state";
pub const LEAKAGE_FIELD: &str = "Leakage";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictRequest {
    #[serde(rename = "Sensor1_Pressure")]
    pub sensor1_pressure: f64,
    #[serde(rename = "Sensor2_Pressure")]
    pub sensor2_pressure: f64,
    #[serde(rename = "Pump_Pressure")]
    pub pump_pressure: f64,
}

impl From<SensorReading> for PredictRequest {
    fn from(reading: SensorReading) -> Self {
        Self {
            sensor1_pressure: reading.sensor1_pressure,
            sensor2_pressure: reading.sensor2_pressure,
            pump_pressure: reading.pump_pressure,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    #[serde(rename = "Leakage")]
    pub leakage: LeakageValue,
}

/// Pulls the leakage estimate out of a prediction response body.
///
/// Returns `None` when the body is not JSON, has no `Leakage` field, or the
/// field is neither a number nor a string.
pub fn parse_predict_response(body: &str) -> Option<LeakageValue> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get(LEAKAGE_FIELD)? {
        Value::Number(number) => number.as_f64().map(LeakageValue::Number),
        Value::String(text) => Some(LeakageValue::Text(text.clone())),
        _ => None,
    }
}

/// One-field envelope carrying the command literal under `field`.
pub fn signal_body(field: &str, command: PumpCommand) -> Value {
    let mut body = Map::new();
    body.insert(
        field.to_string(),
        Value::String(command.as_wire().to_string()),
    );
    Value::Object(body)
}

/// Accepts `"0"`/`"1"` as well as bare `0`/`1`.
pub fn command_from_value(value: &Value) -> Option<PumpCommand> {
    match value {
        Value::String(raw) => PumpCommand::from_wire(raw.trim()),
        Value::Number(number) => match number.as_u64()? {
            0 => Some(PumpCommand::Off),
            1 => Some(PumpCommand::On),
            _ => None,
        },
        _ => None,
    }
}

/// Finds the command under the first of `fields` present in `body`.
pub fn command_from_signal_body<S: AsRef<str>>(body: &Value, fields: &[S]) -> Option<PumpCommand> {
    let field = fields
        .iter()
        .find_map(|field| body.get(field.as_ref()))?;
    command_from_value(field)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalAck {
    pub message: String,
}

impl SignalAck {
    pub fn for_command(command: PumpCommand) -> Self {
        Self {
            message: format!("Signal {} sent", command.as_wire()),
        }
    }
}
