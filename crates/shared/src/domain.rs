use std::{fmt, str::FromStr};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::error::FetchError;

/// Three pressures captured for one evaluation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorReading {
    pub sensor1_pressure: f64,
    pub sensor2_pressure: f64,
    pub pump_pressure: f64,
}

impl SensorReading {
    /// Non-finite inputs are stored as zero readings.
    pub fn new(sensor1_pressure: f64, sensor2_pressure: f64, pump_pressure: f64) -> Self {
        Self {
            sensor1_pressure: finite_or_zero(sensor1_pressure),
            sensor2_pressure: finite_or_zero(sensor2_pressure),
            pump_pressure: finite_or_zero(pump_pressure),
        }
    }

    pub fn from_text(sensor1: &str, sensor2: &str, pump: &str) -> Self {
        Self {
            sensor1_pressure: parse_pressure(sensor1),
            sensor2_pressure: parse_pressure(sensor2),
            pump_pressure: parse_pressure(pump),
        }
    }

    pub fn differential(&self) -> f64 {
        self.sensor1_pressure - self.sensor2_pressure
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Parses user-entered pressure text.
///
/// Leading whitespace is skipped and the longest numeric prefix wins, so
/// `"12.5 bar"` reads as `12.5`. Text with no numeric prefix, and values that
/// are not finite, read as `0`. Malformed input is never an error.
pub fn parse_pressure(text: &str) -> f64 {
    let text = text.trim_start();
    let end = numeric_prefix_len(text.as_bytes());
    text[..end]
        .parse::<f64>()
        .ok()
        .map(finite_or_zero)
        .unwrap_or(0.0)
}

/// Length of the leading `[+-]digits[.digits][(e|E)[+-]digits]` run, or 0
/// when the mantissa has no digits. An exponent marker without digits after
/// it is not part of the number.
fn numeric_prefix_len(bytes: &[u8]) -> usize {
    let digits_end = |start: usize| {
        start + bytes[start..].iter().take_while(|b| b.is_ascii_digit()).count()
    };

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let int_end = digits_end(end);
    let mut mantissa_digits = int_end - end;
    end = int_end;
    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_end(end + 1);
        mantissa_digits += frac_end - (end + 1);
        end = frac_end;
    }
    if mantissa_digits == 0 {
        return 0;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_end = digits_end(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }
    end
}

/// Binary actuator instruction. On the wire it is the literal `"1"` or `"0"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PumpCommand {
    Off,
    On,
}

impl PumpCommand {
    pub fn as_wire(self) -> &'static str {
        match self {
            PumpCommand::Off => "0",
            PumpCommand::On => "1",
        }
    }

    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw {
            "0" => Some(PumpCommand::Off),
            "1" => Some(PumpCommand::On),
            _ => None,
        }
    }

    pub fn is_on(self) -> bool {
        self == PumpCommand::On
    }

    pub fn toggled(self) -> Self {
        match self {
            PumpCommand::Off => PumpCommand::On,
            PumpCommand::On => PumpCommand::Off,
        }
    }
}

impl fmt::Display for PumpCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PumpCommand::Off => f.write_str("off"),
            PumpCommand::On => f.write_str("on"),
        }
    }
}

#[derive(Debug, Error)]
#[error("invalid pump command '{0}': expected on/off or 1/0")]
pub struct ParsePumpCommandError(pub String);

impl FromStr for PumpCommand {
    type Err = ParsePumpCommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on" | "1" | "true" => Ok(PumpCommand::On),
            "off" | "0" | "false" => Ok(PumpCommand::Off),
            _ => Err(ParsePumpCommandError(s.to_string())),
        }
    }
}

impl Serialize for PumpCommand {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_wire())
    }
}

impl<'de> Deserialize<'de> for PumpCommand {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        PumpCommand::from_wire(&raw)
            .ok_or_else(|| de::Error::invalid_value(de::Unexpected::Str(&raw), &"\"0\" or \"1\""))
    }
}

/// Leakage estimate as reported by the prediction service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LeakageValue {
    Number(f64),
    Text(String),
}

impl fmt::Display for LeakageValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeakageValue::Number(value) => write!(f, "{value}"),
            LeakageValue::Text(text) => f.write_str(text),
        }
    }
}

/// Outcome of one evaluation. Always displayable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum LeakageResult {
    Value {
        value: LeakageValue,
    },
    UnexpectedFormat,
    #[serde(rename = "fetch-error")]
    FetchFailed {
        error: FetchError,
    },
}

impl LeakageResult {
    pub fn value(&self) -> Option<&LeakageValue> {
        match self {
            LeakageResult::Value { value } => Some(value),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        !matches!(self, LeakageResult::Value { .. })
    }

    pub fn display_text(&self) -> String {
        match self {
            LeakageResult::Value { value } => value.to_string(),
            LeakageResult::UnexpectedFormat => "Error: Unexpected response format".to_string(),
            LeakageResult::FetchFailed { .. } => "Error fetching data".to_string(),
        }
    }
}

impl From<LeakageValue> for LeakageResult {
    fn from(value: LeakageValue) -> Self {
        LeakageResult::Value { value }
    }
}
