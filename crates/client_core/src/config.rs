use std::{fs, path::Path, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};
use shared::protocol::{DEFAULT_SIGNAL_FIELD, PREDICT_PATH, SEND_SIGNAL_PATH};
use thiserror::Error;
use tracing::warn;
use url::Url;

pub const SETTINGS_FILE: &str = "aquaalert.toml";
pub const DEFAULT_SERVICE_URL: &str = "https://leak-detection.onrender.com";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Whether the displayed pump state follows the in-flight request or waits
/// for the actuator's acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdatePolicy {
    #[default]
    ConfirmationGated,
    Optimistic,
}

#[derive(Debug, Error)]
#[error("unknown update policy '{0}': expected confirmation_gated or optimistic")]
pub struct ParseUpdatePolicyError(String);

impl FromStr for UpdatePolicy {
    type Err = ParseUpdatePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "confirmation_gated" | "gated" | "confirmed" => Ok(UpdatePolicy::ConfirmationGated),
            "optimistic" => Ok(UpdatePolicy::Optimistic),
            _ => Err(ParseUpdatePolicyError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid service url '{url}': {source}")]
    InvalidServiceUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("invalid endpoint path '{path}': {source}")]
    InvalidEndpoint {
        path: String,
        #[source]
        source: url::ParseError,
    },
    #[error("service url '{0}' cannot carry endpoint paths")]
    CannotBeBase(String),
    #[error("signal field name must not be empty")]
    EmptySignalField,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    pub service_url: String,
    pub predict_path: String,
    pub signal_path: String,
    pub signal_field: String,
    pub request_timeout: Duration,
    pub update_policy: UpdatePolicy,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            service_url: DEFAULT_SERVICE_URL.into(),
            predict_path: PREDICT_PATH.into(),
            signal_path: SEND_SIGNAL_PATH.into(),
            signal_field: DEFAULT_SIGNAL_FIELD.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            update_policy: UpdatePolicy::default(),
        }
    }
}

/// Environment variables and the settings key each one overrides. Later
/// entries win.
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("LEAK_SERVICE_URL", "service_url"),
    ("APP__SERVICE_URL", "service_url"),
    ("APP__PREDICT_PATH", "predict_path"),
    ("APP__SIGNAL_PATH", "signal_path"),
    ("APP__SIGNAL_FIELD", "signal_field"),
    ("APP__REQUEST_TIMEOUT_SECS", "request_timeout_secs"),
    ("APP__UPDATE_POLICY", "update_policy"),
];

impl ClientSettings {
    pub fn predict_url(&self) -> Result<Url, SettingsError> {
        self.endpoint(&self.predict_path)
    }

    pub fn signal_url(&self) -> Result<Url, SettingsError> {
        self.endpoint(&self.signal_path)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.signal_field.trim().is_empty() {
            return Err(SettingsError::EmptySignalField);
        }
        self.predict_url()?;
        self.signal_url()?;
        Ok(())
    }

    /// Endpoint paths are appended to whatever path the service url already
    /// carries, so `https://host/api` + `/predict` is `https://host/api/predict`.
    fn endpoint(&self, path: &str) -> Result<Url, SettingsError> {
        let mut base =
            Url::parse(self.service_url.trim()).map_err(|source| {
                SettingsError::InvalidServiceUrl {
                    url: self.service_url.clone(),
                    source,
                }
            })?;
        if base.cannot_be_a_base() {
            return Err(SettingsError::CannotBeBase(self.service_url.clone()));
        }
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        base.join(path.trim().trim_start_matches('/'))
            .map_err(|source| SettingsError::InvalidEndpoint {
                path: path.to_string(),
                source,
            })
    }

    /// Applies a single `key = value` setting. Unknown keys and unparsable
    /// values are logged and ignored.
    pub fn apply(&mut self, key: &str, value: &str) {
        match key {
            "service_url" => self.service_url = value.to_string(),
            "predict_path" => self.predict_path = value.to_string(),
            "signal_path" => self.signal_path = value.to_string(),
            "signal_field" => self.signal_field = value.to_string(),
            "request_timeout_secs" => match value.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => self.request_timeout = Duration::from_secs(secs),
                _ => warn!(%value, "config: ignoring invalid request_timeout_secs"),
            },
            "update_policy" => match value.parse::<UpdatePolicy>() {
                Ok(policy) => self.update_policy = policy,
                Err(error) => warn!(%error, "config: ignoring update_policy"),
            },
            _ => warn!(%key, "config: ignoring unknown setting"),
        }
    }

    pub fn apply_toml(&mut self, raw: &str) {
        let table = match toml::from_str::<toml::Table>(raw) {
            Ok(table) => table,
            Err(error) => {
                warn!(%error, "config: failed to parse settings file");
                return;
            }
        };
        for (key, value) in &table {
            let value = match value {
                toml::Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            self.apply(key, &value);
        }
    }

    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for (var, key) in ENV_OVERRIDES {
            if let Some(value) = lookup(var) {
                self.apply(key, &value);
            }
        }
    }
}

/// Defaults, then `aquaalert.toml` in the working directory if present, then
/// environment overrides.
pub fn load_settings() -> ClientSettings {
    load_settings_from(Path::new(SETTINGS_FILE))
}

pub fn load_settings_from(path: &Path) -> ClientSettings {
    let mut settings = ClientSettings::default();
    if let Ok(raw) = fs::read_to_string(path) {
        settings.apply_toml(&raw);
    }
    settings.apply_env_with(|var| std::env::var(var).ok());
    settings
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
