use std::fs;

use shared::protocol::{ALTERNATE_SIGNAL_FIELD, DEFAULT_SIGNAL_FIELD};

pub const SETTINGS_FILE: &str = "leak_service.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub bind_addr: String,
    pub signal_fields: Vec<String>,
    pub leak_threshold: f64,
    pub max_body_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5000".into(),
            signal_fields: vec![DEFAULT_SIGNAL_FIELD.into(), ALTERNATE_SIGNAL_FIELD.into()],
            leak_threshold: 15.0,
            max_body_bytes: 16 * 1024,
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(SETTINGS_FILE) {
        apply_file(&mut settings, &raw);
    }
    apply_env(&mut settings, |var| std::env::var(var).ok());

    settings
}

fn apply_file(settings: &mut Settings, raw: &str) {
    let Ok(file_cfg) = toml::from_str::<toml::Table>(raw) else {
        return;
    };
    if let Some(v) = file_cfg.get("bind_addr").and_then(|v| v.as_str()) {
        settings.bind_addr = v.to_string();
    }
    if let Some(v) = file_cfg.get("signal_fields").and_then(|v| v.as_array()) {
        let fields: Vec<String> = v
            .iter()
            .filter_map(|field| field.as_str())
            .map(str::to_string)
            .collect();
        if !fields.is_empty() {
            settings.signal_fields = fields;
        }
    }
    if let Some(v) = file_cfg.get("leak_threshold") {
        if let Some(threshold) = v.as_float().or_else(|| v.as_integer().map(|i| i as f64)) {
            settings.leak_threshold = threshold;
        }
    }
    if let Some(v) = file_cfg.get("max_body_bytes").and_then(|v| v.as_integer()) {
        if let Ok(limit) = usize::try_from(v) {
            settings.max_body_bytes = limit;
        }
    }
}

fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("LEAK_SERVICE_BIND") {
        settings.bind_addr = v;
    }
    if let Some(v) = lookup("APP__BIND_ADDR") {
        settings.bind_addr = v;
    }

    if let Some(v) = lookup("APP__SIGNAL_FIELDS") {
        let fields: Vec<String> = v
            .split(',')
            .map(str::trim)
            .filter(|field| !field.is_empty())
            .map(str::to_string)
            .collect();
        if !fields.is_empty() {
            settings.signal_fields = fields;
        }
    }

    if let Some(v) = lookup("APP__LEAK_THRESHOLD") {
        if let Ok(parsed) = v.parse::<f64>() {
            settings.leak_threshold = parsed;
        }
    }

    if let Some(v) = lookup("APP__MAX_BODY_BYTES") {
        if let Ok(parsed) = v.parse::<usize>() {
            settings.max_body_bytes = parsed;
        }
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
