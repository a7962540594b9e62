use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::error::FetchError;

/// Maps a `reqwest` failure onto the fetch error taxonomy.
pub(crate) fn classify_reqwest_error(err: reqwest::Error) -> FetchError {
    if let Some(status) = err.status() {
        return FetchError::HttpStatus {
            code: status.as_u16(),
        };
    }
    if err.is_timeout() {
        return FetchError::transport(format!("request timed out: {err}"));
    }
    if err.is_decode() {
        return FetchError::format(err.to_string());
    }
    FetchError::transport(err.to_string())
}

/// Diagnostic retained by a controller after a failed request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorInfo {
    pub seq: u64,
    pub error: FetchError,
    pub occurred_at: DateTime<Utc>,
}

impl ErrorInfo {
    pub fn new(seq: u64, error: FetchError) -> Self {
        Self {
            seq,
            error,
            occurred_at: Utc::now(),
        }
    }
}
