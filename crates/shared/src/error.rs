use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    Transport,
    HttpStatus,
    Format,
}

/// Failure of a single request to a remote collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FetchError {
    /// Network unreachable, DNS failure or timeout.
    #[error("transport error: {message}")]
    Transport { message: String },
    #[error("HTTP error! Status: {code}")]
    HttpStatus { code: u16 },
    /// 2xx response whose body did not have the expected shape.
    #[error("unexpected response format: {message}")]
    Format { message: String },
}

impl FetchError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::Transport { .. } => FetchErrorKind::Transport,
            FetchError::HttpStatus { .. } => FetchErrorKind::HttpStatus,
            FetchError::Format { .. } => FetchErrorKind::Format,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            FetchError::HttpStatus { code } => Some(*code),
            _ => None,
        }
    }
}

/// Error body returned by the leak service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
