//! Error types for the execution backend client.

use serde_json::Value as JsonValue;
use thiserror::Error;

/// Errors that can occur when calling the execution backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend answered with a structured `error` object.
    #[error("backend rejected the request (status {status})")]
    Rejected { status: u16, error: JsonValue },

    /// The backend answered with a non-success status and no structured error.
    #[error("backend returned status {status}")]
    Status { status: u16 },

    /// The response body did not match the expected envelope.
    #[error("malformed backend response: {message}")]
    InvalidResponse { message: String },

    /// The live output stream broke after it was opened.
    #[error("backend stream interrupted: {message}")]
    Stream { message: String },

    /// HTTP/network error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Client configuration error (bad base URL, header values).
    #[error("configuration error: {0}")]
    Config(String),
}

impl BackendError {
    /// Create a rejection carrying the backend's error object.
    pub fn rejected(status: u16, error: JsonValue) -> Self {
        Self::Rejected { status, error }
    }

    /// Create an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Create a mid-stream error.
    pub fn stream(message: impl Into<String>) -> Self {
        Self::Stream {
            message: message.into(),
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether the backend explicitly refused the submission (as opposed to being unreachable).
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    /// Get a short error code for logging.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Rejected { .. } => "backend_rejected",
            Self::Status { .. } => "backend_status",
            Self::InvalidResponse { .. } => "invalid_response",
            Self::Stream { .. } => "stream_interrupted",
            Self::Http(e) if e.is_timeout() => "timeout",
            Self::Http(e) if e.is_connect() => "connect_error",
            Self::Http(_) => "http_error",
            Self::Config(_) => "config_error",
        }
    }
}
