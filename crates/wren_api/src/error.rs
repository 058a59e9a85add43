use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Failure of a request/response call against the backend.
#[derive(Debug, Error)]
pub enum WrenApiError {
    #[error("user id is required")]
    MissingUserId,

    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status} {message}")]
    Status { status: StatusCode, message: String },

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// The backend answered 2xx but reported `status: "error"` in the body.
    #[error("{0}")]
    Rejected(String),
}

/// Failure to establish or keep a stream's transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("HTTP {status}: {message}")]
    Status {
        status: u16,
        message: String,
        retryable: bool,
    },

    #[error("stream body failed: {0}")]
    Body(String),

    #[error("stream ended by server")]
    EndOfStream,

    #[error("invalid stream target: {0}")]
    InvalidTarget(String),
}

impl TransportError {
    /// Whether a long-lived stream may try again after this failure.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connect(_) | Self::Body(_) | Self::EndOfStream => true,
            Self::Status { retryable, .. } => *retryable,
            Self::InvalidTarget(_) => false,
        }
    }
}

/// A single stream payload that could not be turned into an event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("malformed event payload: {message}")]
    Malformed { message: String, payload: String },

    #[error("unknown event status '{status}'")]
    UnknownStatus { status: String },
}

impl DecodeError {
    pub fn malformed(error: &serde_json::Error, payload: &str) -> Self {
        Self::Malformed {
            message: error.to_string(),
            payload: payload.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    message: Option<String>,
}

/// Extract a human-readable message from a backend error body.
///
/// The backend answers with `{"error": "..."}`, `{"status": "error", "message": "..."}`,
/// or occasionally a nested `{"error": {"message": "..."}}`.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    let fallback = || {
        if body.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        } else {
            body.trim().to_string()
        }
    };

    let Ok(parsed) = serde_json::from_str::<ErrorPayload>(body) else {
        return fallback();
    };

    let from_error = match parsed.error {
        Some(Value::String(message)) => non_empty(message),
        Some(Value::Object(fields)) => fields
            .get("message")
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .and_then(non_empty),
        _ => None,
    };

    from_error
        .or_else(|| parsed.message.and_then(non_empty))
        .unwrap_or_else(fallback)
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
