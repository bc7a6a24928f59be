use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Access denied: {body}")]
    AccessDenied { body: String, message: ServerMessage },

    #[error("Unauthorized - credentials rejected")]
    Unauthorized,

    #[error("Resource not found: {body}")]
    NotFound { body: String, message: ServerMessage },

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error {status}: {body}")]
    ServerError {
        status: u16,
        body: String,
        message: ServerMessage,
    },

    #[error("Request rejected with status {status}: {body}")]
    Rejected {
        status: u16,
        body: String,
        message: ServerMessage,
    },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Error envelope used by the backend for 4xx responses
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
    error: Option<serde_json::Value>,
}

/// Human-readable messages pulled from a JSON error body.
/// Read from the full body, so they survive truncation of the display text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerMessage {
    pub detail: Option<String>,
    pub error: Option<String>,
}

impl ServerMessage {
    fn parse(body: &str) -> Self {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(envelope) => Self {
                detail: envelope.detail.as_ref().and_then(message_text),
                error: envelope.error.as_ref().and_then(message_text),
            },
            Err(_) => Self::default(),
        }
    }
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let cut = (0..=MAX_ERROR_BODY_LENGTH)
                .rev()
                .find(|i| body.is_char_boundary(*i))
                .unwrap_or(0);
            format!("{}... (truncated, {} total bytes)", &body[..cut], body.len())
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = ServerMessage::parse(body);
        let body = Self::truncate_body(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied { body, message },
            404 => ApiError::NotFound { body, message },
            429 => ApiError::RateLimited,
            code @ 500..=599 => ApiError::ServerError {
                status: code,
                body,
                message,
            },
            code => ApiError::Rejected {
                status: code,
                body,
                message,
            },
        }
    }

    /// HTTP status carried by this error, if the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized => Some(401),
            ApiError::AccessDenied { .. } => Some(403),
            ApiError::NotFound { .. } => Some(404),
            ApiError::RateLimited => Some(429),
            ApiError::ServerError { status, .. } | ApiError::Rejected { status, .. } => Some(*status),
            ApiError::NetworkError(e) => e.status().map(|s| s.as_u16()),
            ApiError::InvalidResponse(_) => None,
        }
    }

    fn message(&self) -> Option<&ServerMessage> {
        match self {
            ApiError::AccessDenied { message, .. }
            | ApiError::NotFound { message, .. }
            | ApiError::ServerError { message, .. }
            | ApiError::Rejected { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Server-provided `detail` message, if the error body carried one
    pub fn detail(&self) -> Option<String> {
        self.message().and_then(|m| m.detail.clone())
    }

    /// Server-provided `error` message, if the error body carried one
    pub fn error_message(&self) -> Option<String> {
        self.message().and_then(|m| m.error.clone())
    }
}

fn message_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) if s.is_empty() => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
