use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// `{"error": {"code", "message"}}` as the backend returns it.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorObject,
}

#[derive(Debug, Deserialize)]
pub struct ErrorObject {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct FlatErrorBody {
    error: String,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(String),
    #[error("session invalid: {0}")]
    Unauthorized(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("rejected: {0}")]
    Validation(String),
    #[error("unexpected status {status} ({code}): {message}")]
    Status {
        status: u16,
        code: String,
        message: String,
    },
    #[error("could not decode response: {0}")]
    Decode(String),
    #[error("request cancelled")]
    Cancelled,
}

impl ClientError {
    /// Map a non-2xx response to the error taxonomy.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let (code, message) = extract_server_message(body);
        match status {
            StatusCode::UNAUTHORIZED => ClientError::Unauthorized(message),
            StatusCode::FORBIDDEN => ClientError::Forbidden(message),
            StatusCode::NOT_FOUND => ClientError::NotFound(message),
            StatusCode::CONFLICT => ClientError::Conflict(message),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                ClientError::Validation(message)
            }
            other => ClientError::Status {
                status: other.as_u16(),
                code,
                message,
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound(_))
    }

    /// The server-reported text, when there is one worth showing.
    pub fn server_message(&self) -> Option<&str> {
        let msg = match self {
            ClientError::Unauthorized(m)
            | ClientError::Forbidden(m)
            | ClientError::NotFound(m)
            | ClientError::Conflict(m)
            | ClientError::Validation(m) => m.as_str(),
            ClientError::Status { message, .. } => message.as_str(),
            ClientError::Network(_) | ClientError::Decode(_) | ClientError::Cancelled => return None,
        };
        let msg = msg.trim();
        (!msg.is_empty()).then_some(msg)
    }

    /// Human-readable text for the store's error slot, e.g. `action = "approve appointment"`.
    pub fn user_message(&self, action: &str) -> String {
        match self.server_message() {
            Some(m) => m.to_string(),
            None => format!("Failed to {action}. Please try again."),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ClientError::Decode(e.to_string())
        } else {
            ClientError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::Decode(e.to_string())
    }
}

fn extract_server_message(body: &str) -> (String, String) {
    if let Ok(r) = serde_json::from_str::<ErrorResponse>(body) {
        return (r.error.code, r.error.message);
    }
    if let Ok(r) = serde_json::from_str::<MessageBody>(body) {
        return (String::new(), r.message);
    }
    if let Ok(r) = serde_json::from_str::<FlatErrorBody>(body) {
        return (String::new(), r.error);
    }
    (String::new(), body.trim().to_string())
}

/// A form field that failed client-side validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Date,
    Time,
    Reason,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub field: Field,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: Field, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}
