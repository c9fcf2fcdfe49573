//! Gateway failure type.

use serde_json::Value;
use thiserror::Error;

/// Result type for gateway calls.
pub type GatewayResult<T> = Result<T, Failure>;

/// A normalized transport or protocol failure.
///
/// `message` is already human-readable; it is exactly what the notification
/// sink was shown.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct Failure {
    pub message: String,
    /// HTTP status, when the service answered at all.
    pub status: Option<u16>,
}

impl Failure {
    /// A failure where no usable response was received.
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
        }
    }

    /// A failure derived from a non-success response and its body.
    pub fn from_response(status: u16, body: &str) -> Self {
        Self {
            message: describe_error(status, body),
            status: Some(status),
        }
    }
}

/// Derive a readable message from an error response body.
///
/// Prefers a structured `detail` field, then the JSON body itself, then raw
/// text, and finally a message built from the status code.
pub fn describe_error(status: u16, body: &str) -> String {
    let detail = match serde_json::from_str::<Value>(body) {
        Ok(data) => match data.get("detail") {
            Some(Value::String(detail)) if !detail.is_empty() => detail.clone(),
            Some(Value::String(_) | Value::Null) | None => data.to_string(),
            Some(other) => other.to_string(),
        },
        Err(_) => body.trim().to_string(),
    };

    if detail.is_empty() {
        format!("Request failed ({status})")
    } else {
        detail
    }
}
