//! Error types for the Azure Resource Manager transport.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::retry::Retryable;

/// Result type alias for Resource Manager operations.
pub type ArmResult<T> = Result<T, ArmError>;

/// Errors returned by the Resource Manager client.
#[derive(Error, Debug)]
pub enum ArmError {
    /// The addressed resource does not exist (HTTP 404).
    #[error("Resource not found: {path}")]
    NotFound { path: String },

    /// The service rejected the request.
    #[error("Azure API error {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
        /// Delay requested by the service through `Retry-After`.
        retry_after: Option<Duration>,
    },

    /// The request never produced a response (connection reset, timeout).
    #[error("Transient transport failure: {0}")]
    Transient(String),

    /// A long-running operation did not finish before the poll deadline.
    #[error("Operation on '{path}' did not complete within {timeout_secs} seconds")]
    Timeout { path: String, timeout_secs: u64 },

    /// A long-running operation finished in a non-success terminal state.
    #[error("Operation {status}: {code}: {message}")]
    OperationFailed {
        status: String,
        code: String,
        message: String,
    },

    /// No bearer token could be obtained.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// HTTP client error that is not transient.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Response body was not valid JSON.
    #[error("Failed to parse response JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Response was well-formed but did not match the expected ARM shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// ARM error envelope: `{"error": {"code": "...", "message": "..."}}`.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorDetail {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl ArmError {
    /// Build an error from a non-success HTTP response.
    pub fn from_response(
        status: u16,
        path: &str,
        body: &str,
        retry_after: Option<Duration>,
    ) -> Self {
        if status == 404 {
            return ArmError::NotFound {
                path: path.to_string(),
            };
        }

        let (code, message) = match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => (envelope.error.code, envelope.error.message),
            Err(_) => (String::from("Unknown"), truncate(body, 200)),
        };

        ArmError::Api {
            status,
            code,
            message,
            retry_after,
        }
    }

    /// Returns true for a genuine "does not exist" answer.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ArmError::NotFound { .. })
    }

    /// Returns true if the same request may succeed when retried.
    pub fn is_transient(&self) -> bool {
        match self {
            ArmError::Transient(_) => true,
            ArmError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl Retryable for ArmError {
    fn is_retryable(&self) -> bool {
        self.is_transient()
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            ArmError::Api { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ArmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            ArmError::Transient(err.to_string())
        } else {
            ArmError::Http(err.to_string())
        }
    }
}

fn truncate(body: &str, max: usize) -> String {
    if body.len() <= max {
        return body.to_string();
    }
    let mut end = max;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
}
