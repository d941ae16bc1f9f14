// Error classification for API calls and the uniform `{data?, error?}`
// response shape handed to front ends.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// No response was received (unreachable host, refused connection, DNS
    /// failure, connection dropped mid-body).
    #[error("Network error - please check your connection and ensure the server is running")]
    Network { detail: String },

    /// The body was not JSON, or the server refused without a message.
    #[error("Server error: {status} {status_text}")]
    Status { status: u16, status_text: String },

    /// Non-2xx response carrying a server-provided message.
    #[error("{message}")]
    Server { status: u16, message: String },

    /// 2xx JSON that does not have the expected shape.
    #[error("Unexpected response from server: {detail}")]
    UnexpectedResponse { detail: String },

    /// An auth-required call was attempted without a session token. No
    /// request is sent.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The request could not be built (unreadable image file, bad header).
    #[error("{0}")]
    InvalidRequest(String),
}

/// User-facing error category, used to pick the alert style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Server,
    Precondition,
}

impl ApiError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ApiError::Network { .. } => ErrorCategory::Network,
            ApiError::Status { .. }
            | ApiError::Server { .. }
            | ApiError::UnexpectedResponse { .. } => ErrorCategory::Server,
            ApiError::NotAuthenticated | ApiError::InvalidRequest(_) => {
                ErrorCategory::Precondition
            }
        }
    }

    /// HTTP status of the response that produced this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } | ApiError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

/// The `{data?, error?}` shape: exactly one of the two is set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

impl<T> From<Result<T, ApiError>> for ApiResponse<T> {
    fn from(result: Result<T, ApiError>) -> Self {
        match result {
            Ok(data) => ApiResponse {
                data: Some(data),
                error: None,
            },
            Err(e) => ApiResponse {
                data: None,
                error: Some(e.to_string()),
            },
        }
    }
}
