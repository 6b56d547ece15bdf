//! Error types for the FileVault server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Transfer-wide result type
pub type Result<T> = std::result::Result<T, TransferError>;

/// Rejection message used by the admission controller
pub const TOO_MANY_REQUESTS: &str = "too many concurrent requests";

/// Error type shared by storage, transfer and admission layers
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(&'static str),
}

/// Coarse error classification, independent of the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Io,
    ResourceExhausted,
}

impl TransferError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Io(_) => ErrorKind::Io,
            Self::ResourceExhausted(_) => ErrorKind::ResourceExhausted,
        }
    }

    /// HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Io => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for TransferError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (error_type, message) = match &self {
            TransferError::Validation(msg) => ("bad_request", msg.clone()),
            TransferError::NotFound(msg) => ("not_found", msg.clone()),
            TransferError::Io(e) => {
                tracing::error!("IO error: {}", e);
                ("io_error", "An internal error occurred".to_string())
            }
            TransferError::ResourceExhausted(msg) => ("resource_exhausted", msg.to_string()),
        };

        let body = Json(ErrorResponse {
            error: error_type,
            message,
            details: if cfg!(debug_assertions) && matches!(self, TransferError::Io(_)) {
                Some(self.to_string())
            } else {
                None
            },
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            TransferError::validation("empty filename").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            TransferError::not_found("abc").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            TransferError::from(std::io::Error::other("disk full")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            TransferError::ResourceExhausted(TOO_MANY_REQUESTS).status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn test_io_error_kind() {
        let err: TransferError = std::io::Error::from(std::io::ErrorKind::PermissionDenied).into();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
