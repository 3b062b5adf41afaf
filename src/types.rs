//! Shared error and result types

use hyper::StatusCode;
use thiserror::Error;

/// Errors surfaced by Wriders services and routes
#[derive(Debug, Error)]
pub enum WridersError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Auth error: {0}")]
    Auth(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WridersError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            WridersError::Validation(_) => StatusCode::BAD_REQUEST,
            WridersError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            WridersError::Forbidden(_) => StatusCode::FORBIDDEN,
            WridersError::NotFound(_) => StatusCode::NOT_FOUND,
            WridersError::Conflict(_) => StatusCode::CONFLICT,
            WridersError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            WridersError::Database(_)
            | WridersError::Auth(_)
            | WridersError::Internal(_)
            | WridersError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code for the JSON envelope
    pub fn code(&self) -> &'static str {
        match self {
            WridersError::Validation(_) => "VALIDATION_ERROR",
            WridersError::Unauthenticated(_) => "UNAUTHENTICATED",
            WridersError::Forbidden(_) => "FORBIDDEN",
            WridersError::NotFound(_) => "NOT_FOUND",
            WridersError::Conflict(_) => "CONFLICT",
            WridersError::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            _ => "INTERNAL_ERROR",
        }
    }

    /// Message safe to show to clients. Internal failures are not leaked.
    pub fn public_message(&self) -> String {
        if self.status().is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        }
    }

    pub fn not_found(what: &str) -> Self {
        WridersError::NotFound(format!("{what} not found"))
    }
}

pub type Result<T> = std::result::Result<T, WridersError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            WridersError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            WridersError::Conflict("x".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            WridersError::Database("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_detail_not_public() {
        let err = WridersError::Database("connection refused at 10.0.0.3".into());
        assert_eq!(err.public_message(), "Internal server error");
        assert_eq!(err.code(), "INTERNAL_ERROR");

        let err = WridersError::not_found("Book");
        assert_eq!(err.public_message(), "Book not found");
    }
}
