//! Centralized API error handling
//!
//! Maps domain failures to HTTP status codes and terse plain-text bodies.
//! Bodies never say which part of a signature check failed; the detailed
//! cause only goes to the log.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::auth::AuthError;

/// API error type with HTTP status code mapping
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    InternalError(String),

    #[error("{0}")]
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get the error code string
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        match &self {
            ApiError::InternalError(_) | ApiError::ServiceUnavailable(_) => {
                tracing::error!(error = %self, code = %error_code, "Server error occurred");
            }
            _ => {
                tracing::debug!(error = %self, code = %error_code, "Client error occurred");
            }
        }

        (status, self.to_string()).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match &err {
            AuthError::InvalidAddress(_)
            | AuthError::MalformedSignature(_)
            | AuthError::AddressMismatch
            | AuthError::ChallengeConsumed
            | AuthError::NoOutstandingChallenge => {
                tracing::warn!(reason = %err, "Authentication rejected");
            }
            AuthError::StoreUnavailable(_) | AuthError::TokenError(_) => {
                tracing::error!(reason = %err, "Authentication failed");
            }
        }

        match err {
            AuthError::InvalidAddress(_) => {
                ApiError::Unauthorized("Invalid wallet address".to_string())
            }
            AuthError::MalformedSignature(_) => {
                ApiError::Unauthorized("Malformed signature".to_string())
            }
            AuthError::AddressMismatch | AuthError::ChallengeConsumed => {
                ApiError::Unauthorized("Invalid credentials".to_string())
            }
            AuthError::NoOutstandingChallenge => {
                ApiError::NotFound("No outstanding challenge".to_string())
            }
            AuthError::StoreUnavailable(_) => {
                ApiError::ServiceUnavailable("Service unavailable".to_string())
            }
            AuthError::TokenError(_) => ApiError::InternalError("Internal server error".to_string()),
        }
    }
}

/// Result type alias using ApiError
pub type ApiResult<T> = Result<T, ApiError>;
