// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::{cache::CacheError, payments::GatewayError, store::StoreError};

/// Why a token was rejected by the credential codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature is invalid")]
    Invalid,
    #[error("token has expired")]
    Expired,
}

/// Why a verified token may not touch the requested examination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthorizationError {
    #[error("examination is not covered by the admission credential")]
    ExaminationMismatch,
    #[error("examination has not started yet")]
    NotStarted,
}

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    // 403, cause hidden from the client
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    // 403, cause hidden from the client
    #[error("authorization failed: {0}")]
    Authorization(#[from] AuthorizationError),

    // 404
    #[error("{0} not found")]
    NotFound(String),

    // 409
    #[error("attempt is closed")]
    AttemptClosed,

    // 404
    #[error("order {0} not found")]
    OrderNotFound(String),

    // 202, client polls again
    #[error("payment pending for order {0}")]
    PaymentPending(String),

    // 400, terminal
    #[error("payment failed with status {0}")]
    PaymentFailed(String),

    // 400
    #[error("bad request: {0}")]
    BadRequest(String),

    // 503, store or cache could not be reached in time
    #[error("service unavailable: {0}")]
    Unavailable(String),

    // 500
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Auth(_) | AppError::Authorization(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) | AppError::OrderNotFound(_) => StatusCode::NOT_FOUND,
            AppError::AttemptClosed => StatusCode::CONFLICT,
            AppError::PaymentPending(_) => StatusCode::ACCEPTED,
            AppError::PaymentFailed(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Implements `IntoResponse` for `AppError`.
/// Authentication and authorization failures share one body so the client
/// cannot tell a bad signature from an expired token or a wrong examination.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_message = match &self {
            AppError::Auth(_) | AppError::Authorization(_) => {
                tracing::info!("Rejected request: {}", self);
                "Forbidden".to_string()
            }
            AppError::Unavailable(msg) => {
                tracing::error!("Backend unavailable: {}", msg);
                "Service temporarily unavailable, try again".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };
        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => AppError::Unavailable(msg),
            StoreError::Corrupt(msg) => AppError::Internal(msg),
        }
    }
}

impl From<CacheError> for AppError {
    fn from(err: CacheError) -> Self {
        AppError::Unavailable(err.to_string())
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        AppError::Unavailable(err.to_string())
    }
}

/// Cached payloads are written by this service; failing to decode one is a bug.
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}
