//! Error handling for the Restaurant Operations Platform
//!
//! State-machine and ledger-invariant violations surface to the caller
//! with a clear reason; silent clamps (floor-at-zero, cap-at-issued,
//! cap-at-returnable) are not errors — the clamped value is echoed back
//! in the response instead.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    // Order state machine
    #[error("Invalid status transition: {0}")]
    InvalidTransition(String),

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    // Shift issuance ledger
    #[error("Usage exceeds issued quantity: {0}")]
    UsageExceedsIssued(String),

    #[error("Return exceeds returnable quantity: {0}")]
    ExceedsReturnable(String),

    #[error("Ledger record already returned: {0}")]
    LedgerClosed(String),

    // Warehouse
    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl From<shared::LedgerError> for AppError {
    fn from(err: shared::LedgerError) -> Self {
        match err {
            shared::LedgerError::UsageExceedsIssued { item } => {
                AppError::UsageExceedsIssued(item)
            }
            shared::LedgerError::RecordClosed => {
                AppError::LedgerClosed("record is fully returned".to_string())
            }
            shared::LedgerError::LineNotFound => {
                AppError::NotFound("Ledger line".to_string())
            }
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match &self {
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail {
                    code: "NOT_FOUND".to_string(),
                    message: format!("{} not found", resource),
                    field: None,
                },
            ),
            AppError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "VALIDATION_ERROR".to_string(),
                    message: message.clone(),
                    field: Some(field.clone()),
                },
            ),
            AppError::InvalidTransition(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "INVALID_TRANSITION".to_string(),
                    message: msg.clone(),
                    field: None,
                },
            ),
            AppError::NotAuthorized(msg) => (
                StatusCode::FORBIDDEN,
                ErrorDetail {
                    code: "NOT_AUTHORIZED".to_string(),
                    message: msg.clone(),
                    field: None,
                },
            ),
            AppError::UsageExceedsIssued(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "USAGE_EXCEEDS_ISSUED".to_string(),
                    message: msg.clone(),
                    field: None,
                },
            ),
            AppError::ExceedsReturnable(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "EXCEEDS_RETURNABLE".to_string(),
                    message: msg.clone(),
                    field: None,
                },
            ),
            AppError::LedgerClosed(msg) => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    code: "LEDGER_CLOSED".to_string(),
                    message: msg.clone(),
                    field: None,
                },
            ),
            AppError::InsufficientStock(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "INSUFFICIENT_STOCK".to_string(),
                    message: msg.clone(),
                    field: None,
                },
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "DATABASE_ERROR".to_string(),
                    message: "A database error occurred".to_string(),
                    field: None,
                },
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "INTERNAL_ERROR".to_string(),
                    message: msg.clone(),
                    field: None,
                },
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "INTERNAL_ERROR".to_string(),
                    message: "An internal server error occurred".to_string(),
                    field: None,
                },
            ),
        };

        tracing::error!("Error: {:?}", self);

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
