use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::payments::ProviderError;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Slot is already reserved")]
    SlotAlreadyReserved,

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Payment error: {0}")]
    Payment(String),

    #[error("Payment provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Email delivery failed: {0}")]
    Email(String),
}

impl AppError {
    /// Errors that mean "try again later" rather than "this is final".
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::ProviderUnavailable(_) | AppError::Database(_) | AppError::Email(_)
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let retryable = self.is_retryable();
        let (status, error_message) = match self {
            AppError::Database(ref msg) => {
                tracing::error!("Database error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error occurred".to_string())
            }
            AppError::NotFound(ref msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(ref msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(ref msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::SlotAlreadyReserved => (StatusCode::CONFLICT, self.to_string()),
            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            AppError::Payment(ref msg) => (StatusCode::PAYMENT_REQUIRED, msg.clone()),
            AppError::ProviderUnavailable(ref msg) => {
                tracing::warn!("Payment provider unavailable: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, "Payment provider unavailable, please try again".to_string())
            }
            AppError::Validation(ref msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            AppError::Email(ref msg) => {
                tracing::error!("Email error: {}", msg);
                (StatusCode::BAD_GATEWAY, "Email delivery failed".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
            "retryable": retryable,
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Unavailable(msg) => AppError::ProviderUnavailable(msg),
            ProviderError::Rejected(msg) => AppError::Payment(msg),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}
