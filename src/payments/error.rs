use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::orders::OrderError;
use crate::rewards::RewardError;

/// Error types for payment operations
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Payment not found")]
    NotFound,

    #[error("Order not found")]
    OrderNotFound,

    #[error("Gateway error: {0}")]
    GatewayError(String),

    #[error("Invalid payment state: {0}")]
    InvalidState(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl From<sqlx::Error> for PaymentError {
    fn from(err: sqlx::Error) -> Self {
        PaymentError::DatabaseError(err.to_string())
    }
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        PaymentError::GatewayError(err.to_string())
    }
}

impl From<OrderError> for PaymentError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::NotFound => PaymentError::OrderNotFound,
            other => PaymentError::DatabaseError(other.to_string()),
        }
    }
}

impl From<RewardError> for PaymentError {
    fn from(err: RewardError) -> Self {
        PaymentError::DatabaseError(err.to_string())
    }
}

impl IntoResponse for PaymentError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            PaymentError::DatabaseError(msg) => {
                tracing::error!("Payment database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
            PaymentError::NotFound => (StatusCode::NOT_FOUND, "Payment not found".to_string()),
            PaymentError::OrderNotFound => (StatusCode::NOT_FOUND, "Order not found".to_string()),
            PaymentError::GatewayError(msg) => {
                tracing::error!("Payment gateway error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "Payment gateway unavailable".to_string(),
                )
            }
            PaymentError::InvalidState(msg) => (StatusCode::CONFLICT, msg),
            PaymentError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
