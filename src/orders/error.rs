use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::coupons::CouponError;
use crate::rewards::RewardError;

/// Error types for order operations
#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Order not found")]
    NotFound,

    #[error("Customer not found")]
    CustomerNotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Insufficient points: requested {requested}, available {available}")]
    InsufficientPoints { requested: i64, available: i64 },

    #[error("Coupon usage limit reached")]
    CouponUsageLimitReached,

    #[error("Failed to generate unique order number after {0} attempts")]
    OrderNumberExhausted(u32),

    #[error("Order is in terminal status {0} and cannot transition")]
    TerminalStatus(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl From<sqlx::Error> for OrderError {
    fn from(err: sqlx::Error) -> Self {
        OrderError::DatabaseError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for OrderError {
    fn from(err: validator::ValidationErrors) -> Self {
        OrderError::ValidationError(err.to_string())
    }
}

impl From<RewardError> for OrderError {
    fn from(err: RewardError) -> Self {
        match err {
            RewardError::InsufficientPoints {
                requested,
                available,
            } => OrderError::InsufficientPoints {
                requested,
                available,
            },
            RewardError::CustomerNotFound => OrderError::CustomerNotFound,
            other => OrderError::DatabaseError(other.to_string()),
        }
    }
}

impl From<CouponError> for OrderError {
    fn from(err: CouponError) -> Self {
        match err {
            CouponError::UsageLimitReached => OrderError::CouponUsageLimitReached,
            other => OrderError::DatabaseError(other.to_string()),
        }
    }
}

impl IntoResponse for OrderError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            OrderError::DatabaseError(msg) => {
                tracing::error!("Order database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
            OrderError::NotFound => (StatusCode::NOT_FOUND, "Order not found".to_string()),
            OrderError::CustomerNotFound => {
                (StatusCode::NOT_FOUND, "Customer not found".to_string())
            }
            OrderError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            OrderError::InsufficientPoints { .. } => {
                (StatusCode::CONFLICT, "Insufficient points".to_string())
            }
            OrderError::CouponUsageLimitReached => (
                StatusCode::CONFLICT,
                "Coupon usage limit reached".to_string(),
            ),
            OrderError::OrderNumberExhausted(_) => (
                StatusCode::CONFLICT,
                "Failed to allocate order number".to_string(),
            ),
            OrderError::TerminalStatus(status) => (
                StatusCode::CONFLICT,
                format!("Order is {} and cannot change status", status),
            ),
            OrderError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
