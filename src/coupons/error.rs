use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Error types for coupon operations
#[derive(Debug, thiserror::Error)]
pub enum CouponError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Coupon usage limit reached")]
    UsageLimitReached,

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<sqlx::Error> for CouponError {
    fn from(err: sqlx::Error) -> Self {
        CouponError::DatabaseError(err.to_string())
    }
}

impl IntoResponse for CouponError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            CouponError::DatabaseError(msg) => {
                tracing::error!("Coupon database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
            CouponError::UsageLimitReached => (
                StatusCode::CONFLICT,
                "Coupon usage limit reached".to_string(),
            ),
            CouponError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
