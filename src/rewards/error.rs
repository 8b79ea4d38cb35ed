use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Error types for reward operations
#[derive(Debug, thiserror::Error)]
pub enum RewardError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Customer not found")]
    CustomerNotFound,

    #[error("Reward record not found")]
    RewardNotFound,

    #[error("Insufficient points: requested {requested}, available {available}")]
    InsufficientPoints { requested: i64, available: i64 },

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<sqlx::Error> for RewardError {
    fn from(err: sqlx::Error) -> Self {
        RewardError::DatabaseError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for RewardError {
    fn from(err: validator::ValidationErrors) -> Self {
        RewardError::ValidationError(err.to_string())
    }
}

impl IntoResponse for RewardError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            RewardError::DatabaseError(msg) => {
                tracing::error!("Reward database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
            RewardError::CustomerNotFound => {
                (StatusCode::NOT_FOUND, "Customer not found".to_string())
            }
            RewardError::RewardNotFound => {
                (StatusCode::NOT_FOUND, "Reward record not found".to_string())
            }
            RewardError::InsufficientPoints { .. } => {
                (StatusCode::CONFLICT, "Insufficient points".to_string())
            }
            RewardError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
