// HTTP handlers for the rewards endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::auth::middleware::{AdminUser, AuthenticatedCustomer};
use crate::rewards::error::RewardError;
use crate::rewards::models::{
    AddPointsRequest, RedeemOutcome, RedeemPointsRequest, RedemptionResponse, RewardHistory,
    RewardsAnalytics, RewardsResponse,
};

/// Handler for GET /api/rewards
/// Returns the authenticated customer's rewards summary
pub async fn get_rewards_handler(
    State(state): State<crate::AppState>,
    customer: AuthenticatedCustomer,
) -> Result<Json<RewardsResponse>, RewardError> {
    let rewards = state.reward_service.get_rewards(customer.customer_id).await?;
    Ok(Json(rewards))
}

/// Handler for POST /api/rewards/redeem
/// Redeems points at the standalone rate (3 points = 1 unit)
pub async fn redeem_points_handler(
    State(state): State<crate::AppState>,
    customer: AuthenticatedCustomer,
    Json(request): Json<RedeemPointsRequest>,
) -> Result<Json<RedemptionResponse>, RewardError> {
    let outcome = state
        .reward_service
        .redeem_points(customer.customer_id, request)
        .await?;
    Ok(Json(outcome))
}

/// Handler for GET /api/rewards/history
pub async fn get_reward_history_handler(
    State(state): State<crate::AppState>,
    customer: AuthenticatedCustomer,
) -> Result<Json<Vec<RewardHistory>>, RewardError> {
    let history = state.reward_service.history(customer.customer_id).await?;
    Ok(Json(history))
}

/// Handler for POST /api/customers/{customer_id}/points (admin)
/// Credits points for a purchase amount at the customer's tier rate
pub async fn add_points_handler(
    State(state): State<crate::AppState>,
    _admin: AdminUser,
    Path(customer_id): Path<Uuid>,
    Json(request): Json<AddPointsRequest>,
) -> Result<Json<RedeemOutcome>, RewardError> {
    let outcome = state.reward_service.add_points(customer_id, request).await?;
    Ok(Json(outcome))
}

/// Handler for GET /api/customers/{customer_id}/rewards (admin)
pub async fn get_customer_rewards_handler(
    State(state): State<crate::AppState>,
    _admin: AdminUser,
    Path(customer_id): Path<Uuid>,
) -> Result<Json<RewardsResponse>, RewardError> {
    let rewards = state.reward_service.get_rewards(customer_id).await?;
    Ok(Json(rewards))
}

/// Handler for GET /api/rewards/analytics (admin)
pub async fn get_rewards_analytics_handler(
    State(state): State<crate::AppState>,
    _admin: AdminUser,
) -> Result<Json<RewardsAnalytics>, RewardError> {
    let analytics = state.reward_service.analytics().await?;
    Ok(Json(analytics))
}
