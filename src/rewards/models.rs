use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Loyalty tier, ordered lowest to highest.
///
/// GREEN is presented as BRONZE in some admin tooling; the persisted value
/// is always GREEN.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum RewardTier {
    Green,
    Silver,
    Gold,
    Platinum,
}

impl RewardTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RewardTier::Green => "GREEN",
            RewardTier::Silver => "SILVER",
            RewardTier::Gold => "GOLD",
            RewardTier::Platinum => "PLATINUM",
        }
    }
}

impl std::fmt::Display for RewardTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ledger entry classification.
///
/// Cancellation refunds reuse EARNED (the description distinguishes them);
/// FAILED entries carry a zero point delta and only preserve the audit
/// trail for payments that never captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum RewardAction {
    Earned,
    Redeemed,
    Failed,
}

impl RewardAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RewardAction::Earned => "EARNED",
            RewardAction::Redeemed => "REDEEMED",
            RewardAction::Failed => "FAILED",
        }
    }
}

/// One reward record per customer.
///
/// `points` is the spendable balance, `total_points` the monotone lifetime
/// accumulator that drives the tier. Both are cached aggregates of the
/// reward history ledger and must always equal its running sum.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CustomerReward {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub points: i64,
    pub total_points: i64,
    pub tier: RewardTier,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only ledger row backing the cached reward aggregates.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RewardHistory {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub reward_id: Uuid,
    pub order_id: Option<Uuid>,
    pub points_earned: i64,
    pub points_redeemed: i64,
    pub order_total: i64,
    pub action: RewardAction,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Ledger entry to append; ids and timestamp are assigned at insert.
#[derive(Debug, Clone)]
pub struct NewRewardHistory {
    pub customer_id: Uuid,
    pub reward_id: Uuid,
    pub order_id: Option<Uuid>,
    pub points_earned: i64,
    pub points_redeemed: i64,
    pub order_total: i64,
    pub action: RewardAction,
    pub description: String,
}

/// Request body for the standalone redeem action (3 points = 1 unit).
#[derive(Debug, Deserialize, Validate)]
pub struct RedeemPointsRequest {
    #[validate(range(min = 1, message = "Points must be greater than 0"))]
    pub points: i64,
    pub order_id: Option<Uuid>,
}

/// Request body for crediting points against a purchase amount.
#[derive(Debug, Deserialize, Validate)]
pub struct AddPointsRequest {
    #[validate(range(min = 1, message = "Amount must be greater than 0"))]
    pub amount: i64,
    pub order_id: Option<Uuid>,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
}

/// Customer-facing rewards summary; zero-valued when no record exists yet.
#[derive(Debug, Serialize)]
pub struct RewardsResponse {
    pub points: i64,
    pub total_points: i64,
    pub tier: RewardTier,
    pub next_tier: Option<NextTier>,
    pub history: Vec<RewardHistory>,
}

#[derive(Debug, Serialize)]
pub struct NextTier {
    pub tier: RewardTier,
    pub remaining_points: i64,
}

/// Outcome of a standalone redemption.
#[derive(Debug, Serialize)]
pub struct RedemptionResponse {
    pub points: i64,
    pub redemption_value: i64,
}

/// Outcome of crediting points against a purchase.
#[derive(Debug, Serialize)]
pub struct RedeemOutcome {
    pub points: i64,
    pub total_points: i64,
    pub tier: RewardTier,
    pub points_earned: i64,
}

/// Aggregate view for the admin rewards dashboard.
#[derive(Debug, Serialize)]
pub struct RewardsAnalytics {
    pub total_customers: i64,
    pub tier_distribution: Vec<TierCount>,
    pub current_points: i64,
    pub lifetime_points: i64,
    pub recent_activity: Vec<RewardHistory>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct TierCount {
    pub tier: RewardTier,
    pub count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_ordering() {
        assert!(RewardTier::Green < RewardTier::Silver);
        assert!(RewardTier::Silver < RewardTier::Gold);
        assert!(RewardTier::Gold < RewardTier::Platinum);
    }

    #[test]
    fn test_tier_serialization_uppercase() {
        assert_eq!(
            serde_json::to_string(&RewardTier::Platinum).unwrap(),
            "\"PLATINUM\""
        );
        let parsed: RewardTier = serde_json::from_str("\"GREEN\"").unwrap();
        assert_eq!(parsed, RewardTier::Green);
    }

    #[test]
    fn test_redeem_request_rejects_zero_points() {
        use validator::Validate;
        let request = RedeemPointsRequest {
            points: 0,
            order_id: None,
        };
        assert!(request.validate().is_err());
    }
}
