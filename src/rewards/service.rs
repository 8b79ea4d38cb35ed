use uuid::Uuid;
use validator::Validate;

use crate::money;
use crate::rewards::engine;
use crate::rewards::error::RewardError;
use crate::rewards::models::{
    AddPointsRequest, NewRewardHistory, NextTier, RedeemPointsRequest, RedemptionResponse,
    RewardAction, RewardsAnalytics, RewardsResponse, RedeemOutcome,
};
use crate::rewards::repository::RewardsRepository;

/// Service for the standalone rewards surface: balances, redemption at the
/// 3-points-per-unit rate, manual crediting, history and analytics.
///
/// Order checkout and payment reconciliation mutate reward balances through
/// `RewardsRepository` directly, inside their own transactions.
#[derive(Clone)]
pub struct RewardService {
    repo: RewardsRepository,
}

impl RewardService {
    pub fn new(repo: RewardsRepository) -> Self {
        Self { repo }
    }

    /// Rewards summary for a customer. Customers without a record yet get
    /// the zero-valued GREEN default instead of a 404.
    pub async fn get_rewards(&self, customer_id: Uuid) -> Result<RewardsResponse, RewardError> {
        let reward = self.repo.find_by_customer(customer_id).await?;

        let (points, total_points, tier) = match &reward {
            Some(r) => (r.points, r.total_points, r.tier),
            None => (0, 0, crate::rewards::models::RewardTier::Green),
        };

        let history = if reward.is_some() {
            self.repo.history_for_customer(customer_id).await?
        } else {
            Vec::new()
        };

        Ok(RewardsResponse {
            points,
            total_points,
            tier,
            next_tier: engine::next_tier(total_points).map(|(tier, remaining_points)| NextTier {
                tier,
                remaining_points,
            }),
            history,
        })
    }

    /// Redeem points outside checkout at the standalone rate (3 points =
    /// 1 currency unit). The debit is a conditional decrement so two
    /// concurrent redemptions cannot overspend the balance.
    pub async fn redeem_points(
        &self,
        customer_id: Uuid,
        request: RedeemPointsRequest,
    ) -> Result<RedemptionResponse, RewardError> {
        request.validate()?;

        let reward = self
            .repo
            .find_by_customer(customer_id)
            .await?
            .ok_or(RewardError::RewardNotFound)?;

        let mut tx = self.repo.pool().begin().await?;

        let updated = self
            .repo
            .debit_standalone(&mut tx, customer_id, request.points)
            .await?
            .ok_or(RewardError::InsufficientPoints {
                requested: request.points,
                available: reward.points,
            })?;

        let redemption_value = money::standalone_redemption_value(request.points);
        self.repo
            .append_history(
                &mut tx,
                NewRewardHistory {
                    customer_id,
                    reward_id: updated.id,
                    order_id: request.order_id,
                    points_earned: 0,
                    points_redeemed: request.points,
                    order_total: 0,
                    action: RewardAction::Redeemed,
                    description: format!(
                        "Redeemed {} points for {}",
                        request.points,
                        money::format_currency(redemption_value)
                    ),
                },
            )
            .await?;

        tx.commit().await?;

        tracing::info!(
            %customer_id,
            points = request.points,
            redemption_value,
            "standalone points redemption"
        );

        Ok(RedemptionResponse {
            points: updated.points,
            redemption_value,
        })
    }

    /// Credit points for a purchase amount at the customer's current tier
    /// rate, recomputing the tier and announcing an upgrade when a
    /// threshold is crossed.
    pub async fn add_points(
        &self,
        customer_id: Uuid,
        request: AddPointsRequest,
    ) -> Result<RedeemOutcome, RewardError> {
        request.validate()?;

        let reward = self.repo.get_or_create(customer_id).await?;
        let earned = engine::points_earned(request.amount, reward.total_points);

        let mut tx = self.repo.pool().begin().await?;

        let (updated, previous_tier) =
            self.repo.credit_earned(&mut tx, customer_id, earned).await?;

        self.repo
            .append_history(
                &mut tx,
                NewRewardHistory {
                    customer_id,
                    reward_id: updated.id,
                    order_id: request.order_id,
                    points_earned: earned,
                    points_redeemed: 0,
                    order_total: request.amount,
                    action: RewardAction::Earned,
                    description: request.description.clone(),
                },
            )
            .await?;

        self.repo
            .announce_upgrade_if_crossed(&mut tx, &updated, previous_tier, request.order_id)
            .await?;

        tx.commit().await?;

        Ok(RedeemOutcome {
            points: updated.points,
            total_points: updated.total_points,
            tier: updated.tier,
            points_earned: earned,
        })
    }

    pub async fn history(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<crate::rewards::models::RewardHistory>, RewardError> {
        self.repo.history_for_customer(customer_id).await
    }

    pub async fn analytics(&self) -> Result<RewardsAnalytics, RewardError> {
        let total_customers = self.repo.total_customers().await?;
        let tier_distribution = self.repo.tier_distribution().await?;
        let (current_points, lifetime_points) = self.repo.point_totals().await?;
        let recent_activity = self.repo.recent_activity(10).await?;

        Ok(RewardsAnalytics {
            total_customers,
            tier_distribution,
            current_points,
            lifetime_points,
            recent_activity,
        })
    }
}
