use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::rewards::engine;
use crate::rewards::error::RewardError;
use crate::rewards::models::{
    CustomerReward, NewRewardHistory, RewardAction, RewardHistory, RewardTier, TierCount,
};

/// Repository for customer reward balances and the reward history ledger.
///
/// Balance mutations are conditional read-modify-write statements so that
/// concurrent redemptions cannot drive a balance negative; the ledger is
/// append-only. Mutating methods take a `PgConnection` so callers can run
/// them inside a surrounding transaction.
#[derive(Clone)]
pub struct RewardsRepository {
    pool: PgPool,
}

impl RewardsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Fetch the customer's reward record, creating a zeroed GREEN record
    /// if none exists.
    pub async fn get_or_create(&self, customer_id: Uuid) -> Result<CustomerReward, RewardError> {
        let reward = sqlx::query_as::<_, CustomerReward>(
            r#"
            INSERT INTO customer_rewards (id, customer_id, points, total_points, tier)
            VALUES ($1, $2, 0, 0, 'GREEN')
            ON CONFLICT (customer_id) DO UPDATE SET customer_id = EXCLUDED.customer_id
            RETURNING id, customer_id, points, total_points, tier, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(customer_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(reward)
    }

    /// [`get_or_create`](Self::get_or_create) inside the caller's
    /// transaction, for ledger writes that must land with the settlement.
    pub async fn get_or_create_in_tx(
        &self,
        conn: &mut PgConnection,
        customer_id: Uuid,
    ) -> Result<CustomerReward, RewardError> {
        let reward = sqlx::query_as::<_, CustomerReward>(
            r#"
            INSERT INTO customer_rewards (id, customer_id, points, total_points, tier)
            VALUES ($1, $2, 0, 0, 'GREEN')
            ON CONFLICT (customer_id) DO UPDATE SET customer_id = EXCLUDED.customer_id
            RETURNING id, customer_id, points, total_points, tier, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(customer_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(reward)
    }

    pub async fn find_by_customer(
        &self,
        customer_id: Uuid,
    ) -> Result<Option<CustomerReward>, RewardError> {
        let reward = sqlx::query_as::<_, CustomerReward>(
            r#"
            SELECT id, customer_id, points, total_points, tier, created_at, updated_at
            FROM customer_rewards
            WHERE customer_id = $1
            "#,
        )
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(reward)
    }

    /// Debit a checkout redemption: both the spendable balance and the
    /// lifetime counter drop by `points`. Returns `None` when the balance
    /// is insufficient (the guard against concurrent redemption races).
    pub async fn debit_checkout(
        &self,
        conn: &mut PgConnection,
        customer_id: Uuid,
        points: i64,
    ) -> Result<Option<CustomerReward>, RewardError> {
        let reward = sqlx::query_as::<_, CustomerReward>(
            r#"
            UPDATE customer_rewards
            SET points = points - $2, total_points = total_points - $2, updated_at = NOW()
            WHERE customer_id = $1 AND points >= $2
            RETURNING id, customer_id, points, total_points, tier, created_at, updated_at
            "#,
        )
        .bind(customer_id)
        .bind(points)
        .fetch_optional(&mut *conn)
        .await?;

        // Lifetime points changed, so the persisted tier may be stale.
        match reward {
            Some(reward) => {
                let (reward, _) = self.recompute_tier(conn, reward).await?;
                Ok(Some(reward))
            }
            None => Ok(None),
        }
    }

    /// Debit a standalone redemption: only the spendable balance drops,
    /// the lifetime counter and tier are untouched.
    pub async fn debit_standalone(
        &self,
        conn: &mut PgConnection,
        customer_id: Uuid,
        points: i64,
    ) -> Result<Option<CustomerReward>, RewardError> {
        let reward = sqlx::query_as::<_, CustomerReward>(
            r#"
            UPDATE customer_rewards
            SET points = points - $2, updated_at = NOW()
            WHERE customer_id = $1 AND points >= $2
            RETURNING id, customer_id, points, total_points, tier, created_at, updated_at
            "#,
        )
        .bind(customer_id)
        .bind(points)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(reward)
    }

    /// Credit earned points to both the spendable balance and the lifetime
    /// counter, recomputing the tier. Returns the updated record and the
    /// tier held before the credit so callers can announce upgrades.
    pub async fn credit_earned(
        &self,
        conn: &mut PgConnection,
        customer_id: Uuid,
        points: i64,
    ) -> Result<(CustomerReward, RewardTier), RewardError> {
        let reward = sqlx::query_as::<_, CustomerReward>(
            r#"
            UPDATE customer_rewards
            SET points = points + $2, total_points = total_points + $2, updated_at = NOW()
            WHERE customer_id = $1
            RETURNING id, customer_id, points, total_points, tier, created_at, updated_at
            "#,
        )
        .bind(customer_id)
        .bind(points)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(RewardError::RewardNotFound)?;

        let previous_tier = reward.tier;
        let (reward, _) = self.recompute_tier(conn, reward).await?;
        Ok((reward, previous_tier))
    }

    /// Re-credit points refunded from a cancelled order. Only the spendable
    /// balance grows; lifetime points and tier are unaffected.
    pub async fn refund_redeemable(
        &self,
        conn: &mut PgConnection,
        customer_id: Uuid,
        points: i64,
    ) -> Result<CustomerReward, RewardError> {
        let reward = sqlx::query_as::<_, CustomerReward>(
            r#"
            UPDATE customer_rewards
            SET points = points + $2, updated_at = NOW()
            WHERE customer_id = $1
            RETURNING id, customer_id, points, total_points, tier, created_at, updated_at
            "#,
        )
        .bind(customer_id)
        .bind(points)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(RewardError::RewardNotFound)?;

        Ok(reward)
    }

    /// Persist the tier derived from the current lifetime points if it
    /// differs from the cached value. Returns the (possibly updated) record
    /// and whether the tier increased.
    async fn recompute_tier(
        &self,
        conn: &mut PgConnection,
        reward: CustomerReward,
    ) -> Result<(CustomerReward, bool), RewardError> {
        let derived = engine::tier_for(reward.total_points);
        if derived == reward.tier {
            return Ok((reward, false));
        }

        let upgraded = derived > reward.tier;
        let updated = sqlx::query_as::<_, CustomerReward>(
            r#"
            UPDATE customer_rewards
            SET tier = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, customer_id, points, total_points, tier, created_at, updated_at
            "#,
        )
        .bind(reward.id)
        .bind(derived)
        .fetch_one(&mut *conn)
        .await?;

        Ok((updated, upgraded))
    }

    /// Append one ledger entry.
    pub async fn append_history(
        &self,
        conn: &mut PgConnection,
        entry: NewRewardHistory,
    ) -> Result<(), RewardError> {
        sqlx::query(
            r#"
            INSERT INTO reward_history
                (id, customer_id, reward_id, order_id, points_earned, points_redeemed,
                 order_total, action, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(entry.customer_id)
        .bind(entry.reward_id)
        .bind(entry.order_id)
        .bind(entry.points_earned)
        .bind(entry.points_redeemed)
        .bind(entry.order_total)
        .bind(entry.action)
        .bind(entry.description)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Append the tier-upgrade announcement entry when a credit crossed a
    /// threshold. Carries a zero point delta; descriptive only.
    pub async fn announce_upgrade_if_crossed(
        &self,
        conn: &mut PgConnection,
        reward: &CustomerReward,
        previous_tier: RewardTier,
        order_id: Option<Uuid>,
    ) -> Result<(), RewardError> {
        if reward.tier <= previous_tier {
            return Ok(());
        }

        self.append_history(
            conn,
            NewRewardHistory {
                customer_id: reward.customer_id,
                reward_id: reward.id,
                order_id,
                points_earned: 0,
                points_redeemed: 0,
                order_total: 0,
                action: RewardAction::Earned,
                description: format!(
                    "Congratulations! You've been upgraded to {} tier! You now earn {}% points on every order!",
                    reward.tier,
                    engine::accrual_percent(reward.tier)
                ),
            },
        )
        .await
    }

    pub async fn history_for_customer(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<RewardHistory>, RewardError> {
        let history = sqlx::query_as::<_, RewardHistory>(
            r#"
            SELECT id, customer_id, reward_id, order_id, points_earned, points_redeemed,
                   order_total, action, description, created_at
            FROM reward_history
            WHERE customer_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(history)
    }

    pub async fn total_customers(&self) -> Result<i64, RewardError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customer_rewards")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn tier_distribution(&self) -> Result<Vec<TierCount>, RewardError> {
        let counts = sqlx::query_as::<_, TierCount>(
            "SELECT tier, COUNT(*) AS count FROM customer_rewards GROUP BY tier",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(counts)
    }

    /// Current and lifetime point sums across all customers.
    pub async fn point_totals(&self) -> Result<(i64, i64), RewardError> {
        let totals: (i64, i64) = sqlx::query_as(
            "SELECT COALESCE(SUM(points), 0)::BIGINT, COALESCE(SUM(total_points), 0)::BIGINT FROM customer_rewards",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(totals)
    }

    pub async fn recent_activity(&self, limit: i64) -> Result<Vec<RewardHistory>, RewardError> {
        let history = sqlx::query_as::<_, RewardHistory>(
            r#"
            SELECT id, customer_id, reward_id, order_id, points_earned, points_redeemed,
                   order_total, action, description, created_at
            FROM reward_history
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(history)
    }
}
