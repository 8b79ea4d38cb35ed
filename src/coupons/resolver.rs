use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::coupons::error::CouponError;
use crate::coupons::models::{Coupon, CouponRejection, CouponResolution};

/// Looks up and applies coupons.
///
/// Resolution is a read-only check; `record_usage` performs the usage
/// increment and audit insert and must run inside the order-creation
/// transaction so the usage limit cannot be overrun by concurrent
/// checkouts.
#[derive(Clone)]
pub struct CouponResolver {
    pool: PgPool,
}

impl CouponResolver {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a coupon by code (case-insensitive) that is ACTIVE and inside
    /// its start/end window right now.
    pub async fn find_active(&self, code: &str) -> Result<Option<Coupon>, CouponError> {
        let coupon = sqlx::query_as::<_, Coupon>(
            r#"
            SELECT id, code, coupon_type, value, min_order_amount, max_discount,
                   usage_limit, usage_count, status, start_date, end_date,
                   created_at, updated_at
            FROM coupons
            WHERE UPPER(code) = UPPER($1)
              AND status = 'ACTIVE'
              AND start_date <= NOW()
              AND (end_date IS NULL OR end_date > NOW())
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(coupon)
    }

    /// Resolve a code against a floored subtotal.
    ///
    /// Rejections (unknown/inactive/out-of-window code, subtotal below the
    /// minimum, usage limit reached) are data, not errors; only I/O
    /// failures surface as `Err`.
    pub async fn resolve(
        &self,
        code: &str,
        subtotal: i64,
    ) -> Result<CouponResolution, CouponError> {
        let coupon = match self.find_active(code).await? {
            Some(coupon) => coupon,
            None => return Ok(CouponResolution::Rejected(CouponRejection::NotFound)),
        };

        if !coupon.meets_minimum(subtotal) {
            let minimum = crate::money::floor_units(coupon.min_order_amount.unwrap_or_default());
            return Ok(CouponResolution::Rejected(CouponRejection::BelowMinimum {
                minimum,
            }));
        }

        if !coupon.has_remaining_uses() {
            return Ok(CouponResolution::Rejected(
                CouponRejection::UsageLimitReached,
            ));
        }

        let discount = coupon.discount_for(subtotal);
        Ok(CouponResolution::Applied { coupon, discount })
    }

    /// Increment the usage counter and record a CouponUsage audit row.
    ///
    /// The increment is conditional on the limit still having headroom, so
    /// two checkouts racing on the last use cannot both succeed; the loser
    /// gets `UsageLimitReached`.
    pub async fn record_usage(
        &self,
        conn: &mut PgConnection,
        coupon_id: Uuid,
        order_id: Uuid,
        customer_id: Uuid,
        discount: i64,
    ) -> Result<(), CouponError> {
        let result = sqlx::query(
            r#"
            UPDATE coupons
            SET usage_count = usage_count + 1, updated_at = NOW()
            WHERE id = $1 AND (usage_limit IS NULL OR usage_count < usage_limit)
            "#,
        )
        .bind(coupon_id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CouponError::UsageLimitReached);
        }

        sqlx::query(
            r#"
            INSERT INTO coupon_usages (id, coupon_id, order_id, customer_id, discount)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(coupon_id)
        .bind(order_id)
        .bind(customer_id)
        .bind(discount)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}
