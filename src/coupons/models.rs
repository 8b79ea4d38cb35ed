use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::money::floor_units;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CouponType {
    Percentage,
    FixedAmount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum CouponStatus {
    Active,
    Inactive,
}

/// A discount coupon. Codes are unique case-insensitively; the active
/// window has a required start and an optional open end.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Coupon {
    pub id: Uuid,
    pub code: String,
    #[sqlx(rename = "coupon_type")]
    #[serde(rename = "type")]
    pub coupon_type: CouponType,
    pub value: Decimal,
    pub min_order_amount: Option<Decimal>,
    pub max_discount: Option<Decimal>,
    pub usage_limit: Option<i64>,
    pub usage_count: i64,
    pub status: CouponStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Coupon {
    /// Discount this coupon grants on a whole-unit subtotal.
    ///
    /// PERCENTAGE: `floor(subtotal * floor(value) / 100)`, capped at
    /// `floor(max_discount)` when set. FIXED_AMOUNT: `floor(value)`, never
    /// more than the subtotal. Both are whole-unit, non-negative amounts.
    pub fn discount_for(&self, subtotal: i64) -> i64 {
        match self.coupon_type {
            CouponType::Percentage => {
                let percentage = floor_units(self.value);
                let mut discount = subtotal * percentage / 100;
                if let Some(max) = self.max_discount {
                    discount = discount.min(floor_units(max));
                }
                discount.max(0)
            }
            CouponType::FixedAmount => floor_units(self.value).min(subtotal).max(0),
        }
    }

    /// Whether the subtotal clears the minimum-order bar, when one is set.
    pub fn meets_minimum(&self, subtotal: i64) -> bool {
        match self.min_order_amount {
            Some(min) => subtotal >= floor_units(min),
            None => true,
        }
    }

    /// Whether the usage counter is still below the limit, when one is set.
    pub fn has_remaining_uses(&self) -> bool {
        match self.usage_limit {
            Some(limit) => self.usage_count < limit,
            None => true,
        }
    }
}

/// Why a coupon code could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "reason")]
pub enum CouponRejection {
    /// Unknown code, inactive, or outside the active window.
    NotFound,
    BelowMinimum { minimum: i64 },
    UsageLimitReached,
}

impl CouponRejection {
    pub fn message(&self) -> String {
        match self {
            CouponRejection::NotFound => "Invalid or expired coupon".to_string(),
            CouponRejection::BelowMinimum { minimum } => format!(
                "Minimum purchase amount of {} required",
                crate::money::format_currency(*minimum)
            ),
            CouponRejection::UsageLimitReached => "Coupon usage limit reached".to_string(),
        }
    }
}

/// Outcome of resolving a coupon code against a subtotal.
#[derive(Debug)]
pub enum CouponResolution {
    Applied { coupon: Coupon, discount: i64 },
    Rejected(CouponRejection),
}

/// Request body for the coupon validation endpoint.
#[derive(Debug, Deserialize)]
pub struct ValidateCouponRequest {
    pub total: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn coupon(coupon_type: CouponType, value: Decimal, max_discount: Option<Decimal>) -> Coupon {
        Coupon {
            id: Uuid::new_v4(),
            code: "TEST10".to_string(),
            coupon_type,
            value,
            min_order_amount: None,
            max_discount,
            usage_limit: None,
            usage_count: 0,
            status: CouponStatus::Active,
            start_date: Utc::now(),
            end_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_percentage_discount_capped_by_max() {
        // 10% of 200 is 20, capped at 15
        let c = coupon(CouponType::Percentage, dec!(10), Some(dec!(15)));
        assert_eq!(c.discount_for(200), 15);
    }

    #[test]
    fn test_percentage_discount_uncapped() {
        let c = coupon(CouponType::Percentage, dec!(10), None);
        assert_eq!(c.discount_for(200), 20);
    }

    #[test]
    fn test_percentage_value_floored_before_use() {
        // floor(12.9) = 12 percent of 100
        let c = coupon(CouponType::Percentage, dec!(12.9), None);
        assert_eq!(c.discount_for(100), 12);
    }

    #[test]
    fn test_fixed_discount_never_exceeds_subtotal() {
        let c = coupon(CouponType::FixedAmount, dec!(50), None);
        assert_eq!(c.discount_for(30), 30);
        assert_eq!(c.discount_for(80), 50);
    }

    #[test]
    fn test_minimum_order_check() {
        let mut c = coupon(CouponType::Percentage, dec!(10), None);
        c.min_order_amount = Some(dec!(100));
        assert!(!c.meets_minimum(99));
        assert!(c.meets_minimum(100));
    }

    #[test]
    fn test_usage_limit_check() {
        let mut c = coupon(CouponType::Percentage, dec!(10), None);
        assert!(c.has_remaining_uses());
        c.usage_limit = Some(2);
        c.usage_count = 1;
        assert!(c.has_remaining_uses());
        c.usage_count = 2;
        assert!(!c.has_remaining_uses());
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    proptest! {
        /// Percentage discount never exceeds the floored max-discount cap.
        #[test]
        fn prop_percentage_respects_cap(
            subtotal in 0i64..1_000_000,
            percent in 0i64..100,
            cap in 0i64..10_000,
        ) {
            let c = Coupon {
                id: Uuid::new_v4(),
                code: "P".to_string(),
                coupon_type: CouponType::Percentage,
                value: Decimal::from(percent),
                min_order_amount: None,
                max_discount: Some(Decimal::from(cap)),
                usage_limit: None,
                usage_count: 0,
                status: CouponStatus::Active,
                start_date: Utc::now(),
                end_date: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };
            let discount = c.discount_for(subtotal);
            prop_assert!(discount <= cap);
            prop_assert!(discount <= subtotal * percent / 100);
            prop_assert!(discount >= 0);
        }

        /// Fixed discount is bounded by both its value and the subtotal.
        #[test]
        fn prop_fixed_bounded(subtotal in 0i64..1_000_000, value in 0i64..10_000) {
            let c = Coupon {
                id: Uuid::new_v4(),
                code: "F".to_string(),
                coupon_type: CouponType::FixedAmount,
                value: Decimal::from(value),
                min_order_amount: None,
                max_discount: None,
                usage_limit: None,
                usage_count: 0,
                status: CouponStatus::Active,
                start_date: Utc::now(),
                end_date: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };
            let discount = c.discount_for(subtotal);
            prop_assert!(discount <= value);
            prop_assert!(discount <= subtotal);
            prop_assert!(discount >= 0);
        }
    }
}
