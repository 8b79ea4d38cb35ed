// Order pricing
//
// Combines the whole-unit terms into the order total. Every input is
// already floored (see money::floor_units); nothing here re-floors.

use serde::Serialize;

use crate::money;

/// The priced terms of an order, all whole currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriceBreakdown {
    pub subtotal: i64,
    pub delivery_charge: i64,
    pub coupon_discount: i64,
    pub points_value: i64,
    pub total: i64,
}

/// Price an order: `total = max(0, subtotal - coupon_discount -
/// points_value + delivery_charge)`.
///
/// `points_redeemed` is converted at the checkout redemption rate; the
/// coupon discount must already be computed against this subtotal.
pub fn price_order(
    subtotal: i64,
    delivery_charge: i64,
    coupon_discount: i64,
    points_redeemed: i64,
) -> PriceBreakdown {
    let points_value = money::checkout_redemption_value(points_redeemed);
    let total = (subtotal - coupon_discount - points_value + delivery_charge).max(0);

    PriceBreakdown {
        subtotal,
        delivery_charge,
        coupon_discount,
        points_value,
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_to_higher_fee_emirate() {
        // subtotal=200, no coupon, no points, delivery fee 50 -> total 250
        let breakdown = price_order(200, 50, 0, 0);
        assert_eq!(breakdown.total, 250);
        assert_eq!(breakdown.points_value, 0);
    }

    #[test]
    fn test_coupon_discount_reduces_total() {
        // subtotal=200, discount capped at 15
        let breakdown = price_order(200, 0, 15, 0);
        assert_eq!(breakdown.total, 185);
    }

    #[test]
    fn test_points_redemption_value_deducted() {
        // 40 points -> 10 units off
        let breakdown = price_order(200, 0, 0, 40);
        assert_eq!(breakdown.points_value, 10);
        assert_eq!(breakdown.total, 190);
    }

    #[test]
    fn test_total_never_negative() {
        let breakdown = price_order(10, 0, 50, 0);
        assert_eq!(breakdown.total, 0);
    }

    #[test]
    fn test_all_terms_combined() {
        // 200 - 15 coupon - 10 points + 30 delivery = 205
        let breakdown = price_order(200, 30, 15, 40);
        assert_eq!(breakdown.total, 205);
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// The pricing identity holds and every term is non-negative.
        #[test]
        fn prop_total_identity(
            subtotal in 0i64..1_000_000,
            delivery in 0i64..100,
            discount in 0i64..10_000,
            points in 0i64..100_000,
        ) {
            let b = price_order(subtotal, delivery, discount, points);
            prop_assert!(b.total >= 0);
            prop_assert_eq!(
                b.total,
                (b.subtotal - b.coupon_discount - b.points_value + b.delivery_charge).max(0)
            );
        }

        /// Redeeming more points never raises the total.
        #[test]
        fn prop_points_monotone_decrease(
            subtotal in 0i64..100_000,
            points in 0i64..10_000,
        ) {
            let before = price_order(subtotal, 0, 0, points);
            let after = price_order(subtotal, 0, 0, points + 4);
            prop_assert!(after.total <= before.total);
        }
    }
}
