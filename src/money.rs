// Monetary rounding rules for order pricing
//
// All amounts that enter order pricing are truncated to whole AED units
// before they are combined, and every persisted monetary column is a whole
// number of units. Partial sums are never re-floored.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// ISO currency code used for all orders and payments.
pub const CURRENCY: &str = "AED";

/// Truncate a monetary amount to whole currency units (floor toward
/// negative infinity, matching `Math.floor`).
///
/// Returns 0 when the value does not fit an i64, which cannot happen for
/// any amount a validated request can carry.
pub fn floor_units(amount: Decimal) -> i64 {
    amount.floor().to_i64().unwrap_or(0)
}

/// Monetary value of points redeemed against an order at checkout.
///
/// Checkout redemption pays out 0.25 units per point. This rate is specific
/// to order pricing and is NOT the same as the standalone redemption rate
/// below; the two are independent, context-scoped constants.
pub fn checkout_redemption_value(points: i64) -> i64 {
    debug_assert!(points >= 0);
    points / 4
}

/// Monetary value of points redeemed through the standalone rewards action
/// (3 points = 1 unit, floored).
pub fn standalone_redemption_value(points: i64) -> i64 {
    debug_assert!(points >= 0);
    points / 3
}

/// Format a whole-unit amount for human-readable descriptions.
pub fn format_currency(amount: i64) -> String {
    format!("{} {}.00", CURRENCY, amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_floor_units_truncates_fraction() {
        assert_eq!(floor_units(dec!(199.99)), 199);
        assert_eq!(floor_units(dec!(200.00)), 200);
        assert_eq!(floor_units(dec!(0.75)), 0);
    }

    #[test]
    fn test_floor_units_whole_values_unchanged() {
        assert_eq!(floor_units(dec!(30)), 30);
        assert_eq!(floor_units(Decimal::ZERO), 0);
    }

    #[test]
    fn test_checkout_redemption_quarter_unit_per_point() {
        // 40 points at 0.25/unit = 10 whole units
        assert_eq!(checkout_redemption_value(40), 10);
        assert_eq!(checkout_redemption_value(41), 10);
        assert_eq!(checkout_redemption_value(3), 0);
        assert_eq!(checkout_redemption_value(0), 0);
    }

    #[test]
    fn test_standalone_redemption_three_points_per_unit() {
        assert_eq!(standalone_redemption_value(3), 1);
        assert_eq!(standalone_redemption_value(100), 33);
        assert_eq!(standalone_redemption_value(2), 0);
    }

    #[test]
    fn test_rates_are_not_interchangeable() {
        // 12 points: 3 units at checkout, 4 units standalone
        assert_eq!(checkout_redemption_value(12), 3);
        assert_eq!(standalone_redemption_value(12), 4);
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(250), "AED 250.00");
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    proptest! {
        /// Flooring is idempotent: flooring an already-whole amount changes
        /// nothing.
        #[test]
        fn prop_floor_units_idempotent(units in 0i64..1_000_000) {
            let once = floor_units(Decimal::from(units));
            prop_assert_eq!(once, units);
        }

        /// The floored value never exceeds the input.
        #[test]
        fn prop_floor_units_never_rounds_up(cents in 0i64..100_000_000) {
            let amount = Decimal::new(cents, 2);
            let floored = Decimal::from(floor_units(amount));
            prop_assert!(floored <= amount);
            prop_assert!(amount - floored < Decimal::ONE);
        }

        /// Redemption values are monotone in the points spent and never
        /// exceed the nominal rate.
        #[test]
        fn prop_redemption_values_monotone(points in 0i64..1_000_000) {
            prop_assert!(checkout_redemption_value(points) <= checkout_redemption_value(points + 1));
            prop_assert!(standalone_redemption_value(points) <= standalone_redemption_value(points + 1));
            prop_assert!(checkout_redemption_value(points) * 4 <= points);
            prop_assert!(standalone_redemption_value(points) * 3 <= points);
        }
    }
}
