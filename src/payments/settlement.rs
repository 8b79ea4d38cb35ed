// Settlement policy for gateway callbacks
//
// What a callback may mutate is decided here, without the database, so
// replayed callbacks and callbacks racing a cancellation stay predictable.
// The atomic backstop remains the conditional UPDATE in
// `PaymentsRepository::settle_if_pending`.

use uuid::Uuid;

use crate::notify::NotificationKind;
use crate::orders::models::{Order, OrderStatus, PaymentStatus};
use crate::rewards::models::{NewRewardHistory, RewardAction};

/// What a settlement attempt is allowed to touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleAction {
    /// Payment, order and points all move together.
    Settle,
    /// The payment row records the verdict, but the order is terminal:
    /// its status and its points must not move again.
    PaymentOnly,
    /// An earlier callback already settled this payment; report the
    /// stored outcome and change nothing.
    AlreadySettled,
}

pub fn settle_action(payment_status: PaymentStatus, order_status: OrderStatus) -> SettleAction {
    if payment_status != PaymentStatus::Pending {
        SettleAction::AlreadySettled
    } else if order_status.is_terminal() {
        SettleAction::PaymentOnly
    } else {
        SettleAction::Settle
    }
}

/// Ledger entries for a failed capture. The failure itself is always
/// recorded, with zero point movement; when points were redeemed at
/// checkout they additionally return to the spendable balance.
pub fn failure_ledger(order: &Order, reward_id: Uuid) -> Vec<NewRewardHistory> {
    let mut entries = vec![NewRewardHistory {
        customer_id: order.customer_id,
        reward_id,
        order_id: Some(order.id),
        points_earned: 0,
        points_redeemed: 0,
        order_total: order.total,
        action: RewardAction::Failed,
        description: format!(
            "Points not awarded due to failed payment for order {}",
            order.order_number
        ),
    }];

    if order.points_redeemed > 0 {
        entries.push(NewRewardHistory {
            customer_id: order.customer_id,
            reward_id,
            order_id: Some(order.id),
            points_earned: order.points_redeemed,
            points_redeemed: 0,
            order_total: order.total,
            action: RewardAction::Earned,
            description: format!(
                "Refunded {} points from cancelled order {}",
                order.points_redeemed, order.order_number
            ),
        });
    }

    entries
}

/// Capture is the moment the order is confirmed to the customer; every
/// other settlement outcome is a plain status update.
pub fn notification_kind(status: PaymentStatus) -> NotificationKind {
    if status == PaymentStatus::Captured {
        NotificationKind::OrderConfirmation
    } else {
        NotificationKind::OrderStatusUpdate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::models::FulfillmentMethod;
    use chrono::Utc;

    fn order_fixture(points_redeemed: i64) -> Order {
        Order {
            id: Uuid::new_v4(),
            order_number: "ORD-2508-0042".to_string(),
            idempotency_key: None,
            customer_id: Uuid::new_v4(),
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            fulfillment_method: FulfillmentMethod::Pickup,
            delivery_date: None,
            delivery_time_slot: None,
            delivery_instructions: None,
            street_address: None,
            apartment: None,
            emirate: None,
            city: None,
            pincode: None,
            pickup_date: None,
            pickup_time_slot: None,
            store_location: Some("Jumeirah 1".to_string()),
            subtotal: 200,
            delivery_charge: 0,
            coupon_discount: 0,
            points_value: 0,
            total: 200,
            points_earned: 14,
            points_redeemed,
            coupon_id: None,
            is_gift: false,
            gift_message: None,
            gift_recipient_name: None,
            gift_recipient_phone: None,
            admin_notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_replayed_callback_settles_nothing() {
        // A second reconciliation of an already-settled payment must not
        // mutate anything; points can only be credited once.
        assert_eq!(
            settle_action(PaymentStatus::Captured, OrderStatus::Processing),
            SettleAction::AlreadySettled
        );
        assert_eq!(
            settle_action(PaymentStatus::Failed, OrderStatus::Cancelled),
            SettleAction::AlreadySettled
        );
        assert_eq!(
            settle_action(PaymentStatus::Cancelled, OrderStatus::Pending),
            SettleAction::AlreadySettled
        );
    }

    #[test]
    fn test_pending_payment_on_live_order_settles() {
        assert_eq!(
            settle_action(PaymentStatus::Pending, OrderStatus::Pending),
            SettleAction::Settle
        );
    }

    #[test]
    fn test_terminal_order_is_not_resurrected() {
        // Customer cancels while the payment page is open: the late
        // callback records the payment verdict but leaves the cancelled
        // order and the already-refunded points alone.
        assert_eq!(
            settle_action(PaymentStatus::Pending, OrderStatus::Cancelled),
            SettleAction::PaymentOnly
        );
        assert_eq!(
            settle_action(PaymentStatus::Pending, OrderStatus::Refunded),
            SettleAction::PaymentOnly
        );
    }

    #[test]
    fn test_failed_capture_is_always_ledgered() {
        let order = order_fixture(0);
        let reward_id = Uuid::new_v4();
        let entries = failure_ledger(&order, reward_id);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, RewardAction::Failed);
        assert_eq!(entries[0].points_earned, 0);
        assert_eq!(entries[0].points_redeemed, 0);
        assert_eq!(entries[0].order_id, Some(order.id));
        assert!(entries[0].description.contains("ORD-2508-0042"));
    }

    #[test]
    fn test_failed_capture_refunds_redeemed_points() {
        let order = order_fixture(40);
        let entries = failure_ledger(&order, Uuid::new_v4());

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, RewardAction::Failed);
        assert_eq!(entries[1].action, RewardAction::Earned);
        assert_eq!(entries[1].points_earned, 40);
    }

    #[test]
    fn test_capture_sends_order_confirmation() {
        assert_eq!(
            notification_kind(PaymentStatus::Captured),
            NotificationKind::OrderConfirmation
        );
        assert_eq!(
            notification_kind(PaymentStatus::Failed),
            NotificationKind::OrderStatusUpdate
        );
    }
}
