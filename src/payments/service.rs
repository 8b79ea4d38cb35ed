use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use crate::config::GatewayConfig;
use crate::money;
use crate::notify::{Notifier, OrderPush};
use crate::orders::models::{Order, OrderStatus, PaymentStatus};
use crate::orders::repository::OrdersRepository;
use crate::payments::error::PaymentError;
use crate::payments::gateway::{GatewayOrderRequest, PaymentGateway};
use crate::payments::models::{
    CallbackOutcome, CreatePaymentRequest, CreatePaymentResponse, Payment, PaymentChannel,
    PaymentStatusResponse,
};
use crate::payments::repository::PaymentsRepository;
use crate::payments::settlement::{self, SettleAction};
use crate::rewards::models::{NewRewardHistory, RewardAction};
use crate::rewards::repository::RewardsRepository;

/// Reconciles gateway sessions against orders.
///
/// The reconciliation path is idempotent: a payment is only settled while
/// it is still PENDING, so replayed callbacks and the web/mobile callback
/// racing each other produce one state change and one points credit.
#[derive(Clone)]
pub struct PaymentService {
    payments_repo: PaymentsRepository,
    orders_repo: OrdersRepository,
    rewards_repo: RewardsRepository,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
    push: Arc<dyn OrderPush>,
    config: GatewayConfig,
}

impl PaymentService {
    pub fn new(
        payments_repo: PaymentsRepository,
        orders_repo: OrdersRepository,
        rewards_repo: RewardsRepository,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        push: Arc<dyn OrderPush>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            payments_repo,
            orders_repo,
            rewards_repo,
            gateway,
            notifier,
            push,
            config,
        }
    }

    /// Open a hosted-payment session for an order awaiting payment.
    pub async fn create_payment(
        &self,
        customer_id: Uuid,
        request: CreatePaymentRequest,
    ) -> Result<CreatePaymentResponse, PaymentError> {
        let order = self
            .orders_repo
            .find_by_id(request.order_id)
            .await?
            .ok_or(PaymentError::OrderNotFound)?;

        if order.customer_id != customer_id {
            return Err(PaymentError::OrderNotFound);
        }
        if order.payment_status != PaymentStatus::Pending {
            return Err(PaymentError::InvalidState(format!(
                "Order payment is already {}",
                order.payment_status
            )));
        }

        let (redirect_url, cancel_url) = match request.channel {
            PaymentChannel::Web => (
                self.config.web_redirect_url.clone(),
                self.config.web_cancel_url.clone(),
            ),
            PaymentChannel::Mobile => (
                self.config.mobile_redirect_url.clone(),
                self.config.mobile_cancel_url.clone(),
            ),
        };

        let session = self
            .gateway
            .create_hosted_order(&GatewayOrderRequest {
                // Gateway amounts are minor units (fils).
                amount_minor: order.total * 100,
                currency: money::CURRENCY.to_string(),
                merchant_order_reference: order.order_number.clone(),
                redirect_url,
                cancel_url,
            })
            .await?;

        let payment = self
            .payments_repo
            .insert(
                order.id,
                &order.order_number,
                &session.reference,
                order.total,
                money::CURRENCY,
            )
            .await?;

        tracing::info!(
            order_number = %order.order_number,
            gateway_ref = %session.reference,
            "payment session opened"
        );

        Ok(CreatePaymentResponse {
            payment_id: payment.id,
            gateway_order_ref: session.reference,
            payment_url: session.payment_url,
        })
    }

    /// Reconcile a gateway session after the shopper returns.
    ///
    /// Fetches the authoritative state from the gateway and applies it to
    /// the payment, the order, and the reward balance in one transaction.
    /// A payment that is no longer PENDING returns its stored outcome
    /// without touching anything.
    pub async fn reconcile(&self, gateway_ref: &str) -> Result<CallbackOutcome, PaymentError> {
        let payment = self
            .payments_repo
            .find_by_gateway_ref(gateway_ref)
            .await?
            .ok_or(PaymentError::NotFound)?;
        let order = self
            .orders_repo
            .find_by_id(payment.order_id)
            .await?
            .ok_or(PaymentError::OrderNotFound)?;

        if settlement::settle_action(payment.status, order.status) == SettleAction::AlreadySettled {
            return Ok(Self::stored_outcome(&payment, &order));
        }

        // Gateway unreachable is fatal here: without its verdict the
        // payment must stay PENDING for a later retry.
        let state = self.gateway.order_state(gateway_ref).await?;

        if state.is_success() {
            self.apply_capture(&payment, &order, &state.raw).await
        } else {
            let message = state.failure_message();
            self.apply_failure(&payment, &order, &state.raw, &message)
                .await
        }
    }

    /// The shopper backed out on the payment page. The payment closes as
    /// CANCELLED but the order stays PENDING so payment can be retried.
    pub async fn reconcile_cancelled(
        &self,
        gateway_ref: &str,
    ) -> Result<CallbackOutcome, PaymentError> {
        let payment = self
            .payments_repo
            .find_by_gateway_ref(gateway_ref)
            .await?
            .ok_or(PaymentError::NotFound)?;
        let order = self
            .orders_repo
            .find_by_id(payment.order_id)
            .await?
            .ok_or(PaymentError::OrderNotFound)?;

        if payment.status != PaymentStatus::Pending {
            return Ok(Self::stored_outcome(&payment, &order));
        }

        let mut tx = self.payments_repo.pool().begin().await?;
        let settled = self
            .payments_repo
            .settle_if_pending(
                &mut tx,
                payment.id,
                PaymentStatus::Cancelled,
                &json!({}),
                Some("Cancelled by customer"),
            )
            .await?;
        tx.commit().await?;

        match settled {
            Some(payment) => Ok(Self::stored_outcome(&payment, &order)),
            None => self.outcome_after_race(gateway_ref, &order).await,
        }
    }

    async fn apply_capture(
        &self,
        payment: &Payment,
        order: &Order,
        raw: &serde_json::Value,
    ) -> Result<CallbackOutcome, PaymentError> {
        let mut tx = self.payments_repo.pool().begin().await?;

        let settled = self
            .payments_repo
            .settle_if_pending(&mut tx, payment.id, PaymentStatus::Captured, raw, None)
            .await?;
        if settled.is_none() {
            drop(tx);
            return self.outcome_after_race(&payment.gateway_order_ref, order).await;
        }

        // The order may have been cancelled while the payment page was
        // open. A terminal order keeps the payment record but must not be
        // revived; the money needs a manual refund.
        let current = self.orders_repo.status_for_update(&mut tx, order.id).await?;
        if current.is_terminal() {
            tx.commit().await?;
            tracing::warn!(
                order_number = %order.order_number,
                status = %current,
                "payment captured for terminal order, refund required"
            );
            return Ok(CallbackOutcome {
                status: PaymentStatus::Captured,
                order_id: order.id,
                order_number: order.order_number.clone(),
                error_message: None,
            });
        }

        self.orders_repo
            .set_payment_outcome(
                &mut tx,
                order.id,
                OrderStatus::Processing,
                PaymentStatus::Captured,
            )
            .await?;
        self.orders_repo
            .append_status_history(
                &mut tx,
                order.id,
                OrderStatus::Processing,
                Some("Payment successful"),
                "SYSTEM",
            )
            .await?;

        // Points accrue only now that the money is real.
        if order.points_earned > 0 {
            let (reward, previous_tier) = self
                .rewards_repo
                .credit_earned(&mut tx, order.customer_id, order.points_earned)
                .await?;
            self.rewards_repo
                .append_history(
                    &mut tx,
                    NewRewardHistory {
                        customer_id: order.customer_id,
                        reward_id: reward.id,
                        order_id: Some(order.id),
                        points_earned: order.points_earned,
                        points_redeemed: 0,
                        order_total: order.total,
                        action: RewardAction::Earned,
                        description: format!(
                            "Earned {} points from order {}",
                            order.points_earned, order.order_number
                        ),
                    },
                )
                .await?;
            self.rewards_repo
                .announce_upgrade_if_crossed(&mut tx, &reward, previous_tier, Some(order.id))
                .await?;
        }

        tx.commit().await?;

        tracing::info!(order_number = %order.order_number, "payment captured");
        self.announce(order, OrderStatus::Processing, PaymentStatus::Captured)
            .await;

        Ok(CallbackOutcome {
            status: PaymentStatus::Captured,
            order_id: order.id,
            order_number: order.order_number.clone(),
            error_message: None,
        })
    }

    async fn apply_failure(
        &self,
        payment: &Payment,
        order: &Order,
        raw: &serde_json::Value,
        message: &str,
    ) -> Result<CallbackOutcome, PaymentError> {
        let mut tx = self.payments_repo.pool().begin().await?;

        let settled = self
            .payments_repo
            .settle_if_pending(
                &mut tx,
                payment.id,
                PaymentStatus::Failed,
                raw,
                Some(message),
            )
            .await?;
        if settled.is_none() {
            drop(tx);
            return self.outcome_after_race(&payment.gateway_order_ref, order).await;
        }

        // An order cancelled while the payment was in flight has already
        // had its redeemed points refunded; only the payment row moves.
        let current = self.orders_repo.status_for_update(&mut tx, order.id).await?;
        if current.is_terminal() {
            tx.commit().await?;
            tracing::info!(
                order_number = %order.order_number,
                status = %current,
                "payment failed for terminal order"
            );
            return Ok(CallbackOutcome {
                status: PaymentStatus::Failed,
                order_id: order.id,
                order_number: order.order_number.clone(),
                error_message: Some(message.to_string()),
            });
        }

        self.orders_repo
            .set_payment_outcome(
                &mut tx,
                order.id,
                OrderStatus::Cancelled,
                PaymentStatus::Failed,
            )
            .await?;
        self.orders_repo
            .append_status_history(
                &mut tx,
                order.id,
                OrderStatus::Cancelled,
                Some(&format!("Payment failed: {}", message)),
                "SYSTEM",
            )
            .await?;

        // The ledger always records the failed capture; any points
        // redeemed at checkout additionally go back to the spendable
        // balance.
        let reward = if order.points_redeemed > 0 {
            self.rewards_repo
                .refund_redeemable(&mut tx, order.customer_id, order.points_redeemed)
                .await?
        } else {
            self.rewards_repo
                .get_or_create_in_tx(&mut tx, order.customer_id)
                .await?
        };
        for entry in settlement::failure_ledger(order, reward.id) {
            self.rewards_repo.append_history(&mut tx, entry).await?;
        }

        tx.commit().await?;

        tracing::warn!(order_number = %order.order_number, message, "payment failed");
        self.announce(order, OrderStatus::Cancelled, PaymentStatus::Failed)
            .await;

        Ok(CallbackOutcome {
            status: PaymentStatus::Failed,
            order_id: order.id,
            order_number: order.order_number.clone(),
            error_message: Some(message.to_string()),
        })
    }

    /// Lost a settle race; report whatever the winner recorded.
    async fn outcome_after_race(
        &self,
        gateway_ref: &str,
        order: &Order,
    ) -> Result<CallbackOutcome, PaymentError> {
        let payment = self
            .payments_repo
            .find_by_gateway_ref(gateway_ref)
            .await?
            .ok_or(PaymentError::NotFound)?;
        Ok(Self::stored_outcome(&payment, order))
    }

    fn stored_outcome(payment: &Payment, order: &Order) -> CallbackOutcome {
        CallbackOutcome {
            status: payment.status,
            order_id: order.id,
            order_number: order.order_number.clone(),
            error_message: payment.error_message.clone(),
        }
    }

    /// Refund a captured payment through the gateway, then mark the
    /// payment and order REFUNDED.
    pub async fn refund(&self, order_id: Uuid) -> Result<PaymentStatusResponse, PaymentError> {
        let payment = self
            .payments_repo
            .find_by_order(order_id)
            .await?
            .ok_or(PaymentError::NotFound)?;
        let order = self
            .orders_repo
            .find_by_id(order_id)
            .await?
            .ok_or(PaymentError::OrderNotFound)?;

        if payment.status != PaymentStatus::Captured {
            return Err(PaymentError::InvalidState(format!(
                "Only captured payments can be refunded, this one is {}",
                payment.status
            )));
        }

        self.gateway
            .refund(
                &payment.gateway_order_ref,
                payment.amount * 100,
                &payment.currency,
            )
            .await?;

        let mut tx = self.payments_repo.pool().begin().await?;
        let payment = self
            .payments_repo
            .mark_refunded(&mut tx, payment.id, &payment.gateway_order_ref)
            .await?;
        self.orders_repo
            .set_payment_outcome(
                &mut tx,
                order.id,
                OrderStatus::Refunded,
                PaymentStatus::Refunded,
            )
            .await?;
        self.orders_repo
            .append_status_history(
                &mut tx,
                order.id,
                OrderStatus::Refunded,
                Some("Payment refunded"),
                "ADMIN",
            )
            .await?;
        tx.commit().await?;

        tracing::info!(order_number = %order.order_number, "payment refunded");
        self.announce(&order, OrderStatus::Refunded, PaymentStatus::Refunded)
            .await;

        Ok(Self::status_response(&payment))
    }

    /// Status projection for mobile clients polling after the redirect.
    pub async fn get_status(&self, gateway_ref: &str) -> Result<PaymentStatusResponse, PaymentError> {
        let payment = self
            .payments_repo
            .find_by_gateway_ref(gateway_ref)
            .await?
            .ok_or(PaymentError::NotFound)?;

        Ok(Self::status_response(&payment))
    }

    fn status_response(payment: &Payment) -> PaymentStatusResponse {
        PaymentStatusResponse {
            gateway_order_ref: payment.gateway_order_ref.clone(),
            status: payment.status,
            order_number: payment.merchant_order_id.clone(),
            amount: payment.amount,
            currency: payment.currency.clone(),
            error_message: payment.error_message.clone(),
        }
    }

    async fn announce(&self, order: &Order, status: OrderStatus, payment_status: PaymentStatus) {
        if let Err(err) = self
            .push
            .notify(
                order.customer_id,
                "STATUS",
                json!({
                    "orderId": order.id,
                    "orderNumber": order.order_number,
                    "status": status,
                }),
            )
            .await
        {
            tracing::warn!(order_number = %order.order_number, error = %err, "status push failed");
        }

        if let Ok(Some(customer)) = self.orders_repo.find_customer(order.customer_id).await {
            if let Err(err) = self
                .notifier
                .send(
                    &customer.email,
                    settlement::notification_kind(payment_status),
                    json!({
                        "customerName": customer.full_name(),
                        "orderNumber": order.order_number,
                        "status": status,
                        "total": money::format_currency(order.total),
                    }),
                )
                .await
            {
                tracing::warn!(order_number = %order.order_number, error = %err, "status email failed");
            }
        }
    }
}
