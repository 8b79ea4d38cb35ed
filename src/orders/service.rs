use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::config::DeliveryCharges;
use crate::coupons::{CouponResolution, CouponResolver};
use crate::money;
use crate::notify::{NotificationKind, Notifier, OrderPush};
use crate::orders::error::OrderError;
use crate::orders::models::{
    AnalyticsQuery, CreateOrderRequest, Customer, FulfillmentRequest, NewOrder, NewOrderItem,
    NewOrderSnapshot, Order, OrderAnalytics, OrderListQuery, OrderListResponse, OrderResponse,
    OrderSnapshot, OrderStatus, Pagination, PaymentStatus,
};
use crate::orders::number;
use crate::orders::pricing;
use crate::orders::query::OrderQueryBuilder;
use crate::orders::repository::OrdersRepository;
use crate::rewards::engine;
use crate::rewards::models::{NewRewardHistory, RewardAction};
use crate::rewards::repository::RewardsRepository;

/// Who asked for an order mutation. Customers can only touch their own
/// PENDING orders; admins can act on any order.
#[derive(Debug, Clone, Copy)]
pub enum Actor {
    Customer(Uuid),
    Admin,
}

impl Actor {
    fn label(&self) -> &'static str {
        match self {
            Actor::Customer(_) => "CUSTOMER",
            Actor::Admin => "ADMIN",
        }
    }
}

/// Orchestrates the order lifecycle: creation with pricing, coupons and
/// point redemption in one transaction, status transitions, cancellation
/// with point refunds, and admin reporting.
#[derive(Clone)]
pub struct OrderService {
    orders_repo: OrdersRepository,
    rewards_repo: RewardsRepository,
    coupon_resolver: CouponResolver,
    delivery_charges: DeliveryCharges,
    notifier: Arc<dyn Notifier>,
    push: Arc<dyn OrderPush>,
}

impl OrderService {
    pub fn new(
        orders_repo: OrdersRepository,
        rewards_repo: RewardsRepository,
        coupon_resolver: CouponResolver,
        delivery_charges: DeliveryCharges,
        notifier: Arc<dyn Notifier>,
        push: Arc<dyn OrderPush>,
    ) -> Self {
        Self {
            orders_repo,
            rewards_repo,
            coupon_resolver,
            delivery_charges,
            notifier,
            push,
        }
    }

    /// Create a new order for the authenticated customer.
    ///
    /// The whole mutation runs in one transaction per attempt: order number
    /// allocation, the order and item rows, the customer snapshot, coupon
    /// usage, and the point debit with its ledger entry. A lost race on the
    /// order number rolls everything back and retries with fresh numbering;
    /// a duplicate idempotency key returns the order the first submission
    /// created.
    pub async fn create_order(
        &self,
        customer_id: Uuid,
        request: CreateOrderRequest,
    ) -> Result<OrderResponse, OrderError> {
        request.validate()?;
        for item in &request.items {
            item.validate()?;
        }

        if let Some(key) = request.idempotency_key.as_deref() {
            if let Some(existing) = self
                .orders_repo
                .find_by_idempotency_key(customer_id, key)
                .await?
            {
                tracing::info!(order_number = %existing.order_number, "duplicate submission, returning existing order");
                return self.assemble(existing).await;
            }
        }

        let customer = self
            .orders_repo
            .find_customer(customer_id)
            .await?
            .ok_or(OrderError::CustomerNotFound)?;

        let reward = self.rewards_repo.get_or_create(customer_id).await?;
        if request.points_redeemed > reward.points {
            return Err(OrderError::InsufficientPoints {
                requested: request.points_redeemed,
                available: reward.points,
            });
        }

        let subtotal = money::floor_units(request.subtotal);
        let delivery_charge = match &request.fulfillment {
            FulfillmentRequest::Delivery { emirate, .. } => {
                self.delivery_charges.for_emirate(emirate)
            }
            FulfillmentRequest::Pickup { .. } => 0,
        };

        // An invalid coupon never fails checkout; the order proceeds
        // without the discount.
        let (coupon, coupon_discount) = match request.coupon_code.as_deref() {
            Some(code) => match self.coupon_resolver.resolve(code, subtotal).await? {
                CouponResolution::Applied { coupon, discount } => (Some(coupon), discount),
                CouponResolution::Rejected(rejection) => {
                    tracing::info!(code, reason = %rejection.message(), "coupon rejected at checkout");
                    (None, 0)
                }
            },
            None => (None, 0),
        };

        let breakdown = pricing::price_order(
            subtotal,
            delivery_charge,
            coupon_discount,
            request.points_redeemed,
        );

        // Earning rate comes from the tier held before this order.
        let points_earned = engine::points_earned(breakdown.total, reward.total_points);

        let items: Vec<NewOrderItem> = request
            .items
            .iter()
            .map(|item| NewOrderItem {
                name: item.name.clone(),
                variant: item.variant.clone(),
                price: money::floor_units(item.price),
                quantity: item.quantity,
                cake_writing: item.cake_writing.clone(),
            })
            .collect();

        let mut last_err = None;
        for attempt in 1..=number::MAX_ATTEMPTS {
            match self
                .try_create(
                    &customer,
                    &request,
                    &items,
                    &breakdown,
                    points_earned,
                    coupon.as_ref().map(|c| c.id),
                )
                .await
            {
                Ok((order, inserted_items)) => {
                    self.announce_created(&customer, &order).await;
                    let status_history = self.orders_repo.history_for(order.id).await?;
                    return Ok(OrderResponse {
                        order,
                        items: inserted_items,
                        status_history,
                    });
                }
                Err(err) if number::is_number_collision(&err) => {
                    tracing::warn!(attempt, "order number collision, retrying");
                    tokio::time::sleep(number::retry_backoff()).await;
                    last_err = Some(err);
                }
                Err(err) if number::is_idempotency_conflict(&err) => {
                    // A concurrent duplicate won the race; hand back its order.
                    if let Some(key) = request.idempotency_key.as_deref() {
                        if let Some(existing) = self
                            .orders_repo
                            .find_by_idempotency_key(customer_id, key)
                            .await?
                        {
                            return self.assemble(existing).await;
                        }
                    }
                    return Err(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_err.unwrap_or(OrderError::OrderNumberExhausted(number::MAX_ATTEMPTS)))
    }

    /// One transactional creation attempt.
    async fn try_create(
        &self,
        customer: &Customer,
        request: &CreateOrderRequest,
        items: &[NewOrderItem],
        breakdown: &pricing::PriceBreakdown,
        points_earned: i64,
        coupon_id: Option<Uuid>,
    ) -> Result<(Order, Vec<crate::orders::models::OrderItem>), OrderError> {
        let mut tx = self.orders_repo.pool().begin().await?;

        let order_number = number::next_in_tx(&mut tx, Utc::now()).await?;

        let new_order = self.build_new_order(
            customer.id,
            order_number,
            request,
            breakdown,
            points_earned,
            coupon_id,
        );
        let order = self.orders_repo.insert_order(&mut tx, &new_order).await?;
        let inserted_items = self.orders_repo.insert_items(&mut tx, order.id, items).await?;

        if let Some(coupon_id) = coupon_id {
            self.coupon_resolver
                .record_usage(
                    &mut tx,
                    coupon_id,
                    order.id,
                    customer.id,
                    breakdown.coupon_discount,
                )
                .await?;
        }

        self.orders_repo
            .insert_snapshot(&mut tx, order.id, &self.build_snapshot(customer, request))
            .await?;

        if request.points_redeemed > 0 {
            let reward = self
                .rewards_repo
                .debit_checkout(&mut tx, customer.id, request.points_redeemed)
                .await?
                .ok_or(OrderError::InsufficientPoints {
                    requested: request.points_redeemed,
                    available: 0,
                })?;

            self.rewards_repo
                .append_history(
                    &mut tx,
                    NewRewardHistory {
                        customer_id: customer.id,
                        reward_id: reward.id,
                        order_id: Some(order.id),
                        points_earned: 0,
                        points_redeemed: request.points_redeemed,
                        order_total: order.total,
                        action: RewardAction::Redeemed,
                        description: format!(
                            "Redeemed {} points for {} discount on order {}",
                            request.points_redeemed,
                            money::format_currency(breakdown.points_value),
                            order.order_number
                        ),
                    },
                )
                .await?;
        }

        self.orders_repo
            .append_status_history(
                &mut tx,
                order.id,
                OrderStatus::Pending,
                Some("Order placed"),
                "CUSTOMER",
            )
            .await?;

        tx.commit().await?;

        Ok((order, inserted_items))
    }

    fn build_new_order(
        &self,
        customer_id: Uuid,
        order_number: String,
        request: &CreateOrderRequest,
        breakdown: &pricing::PriceBreakdown,
        points_earned: i64,
        coupon_id: Option<Uuid>,
    ) -> NewOrder {
        let mut new_order = NewOrder {
            order_number,
            idempotency_key: request.idempotency_key.clone(),
            customer_id,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            fulfillment_method: request.fulfillment.method(),
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
            store_location: None,
            subtotal: breakdown.subtotal,
            delivery_charge: breakdown.delivery_charge,
            coupon_discount: breakdown.coupon_discount,
            points_value: breakdown.points_value,
            total: breakdown.total,
            points_earned,
            points_redeemed: request.points_redeemed,
            coupon_id,
            is_gift: request.is_gift,
            gift_message: request.gift_message.clone(),
            gift_recipient_name: request.gift_recipient_name.clone(),
            gift_recipient_phone: request.gift_recipient_phone.clone(),
            admin_notes: request.notes.clone(),
        };

        match &request.fulfillment {
            FulfillmentRequest::Delivery {
                street_address,
                apartment,
                emirate,
                city,
                pincode,
                delivery_date,
                delivery_time_slot,
                delivery_instructions,
            } => {
                new_order.street_address = Some(street_address.clone());
                new_order.apartment = apartment.clone();
                new_order.emirate = Some(emirate.clone());
                new_order.city = city.clone();
                new_order.pincode = pincode.clone();
                new_order.delivery_date = Some(*delivery_date);
                new_order.delivery_time_slot = Some(delivery_time_slot.clone());
                new_order.delivery_instructions = delivery_instructions.clone();
            }
            FulfillmentRequest::Pickup {
                store_location,
                pickup_date,
                pickup_time_slot,
            } => {
                new_order.store_location = Some(store_location.clone());
                new_order.pickup_date = Some(*pickup_date);
                new_order.pickup_time_slot = Some(pickup_time_slot.clone());
            }
        }

        new_order
    }

    fn build_snapshot(&self, customer: &Customer, request: &CreateOrderRequest) -> NewOrderSnapshot {
        let (street_address, apartment, emirate, city, pincode) = match &request.fulfillment {
            FulfillmentRequest::Delivery {
                street_address,
                apartment,
                emirate,
                city,
                pincode,
                ..
            } => (
                street_address.clone(),
                apartment.clone().unwrap_or_default(),
                emirate.clone(),
                city.clone().unwrap_or_default(),
                pincode.clone().unwrap_or_default(),
            ),
            FulfillmentRequest::Pickup { .. } => Default::default(),
        };

        NewOrderSnapshot {
            customer_name: customer.full_name(),
            customer_email: customer.email.clone(),
            customer_phone: customer.phone.clone().unwrap_or_default(),
            street_address,
            apartment,
            emirate,
            city,
            pincode,
        }
    }

    /// Best-effort confirmation email and live push. Failures are logged
    /// and swallowed; the order already committed.
    async fn announce_created(&self, customer: &Customer, order: &Order) {
        if let Err(err) = self
            .push
            .notify(
                customer.id,
                "NEW",
                json!({
                    "orderId": order.id,
                    "orderNumber": order.order_number,
                    "total": order.total,
                    "status": order.status,
                }),
            )
            .await
        {
            tracing::warn!(order_number = %order.order_number, error = %err, "order push failed");
        }

        if let Err(err) = self
            .notifier
            .send(
                &customer.email,
                NotificationKind::OrderConfirmation,
                json!({
                    "customerName": customer.full_name(),
                    "orderNumber": order.order_number,
                    "total": money::format_currency(order.total),
                    "pointsEarned": order.points_earned,
                }),
            )
            .await
        {
            tracing::warn!(order_number = %order.order_number, error = %err, "confirmation email failed");
        }
    }

    /// Move an order to a new status, appending the audit row. Terminal
    /// orders reject any transition.
    pub async fn update_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
        notes: Option<String>,
        actor: Actor,
    ) -> Result<OrderResponse, OrderError> {
        let order = self
            .orders_repo
            .find_by_id(order_id)
            .await?
            .ok_or(OrderError::NotFound)?;

        if order.status.is_terminal() {
            return Err(OrderError::TerminalStatus(order.status.to_string()));
        }

        let mut tx = self.orders_repo.pool().begin().await?;
        let updated = self
            .orders_repo
            .update_status(&mut tx, order_id, new_status)
            .await?;
        self.orders_repo
            .append_status_history(&mut tx, order_id, new_status, notes.as_deref(), actor.label())
            .await?;
        tx.commit().await?;

        self.announce_status(&updated).await;
        self.assemble(updated).await
    }

    /// Cancel an order, refunding any redeemed points to the customer's
    /// spendable balance. Customers can only cancel their own orders and
    /// only while they are still PENDING.
    pub async fn cancel_order(
        &self,
        order_id: Uuid,
        actor: Actor,
    ) -> Result<OrderResponse, OrderError> {
        let order = self
            .orders_repo
            .find_by_id(order_id)
            .await?
            .ok_or(OrderError::NotFound)?;

        match actor {
            Actor::Customer(customer_id) => {
                if order.customer_id != customer_id {
                    return Err(OrderError::NotFound);
                }
                if order.status != OrderStatus::Pending {
                    return Err(OrderError::Forbidden(
                        "Only pending orders can be cancelled".to_string(),
                    ));
                }
            }
            Actor::Admin => {
                if order.status.is_terminal() {
                    return Err(OrderError::TerminalStatus(order.status.to_string()));
                }
            }
        }

        let mut tx = self.orders_repo.pool().begin().await?;
        let cancelled = self
            .orders_repo
            .update_status(&mut tx, order_id, OrderStatus::Cancelled)
            .await?;
        self.orders_repo
            .append_status_history(
                &mut tx,
                order_id,
                OrderStatus::Cancelled,
                Some("Order cancelled"),
                actor.label(),
            )
            .await?;

        // Redeemed points go back to the spendable balance only; lifetime
        // points and tier are untouched, and nothing was ever earned for a
        // cancelled order.
        if order.points_redeemed > 0 {
            let reward = self
                .rewards_repo
                .refund_redeemable(&mut tx, order.customer_id, order.points_redeemed)
                .await?;
            self.rewards_repo
                .append_history(
                    &mut tx,
                    NewRewardHistory {
                        customer_id: order.customer_id,
                        reward_id: reward.id,
                        order_id: Some(order.id),
                        points_earned: order.points_redeemed,
                        points_redeemed: 0,
                        order_total: order.total,
                        action: RewardAction::Earned,
                        description: format!(
                            "Refunded {} points from cancelled order {}",
                            order.points_redeemed, order.order_number
                        ),
                    },
                )
                .await?;
        }

        tx.commit().await?;

        self.announce_status(&cancelled).await;
        self.assemble(cancelled).await
    }

    async fn announce_status(&self, order: &Order) {
        if let Err(err) = self
            .push
            .notify(
                order.customer_id,
                "STATUS",
                json!({
                    "orderId": order.id,
                    "orderNumber": order.order_number,
                    "status": order.status,
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
                    NotificationKind::OrderStatusUpdate,
                    json!({
                        "customerName": customer.full_name(),
                        "orderNumber": order.order_number,
                        "status": order.status,
                    }),
                )
                .await
            {
                tracing::warn!(order_number = %order.order_number, error = %err, "status email failed");
            }
        }
    }

    /// Fetch one order with its items and history. Customers only see
    /// their own orders.
    pub async fn get_order(&self, order_id: Uuid, actor: Actor) -> Result<OrderResponse, OrderError> {
        let order = self
            .orders_repo
            .find_by_id(order_id)
            .await?
            .ok_or(OrderError::NotFound)?;

        if let Actor::Customer(customer_id) = actor {
            if order.customer_id != customer_id {
                return Err(OrderError::NotFound);
            }
        }

        self.assemble(order).await
    }

    /// Paginated order list. Customer actors are scoped to their own
    /// orders; admins see everything and can search by order number.
    pub async fn list_orders(
        &self,
        query: OrderListQuery,
        actor: Actor,
    ) -> Result<OrderListResponse, OrderError> {
        let mut builder = OrderQueryBuilder::new();
        if let Actor::Customer(customer_id) = actor {
            builder.scope_to_customer(customer_id);
        }
        if let Some(status) = query.status {
            builder.add_status_filter(status);
        }
        if let Some(search) = query.search.as_deref() {
            let trimmed = search.trim();
            if !trimmed.is_empty() {
                builder.add_search_filter(trimmed);
            }
        }
        builder.set_pagination(query.page, query.limit);

        let (orders, total) = self.orders_repo.list(&builder).await?;

        let mut results = Vec::with_capacity(orders.len());
        for order in orders {
            results.push(self.assemble(order).await?);
        }

        Ok(OrderListResponse {
            results,
            pagination: Pagination {
                total,
                page: query.page.max(1),
                limit: query.limit.clamp(1, 100),
            },
        })
    }

    pub async fn get_snapshot(&self, order_id: Uuid) -> Result<OrderSnapshot, OrderError> {
        self.orders_repo
            .find_by_id(order_id)
            .await?
            .ok_or(OrderError::NotFound)?;
        self.orders_repo
            .snapshot_for(order_id)
            .await?
            .ok_or(OrderError::NotFound)
    }

    pub async fn analytics(&self, window: AnalyticsQuery) -> Result<OrderAnalytics, OrderError> {
        let (total_orders, revenue) = self
            .orders_repo
            .count_and_revenue(window.from, window.to)
            .await?;
        let by_status = self
            .orders_repo
            .status_distribution(window.from, window.to)
            .await?;

        Ok(OrderAnalytics {
            total_orders,
            revenue,
            by_status,
        })
    }

    /// CSV export of recent orders for back-office spreadsheets.
    pub async fn export_csv(&self) -> Result<String, OrderError> {
        let orders = self.orders_repo.export_rows(1000).await?;

        let mut csv = String::from(
            "order_number,customer_id,status,payment_status,fulfillment_method,subtotal,delivery_charge,coupon_discount,points_value,total,points_earned,points_redeemed,created_at\n",
        );
        for order in orders {
            csv.push_str(&format!(
                "{},{},{},{},{:?},{},{},{},{},{},{},{},{}\n",
                order.order_number,
                order.customer_id,
                order.status,
                order.payment_status,
                order.fulfillment_method,
                order.subtotal,
                order.delivery_charge,
                order.coupon_discount,
                order.points_value,
                order.total,
                order.points_earned,
                order.points_redeemed,
                order.created_at.to_rfc3339(),
            ));
        }

        Ok(csv)
    }

    async fn assemble(&self, order: Order) -> Result<OrderResponse, OrderError> {
        let items = self.orders_repo.items_for(order.id).await?;
        let status_history = self.orders_repo.history_for(order.id).await?;
        Ok(OrderResponse {
            order,
            items,
            status_history,
        })
    }
}
