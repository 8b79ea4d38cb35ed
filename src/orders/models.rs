use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Order status enum representing the lifecycle of an order.
///
/// No transition graph is enforced between non-terminal states (admin
/// tooling re-orders fulfillment steps freely); the only hard rule is that
/// CANCELLED and REFUNDED are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Processing,
    ReadyForPickup,
    OutForDelivery,
    Delivered,
    Completed,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::ReadyForPickup => "READY_FOR_PICKUP",
            OrderStatus::OutForDelivery => "OUT_FOR_DELIVERY",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Refunded => "REFUNDED",
        }
    }

    /// Terminal statuses admit no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Refunded)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payment status mirrored onto the order from its Payment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Authorized,
    Captured,
    Failed,
    Cancelled,
    Completed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Authorized => "AUTHORIZED",
            PaymentStatus::Captured => "CAPTURED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Cancelled => "CANCELLED",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the order reaches the customer. Discriminates which address/time
/// fields on the order are populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FulfillmentMethod {
    Delivery,
    Pickup,
}

/// Domain model for the central order aggregate. All monetary fields are
/// whole currency units.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub idempotency_key: Option<String>,
    pub customer_id: Uuid,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub fulfillment_method: FulfillmentMethod,

    // Delivery fields (populated only for DELIVERY orders)
    pub delivery_date: Option<NaiveDate>,
    pub delivery_time_slot: Option<String>,
    pub delivery_instructions: Option<String>,
    pub street_address: Option<String>,
    pub apartment: Option<String>,
    pub emirate: Option<String>,
    pub city: Option<String>,
    pub pincode: Option<String>,

    // Pickup fields (populated only for PICKUP orders)
    pub pickup_date: Option<NaiveDate>,
    pub pickup_time_slot: Option<String>,
    pub store_location: Option<String>,

    // Totals: total = max(0, subtotal - coupon_discount - points_value + delivery_charge)
    pub subtotal: i64,
    pub delivery_charge: i64,
    pub coupon_discount: i64,
    pub points_value: i64,
    pub total: i64,

    // Points: earned is provisional until payment capture; redeemed was
    // debited at creation
    pub points_earned: i64,
    pub points_redeemed: i64,

    pub coupon_id: Option<Uuid>,

    pub is_gift: bool,
    pub gift_message: Option<String>,
    pub gift_recipient_name: Option<String>,
    pub gift_recipient_phone: Option<String>,

    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Line item owned by an order. The line total is always price * quantity,
/// never stored separately.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub name: String,
    pub variant: String,
    pub price: i64,
    pub quantity: i32,
    pub cake_writing: Option<String>,
}

/// Append-only audit row for a status change.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderStatusHistory {
    pub id: Uuid,
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub notes: Option<String>,
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
}

/// Immutable copy of customer and shipping data taken at order time.
/// Written once, never updated; survives later customer record changes.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderSnapshot {
    pub id: Uuid,
    pub order_id: Uuid,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub street_address: String,
    pub apartment: String,
    pub emirate: String,
    pub city: String,
    pub pincode: String,
    pub created_at: DateTime<Utc>,
}

/// Customer row as known to the order core (managed elsewhere).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Customer {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
}

impl Customer {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Fulfillment choice in a create-order request. A discriminated union:
/// each method requires its own field set, the other side's fields do not
/// exist.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "method", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FulfillmentRequest {
    #[serde(rename_all = "camelCase")]
    Delivery {
        street_address: String,
        #[serde(default)]
        apartment: Option<String>,
        emirate: String,
        #[serde(default)]
        city: Option<String>,
        #[serde(default)]
        pincode: Option<String>,
        delivery_date: NaiveDate,
        delivery_time_slot: String,
        #[serde(default)]
        delivery_instructions: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Pickup {
        store_location: String,
        pickup_date: NaiveDate,
        pickup_time_slot: String,
    },
}

impl FulfillmentRequest {
    pub fn method(&self) -> FulfillmentMethod {
        match self {
            FulfillmentRequest::Delivery { .. } => FulfillmentMethod::Delivery,
            FulfillmentRequest::Pickup { .. } => FulfillmentMethod::Pickup,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    #[validate(length(min = 1, message = "Item name is required"))]
    pub name: String,
    #[serde(default)]
    pub variant: String,
    pub price: Decimal,
    #[validate(range(min = 1, message = "Quantity must be positive"))]
    pub quantity: i32,
    #[serde(default)]
    pub cake_writing: Option<String>,
}

/// Request body for POST /api/orders.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub idempotency_key: Option<String>,
    #[validate(length(min = 1, message = "Order must contain at least one item"))]
    pub items: Vec<OrderItemRequest>,
    pub subtotal: Decimal,
    pub fulfillment: FulfillmentRequest,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0, message = "Points redeemed cannot be negative"))]
    pub points_redeemed: i64,
    #[serde(default)]
    pub is_gift: bool,
    #[serde(default)]
    pub gift_message: Option<String>,
    #[serde(default)]
    pub gift_recipient_name: Option<String>,
    #[serde(default)]
    pub gift_recipient_phone: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Fields for a new order row. The id and timestamps are assigned by the
/// database on insert.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: String,
    pub idempotency_key: Option<String>,
    pub customer_id: Uuid,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub fulfillment_method: FulfillmentMethod,
    pub delivery_date: Option<NaiveDate>,
    pub delivery_time_slot: Option<String>,
    pub delivery_instructions: Option<String>,
    pub street_address: Option<String>,
    pub apartment: Option<String>,
    pub emirate: Option<String>,
    pub city: Option<String>,
    pub pincode: Option<String>,
    pub pickup_date: Option<NaiveDate>,
    pub pickup_time_slot: Option<String>,
    pub store_location: Option<String>,
    pub subtotal: i64,
    pub delivery_charge: i64,
    pub coupon_discount: i64,
    pub points_value: i64,
    pub total: i64,
    pub points_earned: i64,
    pub points_redeemed: i64,
    pub coupon_id: Option<Uuid>,
    pub is_gift: bool,
    pub gift_message: Option<String>,
    pub gift_recipient_name: Option<String>,
    pub gift_recipient_phone: Option<String>,
    pub admin_notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub name: String,
    pub variant: String,
    pub price: i64,
    pub quantity: i32,
    pub cake_writing: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewOrderSnapshot {
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub street_address: String,
    pub apartment: String,
    pub emirate: String,
    pub city: String,
    pub pincode: String,
}

/// Request body for PATCH /api/orders/{id}/status.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Order with its owned collections, as returned by the API.
#[derive(Debug, Serialize)]
pub struct OrderResponse {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub status_history: Vec<OrderStatusHistory>,
}

/// Query parameters for the order list.
#[derive(Debug, Deserialize)]
pub struct OrderListQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub status: Option<OrderStatus>,
    pub search: Option<String>,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    10
}

/// Optional time window for the analytics endpoint. Missing bounds leave
/// that side of the range open.
#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct OrderListResponse {
    pub results: Vec<OrderResponse>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

/// Aggregates for the admin dashboard.
#[derive(Debug, Serialize)]
pub struct OrderAnalytics {
    pub total_orders: i64,
    pub revenue: i64,
    pub by_status: Vec<StatusCount>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Refunded.is_terminal());
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::Completed.is_terminal());
        assert!(!OrderStatus::Delivered.is_terminal());
    }

    #[test]
    fn test_order_status_wire_format() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::ReadyForPickup).unwrap(),
            "\"READY_FOR_PICKUP\""
        );
        let parsed: OrderStatus = serde_json::from_str("\"OUT_FOR_DELIVERY\"").unwrap();
        assert_eq!(parsed, OrderStatus::OutForDelivery);
    }

    #[test]
    fn test_fulfillment_is_discriminated() {
        let delivery: FulfillmentRequest = serde_json::from_str(
            r#"{
                "method": "DELIVERY",
                "streetAddress": "12 Marina Walk",
                "emirate": "DUBAI",
                "deliveryDate": "2025-09-01",
                "deliveryTimeSlot": "10:00-12:00"
            }"#,
        )
        .unwrap();
        assert_eq!(delivery.method(), FulfillmentMethod::Delivery);

        // Pickup payloads must not be parseable without the pickup fields
        let missing_store: Result<FulfillmentRequest, _> = serde_json::from_str(
            r#"{"method": "PICKUP", "pickupDate": "2025-09-01"}"#,
        );
        assert!(missing_store.is_err());
    }

    #[test]
    fn test_analytics_window_defaults_open() {
        let query: AnalyticsQuery = serde_json::from_str("{}").unwrap();
        assert!(query.from.is_none());
        assert!(query.to.is_none());

        let bounded: AnalyticsQuery =
            serde_json::from_str(r#"{"from": "2025-08-01T00:00:00Z"}"#).unwrap();
        assert!(bounded.from.is_some());
        assert!(bounded.to.is_none());
    }

    #[test]
    fn test_create_order_request_requires_items() {
        let request = CreateOrderRequest {
            idempotency_key: None,
            items: vec![],
            subtotal: Decimal::from(100),
            fulfillment: FulfillmentRequest::Pickup {
                store_location: "Jumeirah 1".to_string(),
                pickup_date: NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
                pickup_time_slot: "14:00-16:00".to_string(),
            },
            coupon_code: None,
            points_redeemed: 0,
            is_gift: false,
            gift_message: None,
            gift_recipient_name: None,
            gift_recipient_phone: None,
            notes: None,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_customer_full_name_trims() {
        let customer = Customer {
            id: Uuid::new_v4(),
            first_name: "Amal".to_string(),
            last_name: "".to_string(),
            email: "amal@example.com".to_string(),
            phone: None,
        };
        assert_eq!(customer.full_name(), "Amal");
    }
}
