use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::orders::models::PaymentStatus;

/// Payment record tracking one gateway session for an order.
///
/// `merchant_order_id` is our order number (sent to the gateway as the
/// merchant reference); `gateway_order_ref` is the gateway's own id for
/// the hosted-payment session.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub merchant_order_id: String,
    pub gateway_order_ref: String,
    pub amount: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub gateway_response: Option<Value>,
    pub error_message: Option<String>,
    pub refund_reference: Option<String>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Which client is paying; decides the redirect URLs the gateway gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentChannel {
    Web,
    Mobile,
}

/// Request body for POST /api/payments.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    pub order_id: Uuid,
    #[serde(default = "default_channel")]
    pub channel: PaymentChannel,
}

fn default_channel() -> PaymentChannel {
    PaymentChannel::Web
}

/// The hosted-payment-page session handed back to the client.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentResponse {
    pub payment_id: Uuid,
    pub gateway_order_ref: String,
    pub payment_url: String,
}

/// Query string the gateway appends when redirecting the shopper back.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    #[serde(rename = "ref")]
    pub gateway_ref: Option<String>,
    #[serde(default)]
    pub cancelled: bool,
}

/// Result of reconciling one gateway session against its order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackOutcome {
    pub status: PaymentStatus,
    pub order_id: Uuid,
    pub order_number: String,
    pub error_message: Option<String>,
}

impl CallbackOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == PaymentStatus::Captured
    }
}

/// Status projection for the polling endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusResponse {
    pub gateway_order_ref: String,
    pub status: PaymentStatus,
    pub order_number: String,
    pub amount: i64,
    pub currency: String,
    pub error_message: Option<String>,
}
