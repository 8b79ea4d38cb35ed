use serde_json::Value;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::orders::models::PaymentStatus;
use crate::payments::error::PaymentError;
use crate::payments::models::Payment;

const PAYMENT_COLUMNS: &str = "id, order_id, merchant_order_id, gateway_order_ref, amount, \
     currency, status, gateway_response, error_message, refund_reference, refunded_at, \
     created_at, updated_at";

/// Repository for payment records.
#[derive(Clone)]
pub struct PaymentsRepository {
    pool: PgPool,
}

impl PaymentsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Record a freshly opened gateway session as a PENDING payment.
    pub async fn insert(
        &self,
        order_id: Uuid,
        merchant_order_id: &str,
        gateway_order_ref: &str,
        amount: i64,
        currency: &str,
    ) -> Result<Payment, PaymentError> {
        let query = format!(
            r#"
            INSERT INTO payments (order_id, merchant_order_id, gateway_order_ref, amount, currency, status)
            VALUES ($1, $2, $3, $4, $5, 'PENDING')
            RETURNING {PAYMENT_COLUMNS}
            "#
        );

        let payment = sqlx::query_as::<_, Payment>(&query)
            .bind(order_id)
            .bind(merchant_order_id)
            .bind(gateway_order_ref)
            .bind(amount)
            .bind(currency)
            .fetch_one(&self.pool)
            .await?;

        Ok(payment)
    }

    pub async fn find_by_gateway_ref(
        &self,
        gateway_ref: &str,
    ) -> Result<Option<Payment>, PaymentError> {
        let query = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE gateway_order_ref = $1");
        let payment = sqlx::query_as::<_, Payment>(&query)
            .bind(gateway_ref)
            .fetch_optional(&self.pool)
            .await?;

        Ok(payment)
    }

    pub async fn find_by_order(&self, order_id: Uuid) -> Result<Option<Payment>, PaymentError> {
        let query = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1 ORDER BY created_at DESC LIMIT 1"
        );
        let payment = sqlx::query_as::<_, Payment>(&query)
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(payment)
    }

    /// Record the reconciled outcome, but only if the payment is still
    /// PENDING. Returns `None` when another reconciliation already settled
    /// it, which makes duplicate callbacks no-ops.
    pub async fn settle_if_pending(
        &self,
        conn: &mut PgConnection,
        payment_id: Uuid,
        status: PaymentStatus,
        gateway_response: &Value,
        error_message: Option<&str>,
    ) -> Result<Option<Payment>, PaymentError> {
        let query = format!(
            r#"
            UPDATE payments
            SET status = $2, gateway_response = $3, error_message = $4, updated_at = NOW()
            WHERE id = $1 AND status = 'PENDING'
            RETURNING {PAYMENT_COLUMNS}
            "#
        );

        let payment = sqlx::query_as::<_, Payment>(&query)
            .bind(payment_id)
            .bind(status)
            .bind(gateway_response)
            .bind(error_message)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(payment)
    }

    /// Mark a captured payment as refunded.
    pub async fn mark_refunded(
        &self,
        conn: &mut PgConnection,
        payment_id: Uuid,
        refund_reference: &str,
    ) -> Result<Payment, PaymentError> {
        let query = format!(
            r#"
            UPDATE payments
            SET status = 'REFUNDED', refund_reference = $2, refunded_at = NOW(), updated_at = NOW()
            WHERE id = $1
            RETURNING {PAYMENT_COLUMNS}
            "#
        );

        let payment = sqlx::query_as::<_, Payment>(&query)
            .bind(payment_id)
            .bind(refund_reference)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or(PaymentError::NotFound)?;

        Ok(payment)
    }
}
