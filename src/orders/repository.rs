use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::orders::error::OrderError;
use crate::orders::models::{
    Customer, NewOrder, NewOrderItem, NewOrderSnapshot, Order, OrderItem, OrderSnapshot,
    OrderStatus, OrderStatusHistory, PaymentStatus, StatusCount,
};
use crate::orders::query::OrderQueryBuilder;

/// Repository for order aggregate persistence. Methods that must compose
/// into a larger transaction take a `&mut PgConnection`; read paths go
/// straight to the pool.
#[derive(Clone)]
pub struct OrdersRepository {
    pool: PgPool,
}

const ORDER_COLUMNS: &str = "id, order_number, idempotency_key, customer_id, status, \
     payment_status, fulfillment_method, delivery_date, delivery_time_slot, \
     delivery_instructions, street_address, apartment, emirate, city, pincode, \
     pickup_date, pickup_time_slot, store_location, subtotal, delivery_charge, \
     coupon_discount, points_value, total, points_earned, points_redeemed, \
     coupon_id, is_gift, gift_message, gift_recipient_name, gift_recipient_phone, \
     admin_notes, created_at, updated_at";

impl OrdersRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert the order row inside the caller's transaction.
    pub async fn insert_order(
        &self,
        conn: &mut PgConnection,
        new_order: &NewOrder,
    ) -> Result<Order, OrderError> {
        let query = format!(
            r#"
            INSERT INTO orders (
                order_number, idempotency_key, customer_id, status, payment_status,
                fulfillment_method, delivery_date, delivery_time_slot,
                delivery_instructions, street_address, apartment, emirate, city,
                pincode, pickup_date, pickup_time_slot, store_location, subtotal,
                delivery_charge, coupon_discount, points_value, total,
                points_earned, points_redeemed, coupon_id, is_gift, gift_message,
                gift_recipient_name, gift_recipient_phone, admin_notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26,
                    $27, $28, $29, $30)
            RETURNING {ORDER_COLUMNS}
            "#
        );

        let order = sqlx::query_as::<_, Order>(&query)
            .bind(&new_order.order_number)
            .bind(&new_order.idempotency_key)
            .bind(new_order.customer_id)
            .bind(new_order.status)
            .bind(new_order.payment_status)
            .bind(new_order.fulfillment_method)
            .bind(new_order.delivery_date)
            .bind(&new_order.delivery_time_slot)
            .bind(&new_order.delivery_instructions)
            .bind(&new_order.street_address)
            .bind(&new_order.apartment)
            .bind(&new_order.emirate)
            .bind(&new_order.city)
            .bind(&new_order.pincode)
            .bind(new_order.pickup_date)
            .bind(&new_order.pickup_time_slot)
            .bind(&new_order.store_location)
            .bind(new_order.subtotal)
            .bind(new_order.delivery_charge)
            .bind(new_order.coupon_discount)
            .bind(new_order.points_value)
            .bind(new_order.total)
            .bind(new_order.points_earned)
            .bind(new_order.points_redeemed)
            .bind(new_order.coupon_id)
            .bind(new_order.is_gift)
            .bind(&new_order.gift_message)
            .bind(&new_order.gift_recipient_name)
            .bind(&new_order.gift_recipient_phone)
            .bind(&new_order.admin_notes)
            .fetch_one(&mut *conn)
            .await?;

        Ok(order)
    }

    pub async fn insert_items(
        &self,
        conn: &mut PgConnection,
        order_id: Uuid,
        items: &[NewOrderItem],
    ) -> Result<Vec<OrderItem>, OrderError> {
        let mut inserted = Vec::with_capacity(items.len());
        for item in items {
            let row = sqlx::query_as::<_, OrderItem>(
                r#"
                INSERT INTO order_items (order_id, name, variant, price, quantity, cake_writing)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING id, order_id, name, variant, price, quantity, cake_writing
                "#,
            )
            .bind(order_id)
            .bind(&item.name)
            .bind(&item.variant)
            .bind(item.price)
            .bind(item.quantity)
            .bind(&item.cake_writing)
            .fetch_one(&mut *conn)
            .await?;
            inserted.push(row);
        }
        Ok(inserted)
    }

    /// Write the immutable customer snapshot for an order. Never updated
    /// afterwards.
    pub async fn insert_snapshot(
        &self,
        conn: &mut PgConnection,
        order_id: Uuid,
        snapshot: &NewOrderSnapshot,
    ) -> Result<(), OrderError> {
        sqlx::query(
            r#"
            INSERT INTO order_snapshots (
                order_id, customer_name, customer_email, customer_phone,
                street_address, apartment, emirate, city, pincode
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(order_id)
        .bind(&snapshot.customer_name)
        .bind(&snapshot.customer_email)
        .bind(&snapshot.customer_phone)
        .bind(&snapshot.street_address)
        .bind(&snapshot.apartment)
        .bind(&snapshot.emirate)
        .bind(&snapshot.city)
        .bind(&snapshot.pincode)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Append an audit row for a status change.
    pub async fn append_status_history(
        &self,
        conn: &mut PgConnection,
        order_id: Uuid,
        status: OrderStatus,
        notes: Option<&str>,
        updated_by: &str,
    ) -> Result<(), OrderError> {
        sqlx::query(
            r#"
            INSERT INTO order_status_history (order_id, status, notes, updated_by)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(order_id)
        .bind(status)
        .bind(notes)
        .bind(updated_by)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    pub async fn update_status(
        &self,
        conn: &mut PgConnection,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<Order, OrderError> {
        let query = format!(
            r#"
            UPDATE orders
            SET status = $1, updated_at = NOW()
            WHERE id = $2
            RETURNING {ORDER_COLUMNS}
            "#
        );

        let order = sqlx::query_as::<_, Order>(&query)
            .bind(status)
            .bind(order_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or(OrderError::NotFound)?;

        Ok(order)
    }

    /// Read the order's current status and lock the row for the rest of
    /// the transaction. Settlement uses this to see a cancellation that
    /// landed after the order was first fetched.
    pub async fn status_for_update(
        &self,
        conn: &mut PgConnection,
        order_id: Uuid,
    ) -> Result<OrderStatus, OrderError> {
        let (status,): (OrderStatus,) =
            sqlx::query_as("SELECT status FROM orders WHERE id = $1 FOR UPDATE")
                .bind(order_id)
                .fetch_optional(&mut *conn)
                .await?
                .ok_or(OrderError::NotFound)?;

        Ok(status)
    }

    /// Set both the order status and the mirrored payment status in one
    /// statement, as payment reconciliation requires.
    pub async fn set_payment_outcome(
        &self,
        conn: &mut PgConnection,
        order_id: Uuid,
        status: OrderStatus,
        payment_status: PaymentStatus,
    ) -> Result<Order, OrderError> {
        let query = format!(
            r#"
            UPDATE orders
            SET status = $1, payment_status = $2, updated_at = NOW()
            WHERE id = $3
            RETURNING {ORDER_COLUMNS}
            "#
        );

        let order = sqlx::query_as::<_, Order>(&query)
            .bind(status)
            .bind(payment_status)
            .bind(order_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or(OrderError::NotFound)?;

        Ok(order)
    }

    pub async fn find_by_id(&self, order_id: Uuid) -> Result<Option<Order>, OrderError> {
        let query = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let order = sqlx::query_as::<_, Order>(&query)
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(order)
    }

    pub async fn find_by_number(&self, order_number: &str) -> Result<Option<Order>, OrderError> {
        let query = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = $1");
        let order = sqlx::query_as::<_, Order>(&query)
            .bind(order_number)
            .fetch_optional(&self.pool)
            .await?;

        Ok(order)
    }

    /// Look up a prior order for an idempotency key, scoped to the customer
    /// that supplied the key.
    pub async fn find_by_idempotency_key(
        &self,
        customer_id: Uuid,
        key: &str,
    ) -> Result<Option<Order>, OrderError> {
        let query = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE customer_id = $1 AND idempotency_key = $2"
        );
        let order = sqlx::query_as::<_, Order>(&query)
            .bind(customer_id)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(order)
    }

    pub async fn items_for(&self, order_id: Uuid) -> Result<Vec<OrderItem>, OrderError> {
        let items = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT id, order_id, name, variant, price, quantity, cake_writing
            FROM order_items
            WHERE order_id = $1
            ORDER BY id
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    pub async fn history_for(&self, order_id: Uuid) -> Result<Vec<OrderStatusHistory>, OrderError> {
        let history = sqlx::query_as::<_, OrderStatusHistory>(
            r#"
            SELECT id, order_id, status, notes, updated_by, created_at
            FROM order_status_history
            WHERE order_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(history)
    }

    pub async fn snapshot_for(&self, order_id: Uuid) -> Result<Option<OrderSnapshot>, OrderError> {
        let snapshot = sqlx::query_as::<_, OrderSnapshot>(
            r#"
            SELECT id, order_id, customer_name, customer_email, customer_phone,
                   street_address, apartment, emirate, city, pincode, created_at
            FROM order_snapshots
            WHERE order_id = $1
            "#,
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(snapshot)
    }

    pub async fn find_customer(&self, customer_id: Uuid) -> Result<Option<Customer>, OrderError> {
        let customer = sqlx::query_as::<_, Customer>(
            r#"
            SELECT id, first_name, last_name, email, phone
            FROM customers
            WHERE id = $1
            "#,
        )
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }

    /// Run a pre-built list query and its count twin. Bound values are text
    /// with in-SQL casts, see [`OrderQueryBuilder`].
    pub async fn list(&self, builder: &OrderQueryBuilder) -> Result<(Vec<Order>, i64), OrderError> {
        let (page_query, params) = builder.build();
        let mut query = sqlx::query_as::<_, Order>(&page_query);
        for param in &params {
            query = query.bind(param);
        }
        let orders = query.fetch_all(&self.pool).await?;

        let (count_query, params) = builder.build_count();
        let mut query = sqlx::query_scalar::<_, i64>(&count_query);
        for param in &params {
            query = query.bind(param);
        }
        let total = query.fetch_one(&self.pool).await?;

        Ok((orders, total))
    }

    /// Most recent orders for the CSV export, newest first, bounded.
    pub async fn export_rows(&self, limit: i64) -> Result<Vec<Order>, OrderError> {
        let query =
            format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC LIMIT $1");
        let orders = sqlx::query_as::<_, Order>(&query)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(orders)
    }

    /// Order count and collected revenue over an optional time window.
    /// Revenue only counts orders whose payment was actually captured.
    pub async fn count_and_revenue(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<(i64, i64), OrderError> {
        let row: (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(total) FILTER (WHERE payment_status = 'CAPTURED'), 0)::BIGINT
            FROM orders
            WHERE ($1::timestamptz IS NULL OR created_at >= $1)
              AND ($2::timestamptz IS NULL OR created_at <= $2)
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn status_distribution(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<StatusCount>, OrderError> {
        let counts = sqlx::query_as::<_, StatusCount>(
            r#"
            SELECT status, COUNT(*) AS count
            FROM orders
            WHERE ($1::timestamptz IS NULL OR created_at >= $1)
              AND ($2::timestamptz IS NULL OR created_at <= $2)
            GROUP BY status
            ORDER BY count DESC
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    // Repository methods are exercised against a live database through the
    // service layer; the pure parts they depend on (query building, number
    // parsing) are unit tested in their own modules.
}
