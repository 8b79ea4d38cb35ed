// Human-readable order number allocation
//
// Numbers look like ORD-2508-0042: a YYMM month marker plus a 4-digit
// sequence that restarts every calendar month. The next value is computed
// from existing rows inside the caller's transaction; a UNIQUE constraint
// on order_number plus a bounded retry loop with randomized backoff covers
// the race where two checkouts compute the same candidate.

use chrono::{DateTime, Datelike, Utc};
use rand::Rng;
use sqlx::PgConnection;
use std::time::Duration;

use crate::orders::error::OrderError;

/// Attempts before giving up on a free number.
pub const MAX_ATTEMPTS: u32 = 5;

/// Month prefix for an order number, e.g. "ORD-2508-".
pub fn month_prefix(now: DateTime<Utc>) -> String {
    format!("ORD-{:02}{:02}-", now.year() % 100, now.month())
}

/// Format a full order number from a prefix and sequence.
pub fn format_number(prefix: &str, sequence: i64) -> String {
    format!("{}{:04}", prefix, sequence)
}

/// Extract the sequence from an order number; `None` if malformed.
pub fn parse_sequence(order_number: &str) -> Option<i64> {
    order_number.rsplit('-').next()?.parse().ok()
}

/// Compute the next order number for the current month within the caller's
/// transaction: highest existing number under this month's prefix, plus
/// one. Two concurrent transactions can compute the same candidate; the
/// unique index on order_number decides the race at insert time.
pub async fn next_in_tx(
    conn: &mut PgConnection,
    now: DateTime<Utc>,
) -> Result<String, OrderError> {
    let prefix = month_prefix(now);

    let latest: Option<String> = sqlx::query_scalar(
        r#"
        SELECT order_number FROM orders
        WHERE order_number LIKE $1 || '%'
        ORDER BY order_number DESC
        LIMIT 1
        "#,
    )
    .bind(&prefix)
    .fetch_optional(&mut *conn)
    .await?;

    let sequence = match latest.as_deref().and_then(parse_sequence) {
        Some(last) => last + 1,
        None => 1,
    };

    Ok(format_number(&prefix, sequence))
}

/// Randomized backoff before retrying a collided allocation (up to 100ms).
pub fn retry_backoff() -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(0..100))
}

/// Whether an error is the unique-constraint violation raised when two
/// transactions inserted the same order number.
pub fn is_number_collision(err: &OrderError) -> bool {
    matches!(err, OrderError::DatabaseError(msg) if msg.contains("orders_order_number_key"))
}

/// Whether an error is the unique-constraint violation on the customer's
/// idempotency key, meaning a duplicate submission already created this
/// order.
pub fn is_idempotency_conflict(err: &OrderError) -> bool {
    matches!(err, OrderError::DatabaseError(msg) if msg.contains("orders_customer_idempotency_key"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_month_prefix_format() {
        let date = Utc.with_ymd_and_hms(2025, 8, 26, 12, 0, 0).unwrap();
        assert_eq!(month_prefix(date), "ORD-2508-");

        let january = Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap();
        assert_eq!(month_prefix(january), "ORD-2601-");
    }

    #[test]
    fn test_format_number_zero_pads() {
        assert_eq!(format_number("ORD-2508-", 1), "ORD-2508-0001");
        assert_eq!(format_number("ORD-2508-", 42), "ORD-2508-0042");
        assert_eq!(format_number("ORD-2508-", 12345), "ORD-2508-12345");
    }

    #[test]
    fn test_parse_sequence() {
        assert_eq!(parse_sequence("ORD-2508-0042"), Some(42));
        assert_eq!(parse_sequence("ORD-2508-9999"), Some(9999));
        assert_eq!(parse_sequence("garbage"), None);
        assert_eq!(parse_sequence("ORD-2508-"), None);
    }

    #[test]
    fn test_round_trip_is_ordered_within_month() {
        // lexical ordering of the padded form matches numeric ordering,
        // which the MAX-by-ORDER-BY query relies on
        let a = format_number("ORD-2508-", 7);
        let b = format_number("ORD-2508-", 1234);
        assert!(a < b);
        assert_eq!(parse_sequence(&b), Some(1234));
    }

    #[test]
    fn test_backoff_is_bounded() {
        for _ in 0..100 {
            assert!(retry_backoff() < Duration::from_millis(100));
        }
    }
}
