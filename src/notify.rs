// Outbound notification abstractions
//
// Email and live-push delivery are external collaborators. The order and
// payment services only depend on these traits; failures are caught and
// logged by the caller, never propagated, because an order must survive a
// broken email provider.

use axum::async_trait;
use serde_json::Value;
use uuid::Uuid;

/// Templated customer notifications (order confirmation, status updates).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    OrderConfirmation,
    OrderStatusUpdate,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::OrderConfirmation => "order_confirmation",
            NotificationKind::OrderStatusUpdate => "order_status_update",
        }
    }
}

/// Fire-and-forget notification sender.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        recipient: &str,
        kind: NotificationKind,
        context: Value,
    ) -> Result<(), NotifyError>;
}

/// Best-effort live order event push, keyed by customer id.
#[async_trait]
pub trait OrderPush: Send + Sync {
    async fn notify(&self, customer_id: Uuid, event: &str, payload: Value)
        -> Result<(), NotifyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Notification delivery failed: {0}")]
    DeliveryFailed(String),
}

/// Default implementation that records notifications in the log stream.
///
/// Stands in for the real email/WebSocket transports, which live outside
/// this service.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(
        &self,
        recipient: &str,
        kind: NotificationKind,
        context: Value,
    ) -> Result<(), NotifyError> {
        tracing::info!(
            recipient,
            kind = kind.as_str(),
            %context,
            "notification dispatched"
        );
        Ok(())
    }
}

#[async_trait]
impl OrderPush for LogNotifier {
    async fn notify(
        &self,
        customer_id: Uuid,
        event: &str,
        payload: Value,
    ) -> Result<(), NotifyError> {
        tracing::info!(%customer_id, event, %payload, "order push dispatched");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_notifier_always_succeeds() {
        let notifier = LogNotifier;
        let result = notifier
            .send(
                "test@example.com",
                NotificationKind::OrderConfirmation,
                serde_json::json!({"orderNumber": "ORD-2508-0001"}),
            )
            .await;
        assert!(result.is_ok());
    }

    #[test]
    fn test_notification_kind_names() {
        assert_eq!(
            NotificationKind::OrderConfirmation.as_str(),
            "order_confirmation"
        );
        assert_eq!(
            NotificationKind::OrderStatusUpdate.as_str(),
            "order_status_update"
        );
    }
}
