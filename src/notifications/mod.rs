//! Buyer-facing notifications.
//!
//! Delivery (email, SMS) belongs to a separate service. The workflow only
//! hands over "something happened to this order" once state is durable, and
//! never fails because of it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::events::{Event, EventSender};

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("notification channel unavailable: {0}")]
    Unavailable(String),
}

/// What the buyer is told about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrderNotice {
    /// One notice per cancellation, sent once the refund attempt has settled
    Cancelled { reason: String, refund: RefundNotice },
    /// A refund that was left pending went through on retry
    Refunded { refund_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RefundNotice {
    NotRequired,
    Issued { refund_id: String },
    Pending { refund_id: String },
}

#[async_trait]
pub trait OrderNotifier: Send + Sync {
    async fn notify(&self, order_id: Uuid, notice: OrderNotice) -> Result<(), NotificationError>;
}

/// Publishes notices onto the in-process event bus for the delivery service.
#[derive(Debug, Clone)]
pub struct EventNotifier {
    events: EventSender,
}

impl EventNotifier {
    pub fn new(events: EventSender) -> Self {
        Self { events }
    }
}

#[async_trait]
impl OrderNotifier for EventNotifier {
    async fn notify(&self, order_id: Uuid, notice: OrderNotice) -> Result<(), NotificationError> {
        self.events
            .send(Event::NotificationRequested { order_id, notice })
            .await
            .map_err(NotificationError::Unavailable)
    }
}

/// Fire-and-forget delivery: failures are logged and swallowed.
pub async fn notify_best_effort(notifier: &dyn OrderNotifier, order_id: Uuid, notice: OrderNotice) {
    if let Err(e) = notifier.notify(order_id, notice).await {
        warn!(%order_id, error = %e, "order notification failed");
    }
}
