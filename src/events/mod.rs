use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::notifications::OrderNotice;

/// Domain events published by the order workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    OrderPlaced {
        order_id: Uuid,
        gateway_order_id: String,
        seller_id: Uuid,
        grand_total: Decimal,
    },
    PaymentConfirmed {
        order_id: Uuid,
        gateway_order_id: String,
        gateway_payment_id: String,
    },
    /// Confirmation went through but the shelf could not cover a line item.
    StockShortfall {
        order_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    },
    OrderCancelled {
        order_id: Uuid,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    RefundIssued {
        order_id: Uuid,
        refund_id: String,
        amount: Decimal,
    },
    RefundPending {
        order_id: Uuid,
        refund_id: String,
        error: String,
    },
    QuoteApproved {
        quote_id: Uuid,
        order_id: Uuid,
    },
    QuoteExpired(Uuid),
    QuoteRejected(Uuid),
    /// Hand-off to the buyer notification service
    NotificationRequested {
        order_id: Uuid,
        notice: OrderNotice,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::OrderPlaced { .. } => "order_placed",
            Event::PaymentConfirmed { .. } => "payment_confirmed",
            Event::StockShortfall { .. } => "stock_shortfall",
            Event::OrderCancelled { .. } => "order_cancelled",
            Event::RefundIssued { .. } => "refund_issued",
            Event::RefundPending { .. } => "refund_pending",
            Event::QuoteApproved { .. } => "quote_approved",
            Event::QuoteExpired(_) => "quote_expired",
            Event::QuoteRejected(_) => "quote_rejected",
            Event::NotificationRequested { .. } => "notification_requested",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Publishing never fails a workflow; a closed bus is only logged.
    pub async fn send_or_log(&self, event: Event) {
        let name = event.name();
        if let Err(e) = self.send(event).await {
            warn!(event = name, error = %e, "event dropped");
        }
    }
}

/// Bounded channel pair for the in-process event bus.
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (EventSender::new(tx), rx)
}

/// Drains the bus until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::StockShortfall {
                order_id,
                product_id,
                quantity,
            } => {
                warn!(%order_id, %product_id, quantity, "stock shortfall on confirmed order");
            }
            Event::RefundPending {
                order_id,
                refund_id,
                error,
            } => {
                warn!(%order_id, refund_id, error, "refund awaiting retry");
            }
            other => {
                info!(event = other.name(), "domain event");
                debug!(?other);
            }
        }
    }

    info!("Event processing loop stopped");
}
