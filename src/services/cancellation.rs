use chrono::Utc;
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::BuyerPrincipal,
    entities::{OrderModel, PaymentStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    gateway::PaymentGateway,
    ids::refund_id_for,
    metrics,
    notifications::{notify_best_effort, OrderNotice, OrderNotifier, RefundNotice},
    repositories::{order_repository, product_stock},
};

/// Attempts at the cancel compare-and-set before giving up on a moving order
const CANCEL_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CancelOrderRequest {
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RefundOutcome {
    /// The order was never paid
    NotRequired,
    Refunded { refund_id: String },
    Pending { refund_id: String, error: String },
}

impl RefundOutcome {
    fn notice(&self) -> RefundNotice {
        match self {
            RefundOutcome::NotRequired => RefundNotice::NotRequired,
            RefundOutcome::Refunded { refund_id } => RefundNotice::Issued {
                refund_id: refund_id.clone(),
            },
            RefundOutcome::Pending { refund_id, .. } => RefundNotice::Pending {
                refund_id: refund_id.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancellationOutcome {
    pub order: OrderModel,
    pub refund: RefundOutcome,
}

/// Buyer-initiated cancellation with stock restore and refund.
#[derive(Clone)]
pub struct CancellationService {
    db: Arc<DatabaseConnection>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn OrderNotifier>,
    events: EventSender,
    default_reason: String,
}

impl CancellationService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn OrderNotifier>,
        events: EventSender,
        default_reason: String,
    ) -> Self {
        Self {
            db,
            gateway,
            notifier,
            events,
            default_reason,
        }
    }

    #[instrument(skip(self, buyer, request), fields(buyer_id = %buyer.id))]
    pub async fn cancel_order(
        &self,
        buyer: &BuyerPrincipal,
        order_id: Uuid,
        request: CancelOrderRequest,
    ) -> Result<CancellationOutcome, ServiceError> {
        buyer.ensure_active()?;
        request.validate()?;

        let reason = request
            .reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| self.default_reason.clone());

        let cancelled = self.cancel_with_restore(buyer, order_id, &reason).await?;
        metrics::ORDER_CANCELLATIONS.inc();
        info!(%order_id, was_paid = cancelled.payment_status == PaymentStatus::Paid, "order cancelled");

        let refund = if cancelled.payment_status == PaymentStatus::Paid {
            self.refund(&cancelled).await?
        } else {
            RefundOutcome::NotRequired
        };

        self.events
            .send_or_log(Event::OrderCancelled {
                order_id,
                reason: reason.clone(),
                timestamp: Utc::now(),
            })
            .await;
        notify_best_effort(
            self.notifier.as_ref(),
            order_id,
            OrderNotice::Cancelled {
                reason,
                refund: refund.notice(),
            },
        )
        .await;

        Ok(CancellationOutcome {
            order: self.load(buyer, order_id).await?,
            refund,
        })
    }

    /// Re-attempt a refund left pending by an earlier cancellation. Uses the
    /// same refund id so the gateway can de-duplicate.
    #[instrument(skip(self, buyer), fields(buyer_id = %buyer.id))]
    pub async fn retry_refund(
        &self,
        buyer: &BuyerPrincipal,
        order_id: Uuid,
    ) -> Result<CancellationOutcome, ServiceError> {
        buyer.ensure_active()?;

        let order = self.load(buyer, order_id).await?;
        if order.payment_status != PaymentStatus::RefundPending {
            return Err(ServiceError::InvalidStateTransition {
                current: order.payment_status.to_string(),
                action: "retry the refund of".to_string(),
            });
        }

        let refund_id = order
            .refund_id
            .clone()
            .unwrap_or_else(|| refund_id_for(&order.order_number));

        match self
            .gateway
            .create_refund(&order.gateway_order_id, order.grand_total, &refund_id)
            .await
        {
            Ok(receipt) => {
                self.record_refunded(&order, &refund_id, &receipt.status).await?;
                notify_best_effort(
                    self.notifier.as_ref(),
                    order_id,
                    OrderNotice::Refunded {
                        refund_id: refund_id.clone(),
                    },
                )
                .await;
            }
            Err(e) => {
                warn!(%order_id, %refund_id, error = %e, "refund retry failed");
                metrics::REFUND_OUTCOMES.with_label_values(&["retry_failed"]).inc();
                return Err(ServiceError::Gateway(e));
            }
        }

        Ok(CancellationOutcome {
            order: self.load(buyer, order_id).await?,
            refund: RefundOutcome::Refunded { refund_id },
        })
    }

    /// Flip the order to cancelled and, when it was paid, put its stock back
    /// in the same transaction. Returns the order as it was just before.
    async fn cancel_with_restore(
        &self,
        buyer: &BuyerPrincipal,
        order_id: Uuid,
        reason: &str,
    ) -> Result<OrderModel, ServiceError> {
        let mut order = self.load(buyer, order_id).await?;

        for _ in 0..CANCEL_ATTEMPTS {
            if !order.status.is_cancellable() {
                break;
            }

            let expected = (order.status, order.payment_status);
            // Lines short at confirmation never left the shelf.
            let restore: Vec<(Uuid, i32)> = if order.payment_status == PaymentStatus::Paid {
                order
                    .items
                    .applied()
                    .map(|item| (item.product_id, item.quantity))
                    .collect()
            } else {
                Vec::new()
            };
            let reason = reason.to_string();

            let won = self
                .db
                .transaction::<_, bool, ServiceError>(move |txn| {
                    Box::pin(async move {
                        let now = Utc::now();
                        if !order_repository::mark_cancelled(txn, order_id, expected, &reason, now)
                            .await?
                        {
                            return Ok(false);
                        }
                        for (product_id, quantity) in restore {
                            if !product_stock::restore(txn, product_id, quantity).await? {
                                warn!(%order_id, %product_id, "product gone; stock not restored");
                            }
                        }
                        Ok(true)
                    })
                })
                .await?;

            if won {
                return Ok(order);
            }
            order = self.load(buyer, order_id).await?;
        }

        Err(ServiceError::InvalidStateTransition {
            current: order.status.to_string(),
            action: "cancel".to_string(),
        })
    }

    async fn refund(&self, order: &OrderModel) -> Result<RefundOutcome, ServiceError> {
        let refund_id = refund_id_for(&order.order_number);

        match self
            .gateway
            .create_refund(&order.gateway_order_id, order.grand_total, &refund_id)
            .await
        {
            Ok(receipt) => {
                self.record_refunded(order, &refund_id, &receipt.status).await?;
                Ok(RefundOutcome::Refunded { refund_id })
            }
            Err(e) => {
                error!(order_id = %order.id, %refund_id, error = %e, "refund failed; left pending");
                order_repository::set_refund_outcome(
                    &*self.db,
                    order.id,
                    PaymentStatus::RefundPending,
                    &refund_id,
                )
                .await?;
                metrics::REFUND_OUTCOMES.with_label_values(&["pending"]).inc();
                self.events
                    .send_or_log(Event::RefundPending {
                        order_id: order.id,
                        refund_id: refund_id.clone(),
                        error: e.to_string(),
                    })
                    .await;
                Ok(RefundOutcome::Pending {
                    refund_id,
                    error: e.to_string(),
                })
            }
        }
    }

    async fn record_refunded(
        &self,
        order: &OrderModel,
        refund_id: &str,
        gateway_status: &str,
    ) -> Result<(), ServiceError> {
        order_repository::set_refund_outcome(&*self.db, order.id, PaymentStatus::Refunded, refund_id)
            .await?;
        info!(order_id = %order.id, refund_id, gateway_status, "refund accepted");
        metrics::REFUND_OUTCOMES.with_label_values(&["refunded"]).inc();
        self.events
            .send_or_log(Event::RefundIssued {
                order_id: order.id,
                refund_id: refund_id.to_string(),
                amount: order.grand_total,
            })
            .await;
        Ok(())
    }

    async fn load(&self, buyer: &BuyerPrincipal, order_id: Uuid) -> Result<OrderModel, ServiceError> {
        order_repository::find_for_buyer(&*self.db, order_id, buyer.id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }
}
