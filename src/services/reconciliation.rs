use chrono::Utc;
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::BuyerPrincipal,
    entities::{OrderModel, OrderStatus, PaymentStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    gateway::{latest_successful, GatewayError, PaymentGateway},
    metrics,
    repositories::{order_repository, product_stock},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationOutcome {
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
    /// Orders this call moved to confirmed/paid
    pub newly_confirmed: usize,
    pub orders: Vec<OrderModel>,
}

/// Line items the shelf could not cover when an order was confirmed
type Shortfalls = Vec<(Uuid, i32)>;

/// Confirms orders once the gateway says their payment landed.
#[derive(Clone)]
pub struct ReconciliationService {
    db: Arc<DatabaseConnection>,
    gateway: Arc<dyn PaymentGateway>,
    events: EventSender,
}

impl ReconciliationService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        gateway: Arc<dyn PaymentGateway>,
        events: EventSender,
    ) -> Self {
        Self {
            db,
            gateway,
            events,
        }
    }

    /// Safe to call any number of times: only the first caller to flip an
    /// order touches its stock.
    #[instrument(skip(self, buyer), fields(buyer_id = %buyer.id))]
    pub async fn verify_payment(
        &self,
        buyer: &BuyerPrincipal,
        gateway_order_id: &str,
    ) -> Result<ReconciliationOutcome, ServiceError> {
        buyer.ensure_active()?;

        let status = self.gateway.get_order_status(gateway_order_id).await?;
        if !status.is_paid() {
            debug!(%status, "gateway order not paid yet");
            return Err(ServiceError::PaymentNotComplete(status.to_string()));
        }

        let payments = self.gateway.list_payments(gateway_order_id).await?;
        let payment = latest_successful(&payments)
            .cloned()
            .ok_or_else(|| GatewayError::NoSuccessfulPayment(gateway_order_id.to_string()))?;

        let orders =
            order_repository::find_by_gateway_order(&*self.db, gateway_order_id, buyer.id).await?;
        if orders.is_empty() {
            return Err(ServiceError::NoMatchingOrders(gateway_order_id.to_string()));
        }

        let paid_at = payment.paid_at.unwrap_or_else(Utc::now);
        let mut newly_confirmed = 0;

        for order in &orders {
            if order.status != OrderStatus::Pending || order.payment_status != PaymentStatus::Unpaid
            {
                if order.status == OrderStatus::Cancelled {
                    warn!(
                        order_id = %order.id,
                        payment_status = %order.payment_status,
                        "payment arrived for cancelled order; needs manual refund"
                    );
                } else {
                    debug!(order_id = %order.id, status = %order.status, "order already reconciled");
                }
                continue;
            }

            let order_id = order.id;
            let payment_id = payment.payment_id.clone();
            let items = order.items.clone();

            let confirmation = self
                .db
                .transaction::<_, Option<Shortfalls>, ServiceError>(move |txn| {
                    Box::pin(async move {
                        if !order_repository::mark_paid(txn, order_id, &payment_id, paid_at).await? {
                            return Ok(None);
                        }
                        let mut items = items;
                        let mut shortfalls = Vec::new();
                        for item in items.0.iter_mut() {
                            item.stock_applied = product_stock::decrement_if_at_least(
                                txn,
                                item.product_id,
                                item.quantity,
                            )
                            .await?;
                            if !item.stock_applied {
                                shortfalls.push((item.product_id, item.quantity));
                            }
                        }
                        order_repository::record_stock_applied(txn, order_id, items).await?;
                        Ok(Some(shortfalls))
                    })
                })
                .await?;

            let Some(shortfalls) = confirmation else {
                debug!(%order_id, "lost confirmation race");
                continue;
            };

            newly_confirmed += 1;
            metrics::PAYMENTS_CONFIRMED.inc();
            info!(%order_id, gateway_payment_id = %payment.payment_id, "order confirmed");
            self.events
                .send_or_log(Event::PaymentConfirmed {
                    order_id,
                    gateway_order_id: gateway_order_id.to_string(),
                    gateway_payment_id: payment.payment_id.clone(),
                })
                .await;

            for (product_id, quantity) in shortfalls {
                warn!(%order_id, %product_id, quantity, "insufficient stock at confirmation");
                metrics::STOCK_SHORTFALLS.inc();
                self.events
                    .send_or_log(Event::StockShortfall {
                        order_id,
                        product_id,
                        quantity,
                    })
                    .await;
            }
        }

        let orders =
            order_repository::find_by_gateway_order(&*self.db, gateway_order_id, buyer.id).await?;

        Ok(ReconciliationOutcome {
            gateway_order_id: gateway_order_id.to_string(),
            gateway_payment_id: payment.payment_id,
            newly_confirmed,
            orders,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db,
        entities::BuyerStatus,
        events,
        gateway::{GatewayOrderStatus, GatewayPayment, MockPaymentGateway},
    };
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn buyer() -> BuyerPrincipal {
        BuyerPrincipal {
            id: Uuid::new_v4(),
            email: "ops@corp.test".into(),
            phone: "9000000000".into(),
            company_name: "Corp".into(),
            status: BuyerStatus::Active,
            default_address: None,
        }
    }

    async fn service(gateway: MockPaymentGateway) -> ReconciliationService {
        let pool = db::establish_connection("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        db::run_migrations(&pool).await.expect("migrations");
        let (sender, _rx) = events::channel(16);
        ReconciliationService::new(Arc::new(pool), Arc::new(gateway), sender)
    }

    #[tokio::test]
    async fn unpaid_gateway_order_stops_before_listing_payments() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_get_order_status()
            .times(1)
            .returning(|_| Ok(GatewayOrderStatus::Active));
        gateway.expect_list_payments().never();

        let err = service(gateway)
            .await
            .verify_payment(&buyer(), "B2B-1")
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::PaymentNotComplete(status) if status == "ACTIVE");
    }

    #[tokio::test]
    async fn paid_without_successful_attempt_is_a_gateway_error() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_get_order_status()
            .returning(|_| Ok(GatewayOrderStatus::Paid));
        gateway.expect_list_payments().returning(|_| {
            Ok(vec![GatewayPayment {
                payment_id: "1".into(),
                status: "FAILED".into(),
                amount: dec!(10),
                paid_at: None,
            }])
        });

        let err = service(gateway)
            .await
            .verify_payment(&buyer(), "B2B-2")
            .await
            .unwrap_err();
        assert_matches!(
            err,
            ServiceError::Gateway(GatewayError::NoSuccessfulPayment(id)) if id == "B2B-2"
        );
    }

    #[tokio::test]
    async fn transport_failures_surface_as_gateway_errors() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_get_order_status()
            .returning(|_| Err(GatewayError::Transport("timed out".into())));

        let err = service(gateway)
            .await
            .verify_payment(&buyer(), "B2B-3")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "gateway_error");
        assert_matches!(err, ServiceError::Gateway(GatewayError::Transport(_)));
    }
}
