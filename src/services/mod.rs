//! Order workflow services.

pub mod cancellation;
pub mod catalog;
pub mod checkout;
pub mod orders;
pub mod quotes;
pub mod reconciliation;

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::{
    config::CommerceConfig,
    events::EventSender,
    gateway::PaymentGateway,
    ids::IdGenerator,
    notifications::OrderNotifier,
};

use self::{
    cancellation::CancellationService, catalog::CatalogService, checkout::CheckoutService,
    checkout::OrderMinting, orders::OrderService, quotes::QuoteService,
    reconciliation::ReconciliationService,
};

/// Every workflow service wired against one set of collaborators.
#[derive(Clone)]
pub struct Services {
    pub catalog: CatalogService,
    pub checkout: CheckoutService,
    pub quotes: QuoteService,
    pub reconciliation: ReconciliationService,
    pub cancellation: CancellationService,
    pub orders: OrderService,
}

impl Services {
    pub fn new(
        db: Arc<DatabaseConnection>,
        gateway: Arc<dyn PaymentGateway>,
        ids: Arc<dyn IdGenerator>,
        events: EventSender,
        notifier: Arc<dyn OrderNotifier>,
        commerce: &CommerceConfig,
    ) -> Self {
        let catalog = CatalogService::new(db.clone(), commerce);
        let minting = OrderMinting {
            gateway: gateway.clone(),
            ids: ids.clone(),
            events: events.clone(),
            currency: commerce.currency.clone(),
            gateway_order_prefix: commerce.gateway_order_prefix.clone(),
        };

        Self {
            checkout: CheckoutService::new(
                db.clone(),
                catalog.clone(),
                gateway.clone(),
                ids,
                events.clone(),
                commerce,
            ),
            quotes: QuoteService::new(db.clone(), minting, events.clone()),
            reconciliation: ReconciliationService::new(db.clone(), gateway.clone(), events.clone()),
            cancellation: CancellationService::new(
                db.clone(),
                gateway,
                notifier,
                events,
                commerce.default_cancellation_reason.clone(),
            ),
            orders: OrderService::new(db, commerce),
            catalog,
        }
    }
}
