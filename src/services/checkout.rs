use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    auth::BuyerPrincipal,
    config::CommerceConfig,
    entities::{
        order, LineItems, OrderLineItem, OrderModel, OrderStatus, OrderType, PaymentStatus,
        ShippingAddress,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    gateway::{PaymentGateway, SessionCustomer},
    ids::IdGenerator,
    metrics,
    repositories::order_repository,
    services::catalog::{CatalogService, ResolvedLine},
};

const MAX_LINE_QUANTITY: i32 = 100_000;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CartLine {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PlaceOrderRequest {
    #[validate(length(min = 1, message = "Cart is empty"), custom = "validate_cart_lines")]
    pub items: Vec<CartLine>,
    #[validate]
    pub shipping_address: ShippingAddress,
}

fn validate_cart_lines(lines: &[CartLine]) -> Result<(), ValidationError> {
    if lines
        .iter()
        .any(|line| line.quantity < 1 || line.quantity > MAX_LINE_QUANTITY)
    {
        let mut err = ValidationError::new("quantity");
        err.message = Some("Each line needs a quantity between 1 and 100000".into());
        return Err(err);
    }
    Ok(())
}

/// Result of a checkout: the seller orders and the one session paying for them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutReceipt {
    pub gateway_order_id: String,
    pub payment_session_id: String,
    pub total_amount: Decimal,
    pub currency: String,
    pub orders: Vec<OrderModel>,
}

/// The items one seller fulfils out of a cart
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellerGroup {
    pub seller_id: Uuid,
    pub items: LineItems,
}

impl SellerGroup {
    pub fn total(&self) -> Decimal {
        self.items.total()
    }
}

/// Sum quantities of repeated products, keeping first-seen order.
pub fn merge_duplicate_lines(lines: &[CartLine]) -> Vec<CartLine> {
    let mut merged: Vec<CartLine> = Vec::with_capacity(lines.len());
    for line in lines {
        match merged.iter_mut().find(|m| m.product_id == line.product_id) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(line.quantity),
            None => merged.push(line.clone()),
        }
    }
    merged
}

/// One group per seller, sellers in first-seen order.
pub fn partition_by_seller(lines: Vec<ResolvedLine>) -> Vec<SellerGroup> {
    let mut groups: Vec<SellerGroup> = Vec::new();
    for line in lines {
        let item = OrderLineItem::new(
            line.product.id,
            line.product.name,
            Some(line.product.sku),
            line.product.image_url,
            line.quantity,
            line.unit_price,
        );
        match groups.iter_mut().find(|g| g.seller_id == line.product.seller_id) {
            Some(group) => group.items.0.push(item),
            None => groups.push(SellerGroup {
                seller_id: line.product.seller_id,
                items: LineItems(vec![item]),
            }),
        }
    }
    groups
}

/// Everything that differs between a direct-cart order and a quote order
pub(crate) struct OrderDraft {
    pub seller_id: Uuid,
    pub order_type: OrderType,
    pub quote_id: Option<Uuid>,
    pub items: LineItems,
    pub item_total: Decimal,
    pub discount_amount: Decimal,
    pub grand_total: Decimal,
}

impl From<SellerGroup> for OrderDraft {
    fn from(group: SellerGroup) -> Self {
        let total = group.total();
        Self {
            seller_id: group.seller_id,
            order_type: OrderType::Direct,
            quote_id: None,
            items: group.items,
            item_total: total,
            discount_amount: Decimal::ZERO,
            grand_total: total,
        }
    }
}

/// Shared pieces of order creation used by checkout and quote conversion
#[derive(Clone)]
pub(crate) struct OrderMinting {
    pub gateway: Arc<dyn PaymentGateway>,
    pub ids: Arc<dyn IdGenerator>,
    pub events: EventSender,
    pub currency: String,
    pub gateway_order_prefix: String,
}

impl OrderMinting {
    pub fn new_gateway_order_id(&self, now: DateTime<Utc>) -> String {
        self.ids.gateway_order_id(&self.gateway_order_prefix, now)
    }

    /// Pending/unpaid row for one draft. Fees are zero on this channel.
    pub fn active_model(
        &self,
        draft: OrderDraft,
        buyer: &BuyerPrincipal,
        shipping_address: &ShippingAddress,
        gateway_order_id: &str,
        now: DateTime<Utc>,
    ) -> order::ActiveModel {
        order::ActiveModel {
            id: Set(self.ids.record_id()),
            order_number: Set(self.ids.order_number(now)),
            order_type: Set(draft.order_type),
            buyer_id: Set(buyer.id),
            buyer_email: Set(buyer.email.clone()),
            buyer_phone: Set(buyer.phone.clone()),
            buyer_company: Set(buyer.company_name.clone()),
            seller_id: Set(draft.seller_id),
            quote_id: Set(draft.quote_id),
            items: Set(draft.items),
            shipping_address: Set(shipping_address.clone()),
            item_total: Set(draft.item_total),
            shipping_cost: Set(Decimal::ZERO),
            discount_amount: Set(draft.discount_amount),
            grand_total: Set(draft.grand_total),
            commission_amount: Set(Decimal::ZERO),
            platform_fee: Set(Decimal::ZERO),
            currency: Set(self.currency.clone()),
            status: Set(OrderStatus::Pending),
            payment_status: Set(PaymentStatus::Unpaid),
            gateway_order_id: Set(gateway_order_id.to_string()),
            payment_session_id: Set(None),
            gateway_payment_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            paid_at: Set(None),
            cancelled_at: Set(None),
            cancellation_reason: Set(None),
            refund_id: Set(None),
        }
    }

    /// Request one session for the whole set and back-fill it. On gateway
    /// failure the persisted orders are left pending/unpaid.
    pub async fn open_session(
        &self,
        db: &DatabaseConnection,
        buyer: &BuyerPrincipal,
        gateway_order_id: &str,
        amount: Decimal,
        orders: &mut [OrderModel],
    ) -> Result<String, ServiceError> {
        let customer = SessionCustomer::from(buyer);
        let session = self
            .gateway
            .create_session(gateway_order_id, amount, &self.currency, &customer)
            .await
            .map_err(|e| {
                error!(gateway_order_id, error = %e, "payment session creation failed");
                ServiceError::Gateway(e)
            })?;

        order_repository::attach_session(db, gateway_order_id, &session.payment_session_id)
            .await?;
        for order in orders.iter_mut() {
            order.payment_session_id = Some(session.payment_session_id.clone());
        }

        for order in orders.iter() {
            self.events
                .send_or_log(Event::OrderPlaced {
                    order_id: order.id,
                    gateway_order_id: gateway_order_id.to_string(),
                    seller_id: order.seller_id,
                    grand_total: order.grand_total,
                })
                .await;
        }
        metrics::ORDERS_PLACED.inc_by(orders.len() as u64);

        Ok(session.payment_session_id)
    }
}

/// Turns a validated cart into one pending order per seller.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    catalog: CatalogService,
    minting: OrderMinting,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        catalog: CatalogService,
        gateway: Arc<dyn PaymentGateway>,
        ids: Arc<dyn IdGenerator>,
        events: EventSender,
        commerce: &CommerceConfig,
    ) -> Self {
        Self {
            db,
            catalog,
            minting: OrderMinting {
                gateway,
                ids,
                events,
                currency: commerce.currency.clone(),
                gateway_order_prefix: commerce.gateway_order_prefix.clone(),
            },
        }
    }

    #[instrument(skip(self, buyer, request), fields(buyer_id = %buyer.id, lines = request.items.len()))]
    pub async fn place_order(
        &self,
        buyer: &BuyerPrincipal,
        request: PlaceOrderRequest,
    ) -> Result<CheckoutReceipt, ServiceError> {
        buyer.ensure_active()?;
        request.validate()?;

        let mut resolved = Vec::new();
        for line in merge_duplicate_lines(&request.items) {
            let resolved_line = self
                .catalog
                .resolve_line(line.product_id, line.quantity)
                .await
                .map_err(|e| {
                    metrics::record_failure("place_order", e.code());
                    e
                })?;
            resolved.push(resolved_line);
        }

        let groups = partition_by_seller(resolved);
        let total_amount: Decimal = groups.iter().map(SellerGroup::total).sum();

        let now = Utc::now();
        let gateway_order_id = self.minting.new_gateway_order_id(now);
        let models: Vec<order::ActiveModel> = groups
            .into_iter()
            .map(|group| {
                self.minting.active_model(
                    OrderDraft::from(group),
                    buyer,
                    &request.shipping_address,
                    &gateway_order_id,
                    now,
                )
            })
            .collect();

        let mut orders = self
            .db
            .transaction::<_, Vec<OrderModel>, ServiceError>(move |txn| {
                Box::pin(async move {
                    let mut inserted = Vec::with_capacity(models.len());
                    for model in models {
                        inserted.push(model.insert(txn).await?);
                    }
                    Ok(inserted)
                })
            })
            .await?;

        info!(
            gateway_order_id = %gateway_order_id,
            orders = orders.len(),
            total = %total_amount,
            "orders persisted, requesting payment session"
        );

        let payment_session_id = self
            .minting
            .open_session(&self.db, buyer, &gateway_order_id, total_amount, &mut orders)
            .await
            .map_err(|e| {
                metrics::record_failure("place_order", e.code());
                e
            })?;

        Ok(CheckoutReceipt {
            gateway_order_id,
            payment_session_id,
            total_amount,
            currency: self.minting.currency.clone(),
            orders,
        })
    }
}
