use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::BuyerPrincipal,
    entities::{
        LineItems, OrderLineItem, OrderModel, OrderType, Quote, QuoteModel, QuoteStatus,
        ShippingAddress,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    metrics,
    repositories::quote_repository,
    services::checkout::{OrderDraft, OrderMinting},
};

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ConvertQuoteRequest {
    /// Falls back to the buyer's default address when absent
    #[validate]
    pub shipping_address: Option<ShippingAddress>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteConversion {
    pub quote_id: Uuid,
    pub gateway_order_id: String,
    pub payment_session_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub order: OrderModel,
}

/// Buyer-side handling of seller quotes.
#[derive(Clone)]
pub struct QuoteService {
    db: Arc<DatabaseConnection>,
    minting: OrderMinting,
    events: EventSender,
}

impl QuoteService {
    pub(crate) fn new(
        db: Arc<DatabaseConnection>,
        minting: OrderMinting,
        events: EventSender,
    ) -> Self {
        Self {
            db,
            minting,
            events,
        }
    }

    #[instrument(skip(self, buyer), fields(buyer_id = %buyer.id))]
    pub async fn list_quotes(&self, buyer: &BuyerPrincipal) -> Result<Vec<QuoteModel>, ServiceError> {
        buyer.ensure_active()?;
        let quotes = quote_repository::list_addressed_to(&*self.db, buyer.id, &buyer.email).await?;
        Ok(quotes)
    }

    #[instrument(skip(self, buyer), fields(buyer_id = %buyer.id))]
    pub async fn get_quote(
        &self,
        buyer: &BuyerPrincipal,
        quote_id: Uuid,
    ) -> Result<QuoteModel, ServiceError> {
        buyer.ensure_active()?;
        self.find_addressed(buyer, quote_id).await
    }

    /// Decline a sent quote.
    #[instrument(skip(self, buyer), fields(buyer_id = %buyer.id))]
    pub async fn reject_quote(
        &self,
        buyer: &BuyerPrincipal,
        quote_id: Uuid,
    ) -> Result<QuoteModel, ServiceError> {
        buyer.ensure_active()?;
        let quote = self.find_sent(buyer, quote_id).await?;
        if quote.is_expired_at(Utc::now()) {
            return Err(self.expire(quote_id).await?);
        }

        if !quote_repository::transition_from_sent(&*self.db, quote_id, QuoteStatus::Rejected, None)
            .await?
        {
            return Err(ServiceError::QuoteNotFound(quote_id));
        }
        metrics::QUOTE_TRANSITIONS
            .with_label_values(&["rejected"])
            .inc();
        self.events.send_or_log(Event::QuoteRejected(quote_id)).await;
        info!(%quote_id, "quote rejected");

        self.find_addressed(buyer, quote_id).await
    }

    /// Approve a sent quote and turn it into a single pending order with its
    /// own payment session.
    #[instrument(skip(self, buyer, request), fields(buyer_id = %buyer.id))]
    pub async fn convert_quote(
        &self,
        buyer: &BuyerPrincipal,
        quote_id: Uuid,
        request: ConvertQuoteRequest,
    ) -> Result<QuoteConversion, ServiceError> {
        buyer.ensure_active()?;
        request.validate()?;

        let quote = self.find_sent(buyer, quote_id).await?;
        let now = Utc::now();
        if quote.is_expired_at(now) {
            return Err(self.expire(quote_id).await?);
        }

        let shipping_address = request
            .shipping_address
            .or_else(|| buyer.default_address.clone())
            .ok_or_else(|| {
                ServiceError::ValidationError(
                    "shipping_address is required when the buyer has no default address"
                        .to_string(),
                )
            })?;
        shipping_address.validate()?;

        let amount = quote.final_amount;
        let gateway_order_id = self.minting.new_gateway_order_id(now);
        let model = self.minting.active_model(
            draft_from_quote(&quote),
            buyer,
            &shipping_address,
            &gateway_order_id,
            now,
        );

        let order = self
            .db
            .transaction::<_, OrderModel, ServiceError>(move |txn| {
                Box::pin(async move {
                    let order = model.insert(txn).await?;
                    let won = quote_repository::transition_from_sent(
                        txn,
                        quote_id,
                        QuoteStatus::Approved,
                        Some(order.id),
                    )
                    .await?;
                    if !won {
                        return Err(ServiceError::QuoteNotFound(quote_id));
                    }
                    Ok(order)
                })
            })
            .await?;

        metrics::QUOTE_TRANSITIONS
            .with_label_values(&["approved"])
            .inc();
        self.events
            .send_or_log(Event::QuoteApproved {
                quote_id,
                order_id: order.id,
            })
            .await;
        info!(%quote_id, order_id = %order.id, %gateway_order_id, "quote approved");

        let mut orders = [order];
        let payment_session_id = self
            .minting
            .open_session(&self.db, buyer, &gateway_order_id, amount, &mut orders)
            .await
            .map_err(|e| {
                metrics::record_failure("convert_quote", e.code());
                e
            })?;
        let [order] = orders;

        Ok(QuoteConversion {
            quote_id,
            gateway_order_id,
            payment_session_id,
            amount,
            currency: self.minting.currency.clone(),
            order,
        })
    }

    async fn find_addressed(
        &self,
        buyer: &BuyerPrincipal,
        quote_id: Uuid,
    ) -> Result<QuoteModel, ServiceError> {
        Quote::find_by_id(quote_id)
            .one(&*self.db)
            .await?
            .filter(|q| q.is_addressed_to(buyer.id, &buyer.email))
            .ok_or(ServiceError::QuoteNotFound(quote_id))
    }

    async fn find_sent(
        &self,
        buyer: &BuyerPrincipal,
        quote_id: Uuid,
    ) -> Result<QuoteModel, ServiceError> {
        let quote = self.find_addressed(buyer, quote_id).await?;
        if quote.status != QuoteStatus::Sent {
            return Err(ServiceError::QuoteNotFound(quote_id));
        }
        Ok(quote)
    }

    /// Persist the lapse and hand back the error to report.
    async fn expire(&self, quote_id: Uuid) -> Result<ServiceError, ServiceError> {
        if quote_repository::transition_from_sent(&*self.db, quote_id, QuoteStatus::Expired, None)
            .await?
        {
            warn!(%quote_id, "quote expired before approval");
            metrics::QUOTE_TRANSITIONS
                .with_label_values(&["expired"])
                .inc();
            self.events.send_or_log(Event::QuoteExpired(quote_id)).await;
        }
        Ok(ServiceError::QuoteExpired(quote_id))
    }
}

/// Quote orders keep the seller's lines and pricing as-is.
fn draft_from_quote(quote: &QuoteModel) -> OrderDraft {
    let items = LineItems(
        quote
            .items
            .0
            .iter()
            .map(|line| {
                OrderLineItem::new(
                    line.product_id,
                    line.name.clone(),
                    line.sku.clone(),
                    None,
                    line.quantity,
                    line.unit_price,
                )
            })
            .collect(),
    );

    OrderDraft {
        seller_id: quote.seller_id,
        order_type: OrderType::Quote,
        quote_id: Some(quote.id),
        items,
        item_total: quote.total_amount,
        discount_amount: (quote.total_amount - quote.final_amount).max(Decimal::ZERO),
        grand_total: quote.final_amount,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::quote::{QuoteItems, QuoteLineItem};
    use chrono::Duration;
    use rust_decimal_macros::dec;

    #[test]
    fn quote_draft_carries_negotiated_total() {
        let now = Utc::now();
        let quote = QuoteModel {
            id: Uuid::new_v4(),
            quote_number: "Q-1".into(),
            seller_id: Uuid::new_v4(),
            buyer_id: None,
            contact_email: "buyer@corp.test".into(),
            items: QuoteItems(vec![QuoteLineItem {
                product_id: Uuid::new_v4(),
                name: "Chair".into(),
                sku: Some("CH-1".into()),
                quantity: 10,
                unit_price: dec!(120),
            }]),
            total_amount: dec!(1200),
            final_amount: dec!(1000),
            notes: None,
            valid_until: now + Duration::days(1),
            status: QuoteStatus::Sent,
            converted_order_id: None,
            created_at: now,
            updated_at: now,
        };

        let draft = draft_from_quote(&quote);
        assert_eq!(draft.order_type, OrderType::Quote);
        assert_eq!(draft.quote_id, Some(quote.id));
        assert_eq!(draft.seller_id, quote.seller_id);
        assert_eq!(draft.items.total(), dec!(1200));
        assert_eq!(draft.discount_amount, dec!(200));
        assert_eq!(draft.grand_total, dec!(1000));
    }
}
