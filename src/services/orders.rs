use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::BuyerPrincipal, config::CommerceConfig, entities::OrderModel, errors::ServiceError,
    repositories::order_repository,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct OrderListQuery {
    #[validate(range(min = 1, max = 10000))]
    pub page: Option<u64>,
    #[validate(range(min = 1))]
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPage {
    pub orders: Vec<OrderModel>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

/// Read access to a buyer's own orders
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    default_page_size: u64,
    max_page_size: u64,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, commerce: &CommerceConfig) -> Self {
        Self {
            db,
            default_page_size: commerce.default_page_size,
            max_page_size: commerce.max_page_size,
        }
    }

    #[instrument(skip(self, buyer), fields(buyer_id = %buyer.id))]
    pub async fn list_orders(
        &self,
        buyer: &BuyerPrincipal,
        query: OrderListQuery,
    ) -> Result<OrderPage, ServiceError> {
        buyer.ensure_active()?;
        query.validate()?;

        let page = query.page.unwrap_or(1);
        let limit = query
            .limit
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size);
        let (orders, total) =
            order_repository::list_for_buyer(&*self.db, buyer.id, page, limit).await?;

        Ok(OrderPage {
            orders,
            total,
            page,
            limit,
        })
    }

    #[instrument(skip(self, buyer), fields(buyer_id = %buyer.id))]
    pub async fn get_order(
        &self,
        buyer: &BuyerPrincipal,
        order_id: Uuid,
    ) -> Result<OrderModel, ServiceError> {
        buyer.ensure_active()?;
        order_repository::find_for_buyer(&*self.db, order_id, buyer.id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }
}
