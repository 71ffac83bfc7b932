use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::BuyerPrincipal,
    config::CommerceConfig,
    entities::{catalog_entry, CatalogEntry, CatalogEntryModel, Product, ProductModel},
    errors::ServiceError,
};

/// Sort orders offered by the catalog listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogSort {
    PriceAsc,
    PriceDesc,
    Popularity,
    #[default]
    Newest,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CatalogQuery {
    /// Case-insensitive match on name, description or SKU
    #[validate(length(max = 200))]
    pub search: Option<String>,
    pub category: Option<String>,
    pub tag: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    #[serde(default)]
    pub sort: CatalogSort,
    #[validate(range(min = 1, max = 10000))]
    pub page: Option<u64>,
    #[validate(range(min = 1))]
    pub limit: Option<u64>,
}

/// A product as the corporate buyer sees it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub product_id: Uuid,
    pub seller_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub sku: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub image_url: Option<String>,
    pub base_price: Decimal,
    pub corporate_price: Option<Decimal>,
    pub effective_price: Decimal,
    pub min_order_qty: i32,
    pub max_order_qty: i32,
    pub stock: i32,
    pub order_count: i32,
    pub created_at: DateTime<Utc>,
}

impl CatalogItem {
    fn from_parts(entry: &CatalogEntryModel, product: &ProductModel) -> Self {
        Self {
            product_id: product.id,
            seller_id: product.seller_id,
            name: product.name.clone(),
            description: product.description.clone(),
            sku: product.sku.clone(),
            category: product.category.clone(),
            tags: product.tags.0.clone(),
            image_url: product.image_url.clone(),
            base_price: product.base_price,
            corporate_price: entry.corporate_price,
            effective_price: entry.effective_price(product.base_price),
            min_order_qty: entry.min_order_qty,
            max_order_qty: entry.max_order_qty,
            stock: product.stock,
            order_count: product.order_count,
            created_at: product.created_at,
        }
    }

    fn matches(&self, query: &CatalogQuery) -> bool {
        if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let needle = search.to_lowercase();
            let hit = self.name.to_lowercase().contains(&needle)
                || self.sku.to_lowercase().contains(&needle)
                || self
                    .description
                    .as_deref()
                    .map(|d| d.to_lowercase().contains(&needle))
                    .unwrap_or(false);
            if !hit {
                return false;
            }
        }
        if let Some(category) = query.category.as_deref() {
            if !self
                .category
                .as_deref()
                .map(|c| c.eq_ignore_ascii_case(category))
                .unwrap_or(false)
            {
                return false;
            }
        }
        if let Some(tag) = query.tag.as_deref() {
            if !self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
                return false;
            }
        }
        if let Some(min) = query.min_price {
            if self.effective_price < min {
                return false;
            }
        }
        if let Some(max) = query.max_price {
            if self.effective_price > max {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogPage {
    pub items: Vec<CatalogItem>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

/// Assembly-time view of one cart line after catalog checks
#[derive(Debug, Clone)]
pub struct ResolvedLine {
    pub product: ProductModel,
    pub quantity: i32,
    pub unit_price: Decimal,
}

/// Read-only lookups over the corporate catalog.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
    default_page_size: u64,
    max_page_size: u64,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>, commerce: &CommerceConfig) -> Self {
        Self {
            db,
            default_page_size: commerce.default_page_size,
            max_page_size: commerce.max_page_size,
        }
    }

    /// Filtered, sorted, paginated listing of purchasable catalog products.
    #[instrument(skip(self, buyer), fields(buyer_id = %buyer.id))]
    pub async fn list_catalog(
        &self,
        buyer: &BuyerPrincipal,
        query: CatalogQuery,
    ) -> Result<CatalogPage, ServiceError> {
        buyer.ensure_active()?;
        query.validate()?;

        let rows = CatalogEntry::find()
            .filter(catalog_entry::Column::IsActive.eq(true))
            .find_also_related(Product)
            .all(&*self.db)
            .await?;

        let mut items: Vec<CatalogItem> = rows
            .iter()
            .filter_map(|(entry, product)| {
                product
                    .as_ref()
                    .filter(|p| p.is_purchasable())
                    .map(|p| CatalogItem::from_parts(entry, p))
            })
            .filter(|item| item.matches(&query))
            .collect();

        sort_items(&mut items, query.sort);

        let limit = query
            .limit
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size);
        let page = query.page.unwrap_or(1).max(1);
        let total = items.len() as u64;

        let start = page.saturating_sub(1).saturating_mul(limit).min(total) as usize;
        let items: Vec<CatalogItem> = items.into_iter().skip(start).take(limit as usize).collect();

        debug!(total, page, limit, returned = items.len(), "catalog listed");
        Ok(CatalogPage {
            items,
            total,
            page,
            limit,
        })
    }

    #[instrument(skip(self, buyer), fields(buyer_id = %buyer.id))]
    pub async fn get_catalog_product(
        &self,
        buyer: &BuyerPrincipal,
        product_id: Uuid,
    ) -> Result<CatalogItem, ServiceError> {
        buyer.ensure_active()?;

        let (entry, product) = CatalogEntry::find()
            .filter(catalog_entry::Column::ProductId.eq(product_id))
            .filter(catalog_entry::Column::IsActive.eq(true))
            .find_also_related(Product)
            .one(&*self.db)
            .await?
            .ok_or(ServiceError::NotInCatalog(product_id))?;

        let product = product
            .filter(|p| p.is_active)
            .ok_or(ServiceError::NotInCatalog(product_id))?;

        Ok(CatalogItem::from_parts(&entry, &product))
    }

    /// Validate one cart line against the catalog and price it.
    pub async fn resolve_line(
        &self,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<ResolvedLine, ServiceError> {
        let entry = CatalogEntry::find()
            .filter(catalog_entry::Column::ProductId.eq(product_id))
            .one(&*self.db)
            .await?
            .filter(|e| e.is_active)
            .ok_or(ServiceError::NotInCatalog(product_id))?;

        entry
            .check_quantity(quantity)
            .map_err(|(bound, limit)| ServiceError::QuantityOutOfRange {
                product_id,
                requested: quantity,
                bound,
                limit,
            })?;

        let product = Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .filter(|p| p.is_active)
            .ok_or(ServiceError::ProductUnavailable(product_id))?;

        let unit_price = entry.effective_price(product.base_price);
        Ok(ResolvedLine {
            product,
            quantity,
            unit_price,
        })
    }
}

fn sort_items(items: &mut [CatalogItem], sort: CatalogSort) {
    match sort {
        CatalogSort::PriceAsc => items.sort_by(|a, b| {
            a.effective_price
                .cmp(&b.effective_price)
                .then_with(|| a.name.cmp(&b.name))
        }),
        CatalogSort::PriceDesc => items.sort_by(|a, b| {
            b.effective_price
                .cmp(&a.effective_price)
                .then_with(|| a.name.cmp(&b.name))
        }),
        CatalogSort::Popularity => {
            items.sort_by_key(|item| (Reverse(item.order_count), item.name.clone()))
        }
        CatalogSort::Newest => {
            items.sort_by_key(|item| (Reverse(item.created_at), item.name.clone()))
        }
    }
}
