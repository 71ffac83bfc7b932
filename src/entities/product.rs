use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};

/// Seller product. `stock` and `order_count` are only ever changed through
/// the conditional statements in `repositories::product_stock`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Fulfilling seller
    pub seller_id: Uuid,

    pub name: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    #[sea_orm(unique)]
    pub sku: String,

    pub category: Option<String>,

    #[sea_orm(column_type = "Json")]
    pub tags: ProductTags,

    /// List price used when the catalog entry carries no corporate price
    #[sea_orm(column_type = "Decimal(Some((16, 2)))")]
    pub base_price: Decimal,

    /// Units on hand, never negative
    pub stock: i32,

    /// Units sold through confirmed orders
    pub order_count: i32,

    pub is_active: bool,

    pub image_url: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::catalog_entry::Entity")]
    CatalogEntry,
}

impl Related<super::catalog_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CatalogEntry.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Free-form merchandising tags
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct ProductTags(pub Vec<String>);

impl ProductTags {
    pub fn contains_ignore_case(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

impl Model {
    pub fn is_purchasable(&self) -> bool {
        self.is_active && self.stock > 0
    }
}
