use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};

/// Seller-authored price proposal addressed to a corporate buyer.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "quotes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique)]
    pub quote_number: String,

    pub seller_id: Uuid,

    /// Registered buyer the quote was raised for, if any
    pub buyer_id: Option<Uuid>,

    /// Contact email declared on the quote request
    pub contact_email: String,

    #[sea_orm(column_type = "Json")]
    pub items: QuoteItems,

    #[sea_orm(column_type = "Decimal(Some((16, 2)))")]
    pub total_amount: Decimal,

    /// Amount the buyer pays after seller adjustments
    #[sea_orm(column_type = "Decimal(Some((16, 2)))")]
    pub final_amount: Decimal,

    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,

    pub valid_until: DateTime<Utc>,

    pub status: QuoteStatus,

    pub converted_order_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteLineItem {
    pub product_id: Uuid,
    pub name: String,
    pub sku: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct QuoteItems(pub Vec<QuoteLineItem>);

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum QuoteStatus {
    #[sea_orm(string_value = "sent")]
    Sent,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    #[sea_orm(string_value = "expired")]
    Expired,
    #[sea_orm(string_value = "converted")]
    Converted,
}

impl Model {
    /// A quote is addressed to a buyer by account id or by declared contact email.
    pub fn is_addressed_to(&self, buyer_id: Uuid, buyer_email: &str) -> bool {
        self.buyer_id == Some(buyer_id) || self.contact_email.eq_ignore_ascii_case(buyer_email)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.valid_until < now
    }
}
