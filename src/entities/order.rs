use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};

use super::ShippingAddress;

/// One seller's share of a checkout. Every order minted by the same checkout
/// or quote approval carries the same `gateway_order_id`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique)]
    pub order_number: String,

    pub order_type: OrderType,

    pub buyer_id: Uuid,
    pub buyer_email: String,
    pub buyer_phone: String,
    pub buyer_company: String,

    pub seller_id: Uuid,

    /// Source quote for quote-derived orders
    pub quote_id: Option<Uuid>,

    #[sea_orm(column_type = "Json")]
    pub items: LineItems,

    #[sea_orm(column_type = "Json")]
    pub shipping_address: ShippingAddress,

    #[sea_orm(column_type = "Decimal(Some((16, 2)))")]
    pub item_total: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 2)))")]
    pub shipping_cost: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 2)))")]
    pub discount_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 2)))")]
    pub grand_total: Decimal,

    /// Always zero on the corporate channel; kept for payout reporting
    #[sea_orm(column_type = "Decimal(Some((16, 2)))")]
    pub commission_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 2)))")]
    pub platform_fee: Decimal,

    pub currency: String,

    pub status: OrderStatus,
    pub payment_status: PaymentStatus,

    pub gateway_order_id: String,
    pub payment_session_id: Option<String>,
    pub gateway_payment_id: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,

    pub cancellation_reason: Option<String>,
    pub refund_id: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Price snapshot of one product at order time
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineItem {
    pub product_id: Uuid,
    pub name: String,
    pub sku: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    /// Set when payment confirmation took this line's units off the shelf
    #[serde(default)]
    pub stock_applied: bool,
}

impl OrderLineItem {
    pub fn new(
        product_id: Uuid,
        name: String,
        sku: Option<String>,
        image_url: Option<String>,
        quantity: i32,
        unit_price: Decimal,
    ) -> Self {
        Self {
            product_id,
            name,
            sku,
            image_url,
            quantity,
            unit_price,
            line_total: unit_price * Decimal::from(quantity),
            stock_applied: false,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct LineItems(pub Vec<OrderLineItem>);

impl LineItems {
    pub fn total(&self) -> Decimal {
        self.0.iter().map(|item| item.line_total).sum()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, OrderLineItem> {
        self.0.iter()
    }

    /// Lines whose units were drawn from stock and must go back on cancel
    pub fn applied(&self) -> impl Iterator<Item = &OrderLineItem> {
        self.0.iter().filter(|item| item.stock_applied)
    }
}

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
pub enum OrderType {
    #[sea_orm(string_value = "direct")]
    Direct,
    #[sea_orm(string_value = "quote")]
    Quote,
}

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
pub enum OrderStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "confirmed")]
    Confirmed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl OrderStatus {
    pub fn is_cancellable(self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Confirmed)
    }
}

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
pub enum PaymentStatus {
    #[sea_orm(string_value = "unpaid")]
    Unpaid,
    #[sea_orm(string_value = "paid")]
    Paid,
    #[sea_orm(string_value = "refund_pending")]
    RefundPending,
    #[sea_orm(string_value = "refunded")]
    Refunded,
}
