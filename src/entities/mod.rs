//! Persisted records of the corporate commerce channel.

pub mod buyer;
pub mod catalog_entry;
pub mod order;
pub mod product;
pub mod quote;

use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use validator::Validate;

pub use buyer::{BuyerStatus, Entity as Buyer, Model as BuyerModel};
pub use catalog_entry::{Entity as CatalogEntry, Model as CatalogEntryModel};
pub use order::{
    Entity as Order, LineItems, Model as OrderModel, OrderLineItem, OrderStatus, OrderType,
    PaymentStatus,
};
pub use product::{Entity as Product, Model as ProductModel};
pub use quote::{Entity as Quote, Model as QuoteModel, QuoteLineItem, QuoteStatus};

/// Postal destination stored as JSON on orders and buyer accounts.
#[derive(
    Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Validate, FromJsonQueryResult,
)]
pub struct ShippingAddress {
    #[validate(length(min = 1, max = 120, message = "Contact name is required"))]
    pub contact_name: String,
    #[validate(length(min = 6, max = 20, message = "Phone must be between 6 and 20 characters"))]
    pub phone: String,
    #[validate(length(min = 1, max = 255, message = "Address line 1 is required"))]
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    #[validate(length(min = 1, max = 100, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 1, max = 100, message = "State is required"))]
    pub state: String,
    #[validate(length(min = 3, max = 12, message = "Postal code is invalid"))]
    pub postal_code: String,
    #[validate(length(min = 2, max = 2, message = "Country must be a 2-letter code"))]
    pub country: String,
}
