use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::QuantityBound;

/// Corporate pricing and order-quantity constraints for one product.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "catalog_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique)]
    pub product_id: Uuid,

    /// Negotiated price; overrides the product's base price when present
    #[sea_orm(column_type = "Decimal(Some((16, 2)))", nullable)]
    pub corporate_price: Option<Decimal>,

    /// Inclusive lower bound on quantity per order
    pub min_order_qty: i32,

    /// Inclusive upper bound on quantity per order
    pub max_order_qty: i32,

    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn effective_price(&self, base_price: Decimal) -> Decimal {
        self.corporate_price.unwrap_or(base_price)
    }

    /// Returns the breached bound and its limit when `quantity` falls outside
    /// `[min_order_qty, max_order_qty]`.
    pub fn check_quantity(&self, quantity: i32) -> Result<(), (QuantityBound, i32)> {
        if quantity < self.min_order_qty {
            return Err((QuantityBound::Minimum, self.min_order_qty));
        }
        if quantity > self.max_order_qty {
            return Err((QuantityBound::Maximum, self.max_order_qty));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn entry(price: Option<Decimal>) -> Model {
        let now = Utc::now();
        Model {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            corporate_price: price,
            min_order_qty: 2,
            max_order_qty: 10,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[rstest]
    #[case(1, Err((QuantityBound::Minimum, 2)))]
    #[case(2, Ok(()))]
    #[case(5, Ok(()))]
    #[case(10, Ok(()))]
    #[case(11, Err((QuantityBound::Maximum, 10)))]
    fn quantity_range_is_inclusive(
        #[case] quantity: i32,
        #[case] expected: Result<(), (QuantityBound, i32)>,
    ) {
        assert_eq!(entry(None).check_quantity(quantity), expected);
    }

    #[test]
    fn corporate_price_overrides_base_price() {
        assert_eq!(entry(Some(dec!(100))).effective_price(dec!(120)), dec!(100));
        assert_eq!(entry(None).effective_price(dec!(120)), dec!(120));
    }
}
