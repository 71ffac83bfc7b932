use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter};
use tracing::debug;
use uuid::Uuid;

use crate::entities::product::{Column, Entity as Product};

/// Take `quantity` units off the shelf and count them as sold, but only if at
/// least that many are on hand. Returns `false` when stock is short or the
/// product does not exist; nothing is changed in that case.
pub async fn decrement_if_at_least<C>(db: &C, product_id: Uuid, quantity: i32) -> Result<bool, DbErr>
where
    C: ConnectionTrait,
{
    if quantity <= 0 {
        return Ok(false);
    }

    let result = Product::update_many()
        .col_expr(Column::Stock, Expr::col(Column::Stock).sub(quantity))
        .col_expr(Column::OrderCount, Expr::col(Column::OrderCount).add(quantity))
        .col_expr(Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(Column::Id.eq(product_id))
        .filter(Column::Stock.gte(quantity))
        .exec(db)
        .await?;

    debug!(%product_id, quantity, rows = result.rows_affected, "conditional stock decrement");
    Ok(result.rows_affected == 1)
}

/// Put `quantity` units back and reverse their sale count. Unconditional;
/// returns `false` only when the product row is gone.
pub async fn restore<C>(db: &C, product_id: Uuid, quantity: i32) -> Result<bool, DbErr>
where
    C: ConnectionTrait,
{
    if quantity <= 0 {
        return Ok(false);
    }

    let result = Product::update_many()
        .col_expr(Column::Stock, Expr::col(Column::Stock).add(quantity))
        .col_expr(Column::OrderCount, Expr::col(Column::OrderCount).sub(quantity))
        .col_expr(Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(Column::Id.eq(product_id))
        .exec(db)
        .await?;

    debug!(%product_id, quantity, rows = result.rows_affected, "stock restored");
    Ok(result.rows_affected == 1)
}
