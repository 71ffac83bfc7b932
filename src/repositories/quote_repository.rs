use chrono::Utc;
use sea_orm::sea_query::{Condition, Expr, Func};
use sea_orm::{
    ActiveValue::Set, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
};
use uuid::Uuid;

use crate::entities::quote::{
    ActiveModel as QuoteActiveModel, Column, Entity as Quote, Model as QuoteModel, QuoteStatus,
};

/// Quotes addressed to a buyer by account id or contact email, newest first.
pub async fn list_addressed_to<C>(
    db: &C,
    buyer_id: Uuid,
    buyer_email: &str,
) -> Result<Vec<QuoteModel>, DbErr>
where
    C: ConnectionTrait,
{
    Quote::find()
        .filter(
            Condition::any()
                .add(Column::BuyerId.eq(buyer_id))
                .add(
                    Expr::expr(Func::lower(Expr::col(Column::ContactEmail)))
                        .eq(buyer_email.to_lowercase()),
                ),
        )
        .order_by_desc(Column::CreatedAt)
        .all(db)
        .await
}

/// Move a quote out of `sent`. Returns `true` only for the caller whose
/// statement performed the transition.
pub async fn transition_from_sent<C>(
    db: &C,
    quote_id: Uuid,
    to: QuoteStatus,
    converted_order_id: Option<Uuid>,
) -> Result<bool, DbErr>
where
    C: ConnectionTrait,
{
    let mut changes = QuoteActiveModel {
        status: Set(to),
        updated_at: Set(Utc::now()),
        ..Default::default()
    };
    if let Some(order_id) = converted_order_id {
        changes.converted_order_id = Set(Some(order_id));
    }

    let result = Quote::update_many()
        .set(changes)
        .filter(Column::Id.eq(quote_id))
        .filter(Column::Status.eq(QuoteStatus::Sent))
        .exec(db)
        .await?;

    Ok(result.rows_affected == 1)
}
