use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue::Set, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder,
};
use uuid::Uuid;

use crate::entities::order::{
    ActiveModel as OrderActiveModel, Column, Entity as Order, LineItems, Model as OrderModel,
    OrderStatus, PaymentStatus,
};

/// Find an order owned by `buyer_id`
pub async fn find_for_buyer<C>(
    db: &C,
    order_id: Uuid,
    buyer_id: Uuid,
) -> Result<Option<OrderModel>, DbErr>
where
    C: ConnectionTrait,
{
    Order::find_by_id(order_id)
        .filter(Column::BuyerId.eq(buyer_id))
        .one(db)
        .await
}

/// Every order the buyer holds under one gateway order id
pub async fn find_by_gateway_order<C>(
    db: &C,
    gateway_order_id: &str,
    buyer_id: Uuid,
) -> Result<Vec<OrderModel>, DbErr>
where
    C: ConnectionTrait,
{
    Order::find()
        .filter(Column::GatewayOrderId.eq(gateway_order_id))
        .filter(Column::BuyerId.eq(buyer_id))
        .order_by_asc(Column::CreatedAt)
        .order_by_asc(Column::OrderNumber)
        .all(db)
        .await
}

/// Newest-first page of the buyer's orders with the total count.
/// `page` is 1-based.
pub async fn list_for_buyer<C>(
    db: &C,
    buyer_id: Uuid,
    page: u64,
    page_size: u64,
) -> Result<(Vec<OrderModel>, u64), DbErr>
where
    C: ConnectionTrait,
{
    let paginator = Order::find()
        .filter(Column::BuyerId.eq(buyer_id))
        .order_by_desc(Column::CreatedAt)
        .paginate(db, page_size);

    let total = paginator.num_items().await?;
    let orders = paginator.fetch_page(page.saturating_sub(1)).await?;

    Ok((orders, total))
}

/// Back-fill the payment session onto every order of a checkout.
pub async fn attach_session<C>(
    db: &C,
    gateway_order_id: &str,
    payment_session_id: &str,
) -> Result<u64, DbErr>
where
    C: ConnectionTrait,
{
    let result = Order::update_many()
        .set(OrderActiveModel {
            payment_session_id: Set(Some(payment_session_id.to_string())),
            updated_at: Set(Utc::now()),
            ..Default::default()
        })
        .filter(Column::GatewayOrderId.eq(gateway_order_id))
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}

/// `pending/unpaid -> confirmed/paid`. Returns `true` only for the caller
/// whose statement performed the transition.
pub async fn mark_paid<C>(
    db: &C,
    order_id: Uuid,
    gateway_payment_id: &str,
    paid_at: DateTime<Utc>,
) -> Result<bool, DbErr>
where
    C: ConnectionTrait,
{
    let result = Order::update_many()
        .set(OrderActiveModel {
            status: Set(OrderStatus::Confirmed),
            payment_status: Set(PaymentStatus::Paid),
            gateway_payment_id: Set(Some(gateway_payment_id.to_string())),
            paid_at: Set(Some(paid_at)),
            updated_at: Set(Utc::now()),
            ..Default::default()
        })
        .filter(Column::Id.eq(order_id))
        .filter(Column::Status.eq(OrderStatus::Pending))
        .filter(Column::PaymentStatus.eq(PaymentStatus::Unpaid))
        .exec(db)
        .await?;

    Ok(result.rows_affected == 1)
}

/// Persist which lines confirmation drew from stock. Called inside the
/// confirming transaction, right after `mark_paid` won.
pub async fn record_stock_applied<C>(db: &C, order_id: Uuid, items: LineItems) -> Result<(), DbErr>
where
    C: ConnectionTrait,
{
    Order::update_many()
        .set(OrderActiveModel {
            items: Set(items),
            ..Default::default()
        })
        .filter(Column::Id.eq(order_id))
        .filter(Column::Status.eq(OrderStatus::Confirmed))
        .exec(db)
        .await?;

    Ok(())
}

/// `pending|confirmed -> cancelled`, stamping time and reason. The row must
/// still carry the status pair the caller decided on, so a payment landing
/// in between makes this lose instead of cancelling a paid order unrefunded.
pub async fn mark_cancelled<C>(
    db: &C,
    order_id: Uuid,
    expected: (OrderStatus, PaymentStatus),
    reason: &str,
    cancelled_at: DateTime<Utc>,
) -> Result<bool, DbErr>
where
    C: ConnectionTrait,
{
    let (expected_status, expected_payment) = expected;
    if !expected_status.is_cancellable() {
        return Ok(false);
    }

    let result = Order::update_many()
        .set(OrderActiveModel {
            status: Set(OrderStatus::Cancelled),
            cancelled_at: Set(Some(cancelled_at)),
            cancellation_reason: Set(Some(reason.to_string())),
            updated_at: Set(cancelled_at),
            ..Default::default()
        })
        .filter(Column::Id.eq(order_id))
        .filter(Column::Status.eq(expected_status))
        .filter(Column::PaymentStatus.eq(expected_payment))
        .exec(db)
        .await?;

    Ok(result.rows_affected == 1)
}

/// Record the result of a refund attempt on a cancelled order that was paid
/// or is still waiting on a refund.
pub async fn set_refund_outcome<C>(
    db: &C,
    order_id: Uuid,
    outcome: PaymentStatus,
    refund_id: &str,
) -> Result<bool, DbErr>
where
    C: ConnectionTrait,
{
    let result = Order::update_many()
        .set(OrderActiveModel {
            payment_status: Set(outcome),
            refund_id: Set(Some(refund_id.to_string())),
            updated_at: Set(Utc::now()),
            ..Default::default()
        })
        .filter(Column::Id.eq(order_id))
        .filter(Column::Status.eq(OrderStatus::Cancelled))
        .filter(
            Column::PaymentStatus.is_in([PaymentStatus::Paid, PaymentStatus::RefundPending]),
        )
        .exec(db)
        .await?;

    Ok(result.rows_affected == 1)
}
