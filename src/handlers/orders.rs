use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use uuid::Uuid;

use super::AuthenticatedBuyer;
use crate::{
    entities::OrderModel,
    errors::ServiceError,
    services::{
        cancellation::{CancelOrderRequest, CancellationOutcome},
        checkout::{CheckoutReceipt, PlaceOrderRequest},
        orders::{OrderListQuery, OrderPage},
        reconciliation::ReconciliationOutcome,
    },
    ApiResponse, AppState,
};

/// Place a direct order from a cart
pub async fn place_order(
    State(state): State<AppState>,
    AuthenticatedBuyer(buyer): AuthenticatedBuyer,
    Json(request): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CheckoutReceipt>>), ServiceError> {
    let receipt = state.services.checkout.place_order(&buyer, request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(receipt))))
}

pub async fn list_orders(
    State(state): State<AppState>,
    AuthenticatedBuyer(buyer): AuthenticatedBuyer,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<ApiResponse<OrderPage>>, ServiceError> {
    let page = state.services.orders.list_orders(&buyer, query).await?;
    Ok(Json(ApiResponse::success(page)))
}

pub async fn get_order(
    State(state): State<AppState>,
    AuthenticatedBuyer(buyer): AuthenticatedBuyer,
    Path(order_id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderModel>>, ServiceError> {
    let order = state.services.orders.get_order(&buyer, order_id).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Confirm every order of a checkout after the buyer paid
pub async fn verify_payment(
    State(state): State<AppState>,
    AuthenticatedBuyer(buyer): AuthenticatedBuyer,
    Path(gateway_order_id): Path<String>,
) -> Result<Json<ApiResponse<ReconciliationOutcome>>, ServiceError> {
    let outcome = state
        .services
        .reconciliation
        .verify_payment(&buyer, &gateway_order_id)
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    AuthenticatedBuyer(buyer): AuthenticatedBuyer,
    Path(order_id): Path<Uuid>,
    body: Option<Json<CancelOrderRequest>>,
) -> Result<Json<ApiResponse<CancellationOutcome>>, ServiceError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let outcome = state
        .services
        .cancellation
        .cancel_order(&buyer, order_id, request)
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}

pub async fn retry_refund(
    State(state): State<AppState>,
    AuthenticatedBuyer(buyer): AuthenticatedBuyer,
    Path(order_id): Path<Uuid>,
) -> Result<Json<ApiResponse<CancellationOutcome>>, ServiceError> {
    let outcome = state
        .services
        .cancellation
        .retry_refund(&buyer, order_id)
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}
