use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use uuid::Uuid;

use super::AuthenticatedBuyer;
use crate::{
    entities::QuoteModel,
    errors::ServiceError,
    services::quotes::{ConvertQuoteRequest, QuoteConversion},
    ApiResponse, AppState,
};

pub async fn list_quotes(
    State(state): State<AppState>,
    AuthenticatedBuyer(buyer): AuthenticatedBuyer,
) -> Result<Json<ApiResponse<Vec<QuoteModel>>>, ServiceError> {
    let quotes = state.services.quotes.list_quotes(&buyer).await?;
    Ok(Json(ApiResponse::success(quotes)))
}

pub async fn get_quote(
    State(state): State<AppState>,
    AuthenticatedBuyer(buyer): AuthenticatedBuyer,
    Path(quote_id): Path<Uuid>,
) -> Result<Json<ApiResponse<QuoteModel>>, ServiceError> {
    let quote = state.services.quotes.get_quote(&buyer, quote_id).await?;
    Ok(Json(ApiResponse::success(quote)))
}

/// Approve a quote and open its payment session
pub async fn convert_quote(
    State(state): State<AppState>,
    AuthenticatedBuyer(buyer): AuthenticatedBuyer,
    Path(quote_id): Path<Uuid>,
    body: Option<Json<ConvertQuoteRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<QuoteConversion>>), ServiceError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let conversion = state
        .services
        .quotes
        .convert_quote(&buyer, quote_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(conversion))))
}

pub async fn reject_quote(
    State(state): State<AppState>,
    AuthenticatedBuyer(buyer): AuthenticatedBuyer,
    Path(quote_id): Path<Uuid>,
) -> Result<Json<ApiResponse<QuoteModel>>, ServiceError> {
    let quote = state.services.quotes.reject_quote(&buyer, quote_id).await?;
    Ok(Json(ApiResponse::success(quote)))
}
