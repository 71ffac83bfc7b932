use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use uuid::Uuid;

use super::AuthenticatedBuyer;
use crate::{
    errors::ServiceError,
    services::catalog::{CatalogItem, CatalogPage, CatalogQuery},
    ApiResponse, AppState,
};

/// List purchasable catalog products
pub async fn list_catalog(
    State(state): State<AppState>,
    AuthenticatedBuyer(buyer): AuthenticatedBuyer,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<ApiResponse<CatalogPage>>, ServiceError> {
    let page = state.services.catalog.list_catalog(&buyer, query).await?;
    Ok(Json(ApiResponse::success(page)))
}

pub async fn get_catalog_product(
    State(state): State<AppState>,
    AuthenticatedBuyer(buyer): AuthenticatedBuyer,
    Path(product_id): Path<Uuid>,
) -> Result<Json<ApiResponse<CatalogItem>>, ServiceError> {
    let item = state
        .services
        .catalog
        .get_catalog_product(&buyer, product_id)
        .await?;
    Ok(Json(ApiResponse::success(item)))
}
