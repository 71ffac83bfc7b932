pub mod catalog;
pub mod orders;
pub mod quotes;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::debug;

use crate::{
    auth::{load_principal, BuyerPrincipal},
    errors::ServiceError,
    AppState,
};

/// Buyer resolved from the request's bearer token.
#[derive(Debug, Clone)]
pub struct AuthenticatedBuyer(pub BuyerPrincipal);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedBuyer {
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ServiceError::Unauthorized("missing bearer token".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ServiceError::Unauthorized("malformed authorization header".to_string()))?;

        let buyer_id = state.tokens.verify(token)?;
        let principal = load_principal(&*state.db, buyer_id).await?;
        debug!(buyer_id = %principal.id, "request authenticated");

        Ok(AuthenticatedBuyer(principal))
    }
}
