//! B2B Commerce API Library
//!
//! Order lifecycle and payment reconciliation for the corporate buying
//! channel: catalog lookup, multi-seller checkout, quote conversion, payment
//! verification, cancellation and refund.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod handlers;
pub mod ids;
pub mod metrics;
pub mod migrator;
pub mod notifications;
pub mod repositories;
pub mod services;

use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::auth::TokenVerifier;
use crate::services::Services;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub services: Services,
    pub tokens: TokenVerifier,
}

/// Envelope for every successful response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResponseMeta {
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            meta: Some(ResponseMeta::capture()),
        }
    }
}

/// Upper bound on a request, gateway round-trips included
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Buyer-facing routes, mounted under `/api/v1`
pub fn api_v1_routes() -> Router<AppState> {
    let catalog = Router::new()
        .route("/catalog", get(handlers::catalog::list_catalog))
        .route(
            "/catalog/:product_id",
            get(handlers::catalog::get_catalog_product),
        );

    let orders = Router::new()
        .route(
            "/orders",
            get(handlers::orders::list_orders).post(handlers::orders::place_order),
        )
        .route("/orders/:id", get(handlers::orders::get_order))
        .route("/orders/:id/cancel", post(handlers::orders::cancel_order))
        .route(
            "/orders/:id/refund/retry",
            post(handlers::orders::retry_refund),
        )
        .route(
            "/payments/:gateway_order_id/verify",
            post(handlers::orders::verify_payment),
        );

    let quotes = Router::new()
        .route("/quotes", get(handlers::quotes::list_quotes))
        .route("/quotes/:id", get(handlers::quotes::get_quote))
        .route("/quotes/:id/convert", post(handlers::quotes::convert_quote))
        .route("/quotes/:id/reject", post(handlers::quotes::reject_quote));

    Router::new().merge(catalog).merge(orders).merge(quotes)
}

/// Full application router with telemetry layers applied.
pub fn build_router(state: AppState) -> Router {
    Router::<AppState>::new()
        .route(
            "/metrics",
            get(|| async move {
                match metrics::render() {
                    Ok(body) => (StatusCode::OK, body),
                    Err(_) => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        String::from("metrics error"),
                    ),
                }
            }),
        )
        .nest("/api/v1", api_v1_routes())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}
