use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use sea_orm::TransactionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::gateway::GatewayError;

/// Error body returned by every failing endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Conflict")
    pub error: String,
    /// Machine-readable error code
    pub code: String,
    /// Human-readable error description
    pub message: String,
    /// ISO 8601 timestamp when error occurred
    pub timestamp: String,
}

/// Which side of a catalog entry's quantity range a request breached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantityBound {
    Minimum,
    Maximum,
}

impl fmt::Display for QuantityBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuantityBound::Minimum => write!(f, "minimum"),
            QuantityBound::Maximum => write!(f, "maximum"),
        }
    }
}

/// Coarse classification used for propagation policy and HTTP mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Unauthorized,
    Forbidden,
    NotFound,
    StateConflict,
    Upstream,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Product {0} is not in the corporate catalog")]
    NotInCatalog(Uuid),

    #[error(
        "Quantity {requested} for product {product_id} breaches the {bound} order quantity of {limit}"
    )]
    QuantityOutOfRange {
        product_id: Uuid,
        requested: i32,
        bound: QuantityBound,
        limit: i32,
    },

    #[error("Product {0} is unavailable")]
    ProductUnavailable(Uuid),

    #[error("Quote {0} not found")]
    QuoteNotFound(Uuid),

    #[error("Quote {0} has expired")]
    QuoteExpired(Uuid),

    #[error("No orders found for gateway order {0}")]
    NoMatchingOrders(String),

    #[error("Payment not complete: gateway reports {0}")]
    PaymentNotComplete(String),

    #[error("Cannot {action} an order in status {current}")]
    InvalidStateTransition { current: String, action: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl From<TransactionError<ServiceError>> for ServiceError {
    fn from(err: TransactionError<ServiceError>) -> Self {
        match err {
            TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
            TransactionError::Transaction(service_err) => service_err,
        }
    }
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ValidationError(_) | Self::QuantityOutOfRange { .. } => ErrorKind::Validation,
            Self::NotFound(_)
            | Self::NotInCatalog(_)
            | Self::ProductUnavailable(_)
            | Self::QuoteNotFound(_)
            | Self::NoMatchingOrders(_) => ErrorKind::NotFound,
            Self::QuoteExpired(_)
            | Self::PaymentNotComplete(_)
            | Self::InvalidStateTransition { .. } => ErrorKind::StateConflict,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::Gateway(_) => ErrorKind::Upstream,
            Self::DatabaseError(_) | Self::InternalError(_) => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable code for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DatabaseError(_) => "database_error",
            Self::ValidationError(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::NotInCatalog(_) => "not_in_catalog",
            Self::QuantityOutOfRange { .. } => "quantity_out_of_range",
            Self::ProductUnavailable(_) => "product_unavailable",
            Self::QuoteNotFound(_) => "quote_not_found",
            Self::QuoteExpired(_) => "quote_expired",
            Self::NoMatchingOrders(_) => "no_matching_orders",
            Self::PaymentNotComplete(_) => "payment_not_complete",
            Self::InvalidStateTransition { .. } => "invalid_state_transition",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::Gateway(_) => "gateway_error",
            Self::InternalError(_) => "internal_error",
        }
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::StateConflict => StatusCode::CONFLICT,
            ErrorKind::Upstream => StatusCode::BAD_GATEWAY,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::InternalError(_) => "Internal server error".to_string(),
            Self::Gateway(_) => "Payment gateway unavailable".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            code: self.code().to_string(),
            message: self.response_message(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn service_error_status_code_mapping() {
        assert_eq!(
            ServiceError::ValidationError("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::QuantityOutOfRange {
                product_id: Uuid::nil(),
                requested: 1,
                bound: QuantityBound::Minimum,
                limit: 2,
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::NotInCatalog(Uuid::nil()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::InvalidStateTransition {
                current: "cancelled".into(),
                action: "cancel".into(),
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::PaymentNotComplete("ACTIVE".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::Gateway(GatewayError::Transport("timeout".into())).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ServiceError::Forbidden("suspended".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServiceError::InternalError("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn quantity_error_names_the_bound() {
        let err = ServiceError::QuantityOutOfRange {
            product_id: Uuid::nil(),
            requested: 11,
            bound: QuantityBound::Maximum,
            limit: 10,
        };
        let message = err.to_string();
        assert!(message.contains("maximum"));
        assert!(message.contains("10"));
    }

    #[test]
    fn response_message_hides_internal_details() {
        assert_eq!(
            ServiceError::InternalError("sensitive".into()).response_message(),
            "Internal server error"
        );
        assert_eq!(
            ServiceError::DatabaseError(DbErr::Custom("password=hunter2".into()))
                .response_message(),
            "Database error"
        );
        assert_eq!(
            ServiceError::NotFound("Order not found".into()).response_message(),
            "Not found: Order not found"
        );
    }

    #[tokio::test]
    async fn into_response_renders_code_and_message() {
        let response = ServiceError::QuoteExpired(Uuid::nil()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload.code, "quote_expired");
        assert_eq!(payload.error, "Conflict");
    }
}
