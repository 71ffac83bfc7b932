//! Payment gateway boundary.
//!
//! The gateway is the remote authority on whether money moved. It is
//! eventually consistent and may deliver the same answer more than once, so
//! callers treat every response as a hint to re-check local state.

pub mod http;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

use crate::auth::BuyerPrincipal;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("gateway returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("unexpected gateway payload: {0}")]
    Decode(String),

    #[error("invalid gateway request: {0}")]
    InvalidRequest(String),

    #[error("gateway reports order {0} paid but lists no successful payment")]
    NoSuccessfulPayment(String),
}

/// Customer details the gateway attaches to a payment session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCustomer {
    pub id: String,
    pub email: String,
    pub phone: String,
    pub name: String,
}

impl From<&BuyerPrincipal> for SessionCustomer {
    fn from(buyer: &BuyerPrincipal) -> Self {
        Self {
            id: buyer.id.to_string(),
            email: buyer.email.clone(),
            phone: buyer.phone.clone(),
            name: buyer.company_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSession {
    pub gateway_order_id: String,
    pub payment_session_id: String,
}

/// Gateway-side view of an order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayOrderStatus {
    Active,
    Paid,
    Expired,
    Terminated,
    Other(String),
}

impl GatewayOrderStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "ACTIVE" => Self::Active,
            "PAID" => Self::Paid,
            "EXPIRED" => Self::Expired,
            "TERMINATED" => Self::Terminated,
            _ => Self::Other(raw.to_string()),
        }
    }

    pub fn is_paid(&self) -> bool {
        matches!(self, Self::Paid)
    }
}

impl fmt::Display for GatewayOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Paid => write!(f, "PAID"),
            Self::Expired => write!(f, "EXPIRED"),
            Self::Terminated => write!(f, "TERMINATED"),
            Self::Other(raw) => write!(f, "{}", raw),
        }
    }
}

/// One payment attempt recorded against a gateway order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayPayment {
    pub payment_id: String,
    pub status: String,
    pub amount: Decimal,
    pub paid_at: Option<DateTime<Utc>>,
}

impl GatewayPayment {
    pub fn is_success(&self) -> bool {
        self.status.eq_ignore_ascii_case("SUCCESS")
    }
}

/// Picks the authoritative payment: the most recent successful attempt.
/// Attempts without a timestamp rank below timestamped ones; ties fall to
/// the later entry in the list.
pub fn latest_successful(payments: &[GatewayPayment]) -> Option<&GatewayPayment> {
    payments
        .iter()
        .enumerate()
        .filter(|(_, p)| p.is_success())
        .max_by_key(|(idx, p)| (p.paid_at, *idx))
        .map(|(_, p)| p)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundReceipt {
    pub refund_id: String,
    pub status: String,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Register an order with the gateway and obtain the session the buyer
    /// completes payment in.
    async fn create_session(
        &self,
        gateway_order_id: &str,
        amount: Decimal,
        currency: &str,
        customer: &SessionCustomer,
    ) -> Result<PaymentSession, GatewayError>;

    async fn get_order_status(
        &self,
        gateway_order_id: &str,
    ) -> Result<GatewayOrderStatus, GatewayError>;

    async fn list_payments(
        &self,
        gateway_order_id: &str,
    ) -> Result<Vec<GatewayPayment>, GatewayError>;

    /// Refund against a gateway order. `refund_id` is the idempotency key;
    /// repeating it must not refund twice.
    async fn create_refund(
        &self,
        gateway_order_id: &str,
        amount: Decimal,
        refund_id: &str,
    ) -> Result<RefundReceipt, GatewayError>;
}
