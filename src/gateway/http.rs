use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::{
    GatewayError, GatewayOrderStatus, GatewayPayment, PaymentGateway, PaymentSession,
    RefundReceipt, SessionCustomer,
};
use crate::config::GatewayConfig;

/// REST client for a Cashfree-style payment gateway.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    client: Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    api_version: String,
    return_url: Option<String>,
}

#[derive(Serialize)]
struct CreateOrderBody<'a> {
    order_id: &'a str,
    order_amount: f64,
    order_currency: &'a str,
    customer_details: CustomerDetails<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    order_meta: Option<OrderMeta>,
}

#[derive(Serialize)]
struct CustomerDetails<'a> {
    customer_id: &'a str,
    customer_email: &'a str,
    customer_phone: &'a str,
    customer_name: &'a str,
}

#[derive(Serialize)]
struct OrderMeta {
    return_url: String,
}

#[derive(Deserialize)]
struct OrderResponse {
    order_status: String,
    #[serde(default)]
    payment_session_id: Option<String>,
}

#[derive(Deserialize)]
struct PaymentEntry {
    cf_payment_id: Value,
    payment_status: String,
    #[serde(default)]
    payment_amount: Option<f64>,
    #[serde(default)]
    payment_time: Option<String>,
}

#[derive(Serialize)]
struct RefundBody<'a> {
    refund_amount: f64,
    refund_id: &'a str,
    refund_note: &'a str,
}

#[derive(Deserialize)]
struct RefundResponse {
    refund_id: String,
    #[serde(default)]
    refund_status: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl HttpPaymentGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            api_version: config.api_version.clone(),
            return_url: config.return_url.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("x-client-id", &self.client_id)
            .header("x-client-secret", &self.client_secret)
            .header("x-api-version", &self.api_version)
            .header("accept", "application/json")
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, GatewayError> {
        self.authed(request).send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Transport("request timed out".to_string())
            } else {
                GatewayError::Transport(e.to_string())
            }
        })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, GatewayError> {
        let status = response.status();
        if !status.is_success() {
            return Err(Self::status_error(status, response).await);
        }
        response
            .json::<T>()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))
    }

    async fn status_error(status: StatusCode, response: Response) -> GatewayError {
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.message)
            .unwrap_or(text);
        GatewayError::Status {
            status: status.as_u16(),
            message,
        }
    }
}

fn amount_to_wire(amount: Decimal) -> Result<f64, GatewayError> {
    amount
        .round_dp(2)
        .to_f64()
        .ok_or_else(|| GatewayError::InvalidRequest(format!("amount {} not representable", amount)))
}

fn payment_id_from_wire(raw: &Value) -> Result<String, GatewayError> {
    match raw {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(GatewayError::Decode(format!("cf_payment_id: {}", other))),
    }
}

fn parse_payment_time(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|t| DateTime::parse_from_rfc3339(t).ok())
        .map(|t| t.with_timezone(&Utc))
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[instrument(skip(self, customer), fields(gateway_order_id = %gateway_order_id))]
    async fn create_session(
        &self,
        gateway_order_id: &str,
        amount: Decimal,
        currency: &str,
        customer: &SessionCustomer,
    ) -> Result<PaymentSession, GatewayError> {
        let body = CreateOrderBody {
            order_id: gateway_order_id,
            order_amount: amount_to_wire(amount)?,
            order_currency: currency,
            customer_details: CustomerDetails {
                customer_id: &customer.id,
                customer_email: &customer.email,
                customer_phone: &customer.phone,
                customer_name: &customer.name,
            },
            order_meta: self
                .return_url
                .as_deref()
                .map(|template| OrderMeta {
                    return_url: template.replace("{order_id}", gateway_order_id),
                }),
        };

        let response = self
            .send(self.client.post(self.url("/orders")).json(&body))
            .await?;
        let order: OrderResponse = Self::decode(response).await?;

        let payment_session_id = order.payment_session_id.ok_or_else(|| {
            GatewayError::Decode("response carries no payment_session_id".to_string())
        })?;
        debug!(status = %order.order_status, "payment session created");

        Ok(PaymentSession {
            gateway_order_id: gateway_order_id.to_string(),
            payment_session_id,
        })
    }

    #[instrument(skip(self))]
    async fn get_order_status(
        &self,
        gateway_order_id: &str,
    ) -> Result<GatewayOrderStatus, GatewayError> {
        let path = format!("/orders/{}", gateway_order_id);
        let response = self.send(self.client.get(self.url(&path))).await?;
        let order: OrderResponse = Self::decode(response).await?;
        Ok(GatewayOrderStatus::parse(&order.order_status))
    }

    #[instrument(skip(self))]
    async fn list_payments(
        &self,
        gateway_order_id: &str,
    ) -> Result<Vec<GatewayPayment>, GatewayError> {
        let path = format!("/orders/{}/payments", gateway_order_id);
        let response = self.send(self.client.get(self.url(&path))).await?;
        let entries: Vec<PaymentEntry> = Self::decode(response).await?;

        entries
            .into_iter()
            .map(|entry| {
                let amount = entry
                    .payment_amount
                    .and_then(|a| Decimal::try_from(a).ok())
                    .map(|a| a.round_dp(2))
                    .unwrap_or_default();
                Ok(GatewayPayment {
                    payment_id: payment_id_from_wire(&entry.cf_payment_id)?,
                    status: entry.payment_status,
                    amount,
                    paid_at: parse_payment_time(entry.payment_time.as_deref()),
                })
            })
            .collect()
    }

    #[instrument(skip(self), fields(amount = %amount))]
    async fn create_refund(
        &self,
        gateway_order_id: &str,
        amount: Decimal,
        refund_id: &str,
    ) -> Result<RefundReceipt, GatewayError> {
        let path = format!("/orders/{}/refunds", gateway_order_id);
        let body = RefundBody {
            refund_amount: amount_to_wire(amount)?,
            refund_id,
            refund_note: "Order cancelled",
        };

        let response = self
            .send(self.client.post(self.url(&path)).json(&body))
            .await?;

        if response.status() == StatusCode::CONFLICT {
            warn!(refund_id, "refund already registered with gateway");
            return Ok(RefundReceipt {
                refund_id: refund_id.to_string(),
                status: "DUPLICATE".to_string(),
            });
        }

        let refund: RefundResponse = Self::decode(response).await?;
        Ok(RefundReceipt {
            refund_id: refund.refund_id,
            status: refund.refund_status.unwrap_or_else(|| "PENDING".to_string()),
        })
    }
}
