// src/payments/cashfree.rs

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use url::Url;

use super::{
    GatewayError, GatewayOrder, GatewayOrderRequest, PaymentGateway, Transaction,
    TransactionStatus,
};
use crate::config::PaymentConfig;

/// Cashfree PG client (`/orders` API).
#[derive(Clone)]
pub struct CashfreeGateway {
    http: Client,
    base_url: Url,
    client_id: String,
    client_secret: String,
    api_version: String,
}

#[derive(Debug, Serialize)]
struct CreateOrderBody<'a> {
    order_id: &'a str,
    /// Major currency units.
    order_amount: f64,
    order_currency: &'a str,
    customer_details: CustomerDetails<'a>,
    order_note: String,
    order_tags: HashMap<&'static str, String>,
}

#[derive(Debug, Serialize)]
struct CustomerDetails<'a> {
    customer_id: &'a str,
    customer_name: &'a str,
    customer_email: &'a str,
    customer_phone: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateOrderReply {
    order_id: String,
    payment_session_id: String,
}

#[derive(Debug, Deserialize)]
struct PaymentEntity {
    #[serde(default)]
    cf_payment_id: serde_json::Value,
    payment_status: String,
    #[serde(default)]
    payment_time: Option<DateTime<Utc>>,
}

impl From<PaymentEntity> for Transaction {
    fn from(entity: PaymentEntity) -> Self {
        let payment_id = match entity.cf_payment_id {
            serde_json::Value::String(id) => id,
            other => other.to_string(),
        };
        Transaction {
            payment_id,
            status: TransactionStatus::from_gateway(&entity.payment_status),
            raw_status: entity.payment_status,
            timestamp: entity.payment_time,
        }
    }
}

impl CashfreeGateway {
    pub fn new(config: &PaymentConfig, timeout: Duration) -> Result<Self, GatewayError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| GatewayError::BadBaseUrl(format!("{}: {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(GatewayError::BadBaseUrl(config.base_url.clone()));
        }

        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            api_version: config.api_version.clone(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::BadBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("x-client-id", &self.client_id)
            .header("x-client-secret", &self.client_secret)
            .header("x-api-version", &self.api_version)
            .header("Accept", "application/json")
    }
}

/// Turns a non-2xx reply into `Rejected`, keeping the body for the logs.
async fn accepted(response: Response) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::error!("Cashfree returned {}: {}", status, body);
    Err(GatewayError::Rejected {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl PaymentGateway for CashfreeGateway {
    async fn create_order(&self, request: &GatewayOrderRequest) -> Result<GatewayOrder, GatewayError> {
        let examination_ids = request
            .examination_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let body = CreateOrderBody {
            order_id: &request.order_id,
            order_amount: request.amount as f64 / 100.0,
            order_currency: &request.currency,
            customer_details: CustomerDetails {
                customer_id: &request.customer_id,
                customer_name: &request.customer_name,
                customer_email: &request.customer_email,
                customer_phone: &request.customer_phone,
            },
            order_note: format!("order#{}", Utc::now().format("%H:%M:%S")),
            order_tags: HashMap::from([
                ("championship", request.championship_id.to_string()),
                ("examination_ids", examination_ids),
            ]),
        };

        let response = self
            .authorized(self.http.post(self.endpoint(&["orders"])?))
            .json(&body)
            .send()
            .await?;

        let reply: CreateOrderReply = accepted(response).await?.json().await?;
        tracing::info!("Cashfree order {} opened", reply.order_id);

        Ok(GatewayOrder {
            order_id: reply.order_id,
            payment_session_id: reply.payment_session_id,
        })
    }

    async fn fetch_payments(&self, order_id: &str) -> Result<Vec<Transaction>, GatewayError> {
        let url = self.endpoint(&["orders", order_id, "payments"])?;
        let response = self.authorized(self.http.get(url)).send().await?;

        let payments: Vec<PaymentEntity> = accepted(response).await?.json().await?;
        tracing::debug!("Cashfree order {} has {} payments", order_id, payments.len());

        Ok(payments.into_iter().map(Transaction::from).collect())
    }
}
