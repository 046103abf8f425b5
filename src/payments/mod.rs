// src/payments/mod.rs

// Payment gateway seam.
//
// The provisioning engine only needs two things from a gateway: open a
// payment order, and list the transactions made against it. How those
// transactions settle into one outcome is decided here, not by the gateway.

pub mod cashfree;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use cashfree::CashfreeGateway;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("payment gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("payment gateway rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("payment gateway base URL is unusable: {0}")]
    BadBaseUrl(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Succeeded,
    Pending,
    Failed,
}

impl TransactionStatus {
    /// Maps a gateway status string. Unknown statuses count as failures.
    pub fn from_gateway(raw: &str) -> Self {
        match raw {
            "SUCCESS" => TransactionStatus::Succeeded,
            "PENDING" | "NOT_ATTEMPTED" => TransactionStatus::Pending,
            _ => TransactionStatus::Failed,
        }
    }
}

/// One payment attempt against an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub payment_id: String,
    pub status: TransactionStatus,
    /// Status exactly as the gateway reported it.
    pub raw_status: String,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Outcome of an order's transaction history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    Succeeded,
    Pending,
    /// Carries the gateway status that decided it.
    Failed(String),
}

/// Settles an order: any successful transaction wins, otherwise the most
/// recent transaction decides. An empty history is a failure.
pub fn settle(transactions: &[Transaction]) -> Settlement {
    if transactions
        .iter()
        .any(|t| t.status == TransactionStatus::Succeeded)
    {
        return Settlement::Succeeded;
    }

    match transactions.iter().max_by_key(|t| t.timestamp) {
        None => Settlement::Failed("no transactions".to_string()),
        Some(latest) => match latest.status {
            TransactionStatus::Pending => Settlement::Pending,
            _ => Settlement::Failed(latest.raw_status.clone()),
        },
    }
}

/// Customer and order data sent to the gateway when a payment is opened.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayOrderRequest {
    pub order_id: String,
    /// Minor currency units.
    pub amount: i64,
    pub currency: String,
    pub customer_id: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub championship_id: i64,
    pub examination_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayOrder {
    pub order_id: String,
    /// Handed to the client to complete payment with the gateway.
    pub payment_session_id: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(&self, request: &GatewayOrderRequest) -> Result<GatewayOrder, GatewayError>;

    async fn fetch_payments(&self, order_id: &str) -> Result<Vec<Transaction>, GatewayError>;
}
