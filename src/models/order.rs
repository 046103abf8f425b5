// src/models/order.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::profile::ProfileFields;

/// DTO for pricing an order before it is placed.
#[derive(Debug, Deserialize, Validate)]
pub struct CalculateOrderRequest {
    pub championship_id: i64,
    #[validate(length(min = 1, message = "Select at least one examination"))]
    pub examination_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAmount {
    /// Minor currency units.
    pub amount: i64,
    pub notes: String,
}

/// DTO for placing an order.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    pub championship_id: i64,
    #[validate(length(min = 1, message = "Select at least one examination"))]
    pub examination_ids: Vec<i64>,
    #[validate(nested)]
    pub profile: ProfileFields,
}

/// Everything needed to provision a credential once payment is captured.
/// Held in the cache under `order:{order_id}` until it expires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedOrder {
    pub order_id: String,
    pub championship_id: i64,
    pub examination_ids: Vec<i64>,
    pub profile: ProfileFields,
    pub amount: i64,
    pub staged_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StagedOrderResponse {
    pub order_id: String,
    pub payment_session_id: String,
    pub amount: i64,
}

/// Credential produced by a captured order.
/// `credential_secret` is only present on the call that issued it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureResponse {
    pub credential_id: i64,
    pub credential_secret: Option<String>,
    pub championship_id: i64,
    pub examination_ids: Vec<i64>,
    pub profile_id: i64,
}
