// src/models/admit_card.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'admit_cards' table: the admission credential.
/// One row per captured order (unique on `order_id`).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AdmitCard {
    pub id: i64,

    /// Payment order that produced this credential.
    pub order_id: String,

    /// Examinations this credential may access. Fixed at issuance.
    pub examination_ids: Vec<i64>,

    /// Argon2 digest of the credential secret.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub secret_digest: String,

    pub profile_id: i64,
    pub championship_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Data needed to insert an admission credential.
#[derive(Debug, Clone)]
pub struct NewAdmitCard {
    pub order_id: String,
    pub examination_ids: Vec<i64>,
    pub secret_digest: String,
    pub championship_id: i64,
}

/// DTO for admission login.
#[derive(Debug, Deserialize, Validate)]
pub struct AdmitCardAuthRequest {
    #[validate(range(min = 1))]
    pub credential_id: i64,
    #[validate(length(min = 1, max = 128))]
    pub secret: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdmitCardAuthResponse {
    pub token: String,
    #[serde(rename = "type")]
    pub token_type: String,
    pub examination_ids: Vec<i64>,
}
