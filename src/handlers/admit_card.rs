// src/handlers/admit_card.rs

use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};
use validator::Validate;

use crate::{error::AppError, models::admit_card::AdmitCardAuthRequest, session::SessionEngine};

/// Exchanges an admit card ID and secret for a bearer token.
pub async fn authenticate(
    State(session): State<Arc<SessionEngine>>,
    Json(payload): Json<AdmitCardAuthRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let response = session
        .authenticate(payload.credential_id, &payload.secret)
        .await?;

    Ok(Json(response))
}
