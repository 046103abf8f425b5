// src/handlers/order.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::order::{CalculateOrderRequest, CreateOrderRequest},
    provisioning::ProvisioningEngine,
};

pub async fn calculate_order(
    State(provisioning): State<Arc<ProvisioningEngine>>,
    Json(payload): Json<CalculateOrderRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let amount = provisioning
        .calculate_order(payload.championship_id, &payload.examination_ids)
        .await?;

    Ok(Json(amount))
}

/// Places an order and opens a payment session for it.
///
/// Returns 201 Created with the order ID and the gateway session ID.
pub async fn create_order(
    State(provisioning): State<Arc<ProvisioningEngine>>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, AppError> {
    let staged = provisioning.stage_order(payload).await?;
    Ok((StatusCode::CREATED, Json(staged)))
}

/// Issues the admit card once the gateway reports payment.
///
/// The plaintext secret is only in the first successful response.
pub async fn capture_order(
    State(provisioning): State<Arc<ProvisioningEngine>>,
    Path(order_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let captured = provisioning.capture(&order_id).await?;
    Ok(Json(captured))
}
