// src/handlers/question.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError, models::question::SubmitAnswerRequest, session::SessionEngine,
    utils::jwt::BearerToken,
};

pub async fn get_question(
    State(session): State<Arc<SessionEngine>>,
    Extension(BearerToken(token)): Extension<BearerToken>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let question = session.get_question(&token, id).await?;
    Ok(Json(question))
}

/// Saves the caller's answer, overwriting any earlier one.
///
/// Rejected with 409 once the attempt is submitted.
pub async fn submit_answer(
    State(session): State<Arc<SessionEngine>>,
    Extension(BearerToken(token)): Extension<BearerToken>,
    Path(id): Path<i64>,
    Json(payload): Json<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let question = session.submit_answer(&token, id, &payload.value).await?;
    Ok(Json(question))
}
