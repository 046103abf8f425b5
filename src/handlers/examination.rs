// src/handlers/examination.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::{error::AppError, session::SessionEngine, utils::jwt::BearerToken};

pub async fn get_examination(
    State(session): State<Arc<SessionEngine>>,
    Extension(BearerToken(token)): Extension<BearerToken>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let examination = session.get_examination(&token, id).await?;
    Ok(Json(examination))
}

/// Lists the examination's questions with the caller's saved answers.
/// The first call starts the attempt.
pub async fn list_questions(
    State(session): State<Arc<SessionEngine>>,
    Extension(BearerToken(token)): Extension<BearerToken>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let questions = session.list_questions(&token, id).await?;
    Ok(Json(questions))
}

/// Closes the caller's attempt. Safe to repeat.
pub async fn submit_attempt(
    State(session): State<Arc<SessionEngine>>,
    Extension(BearerToken(token)): Extension<BearerToken>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = session.submit_attempt(&token, id).await?;
    Ok(Json(outcome))
}
