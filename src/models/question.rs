// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    pub examination_id: i64,

    /// Question type (e.g., "single", "multiple", "text").
    /// Mapped from the database column 'type' since `type` is a reserved keyword in Rust.
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub question_type: String,

    pub title: String,

    /// The prompt shown to the candidate.
    pub description: String,

    /// Selectable choices, empty for free-text questions.
    /// Stored as a JSON array in the database.
    pub choices: Json<Vec<QuestionChoice>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionChoice {
    pub label: String,
    pub value: String,
}

/// A question together with the candidate's current answer.
/// Built field by field so the response shape is fixed at compile time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionView {
    pub id: i64,
    pub examination_id: i64,
    #[serde(rename = "type")]
    pub question_type: String,
    pub title: String,
    pub description: String,
    pub choices: Vec<QuestionChoice>,
    pub answer: Option<String>,
}

impl QuestionView {
    pub fn assemble(question: Question, answer: Option<String>) -> Self {
        Self {
            id: question.id,
            examination_id: question.examination_id,
            question_type: question.question_type,
            title: question.title,
            description: question.description,
            choices: question.choices.0,
            answer,
        }
    }
}

/// DTO for answering a question.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitAnswerRequest {
    #[validate(length(max = 10000, message = "Answer must be at most 10000 characters"))]
    pub value: String,
}
