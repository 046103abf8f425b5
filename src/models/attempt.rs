// src/models/attempt.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'exam_attempts' table.
/// Unique on (credential_id, examination_id); never deleted.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Attempt {
    pub id: i64,
    pub credential_id: i64,
    pub examination_id: i64,
    pub is_submitted: bool,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// Lifecycle of an attempt. `Submitted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    /// No row exists yet.
    NotStarted,
    InProgress,
    Submitted,
}

impl AttemptState {
    pub fn of(attempt: Option<&Attempt>) -> Self {
        match attempt {
            None => AttemptState::NotStarted,
            Some(a) if a.is_submitted => AttemptState::Submitted,
            Some(_) => AttemptState::InProgress,
        }
    }

    pub fn accepts_answers(self) -> bool {
        self == AttemptState::InProgress
    }
}

/// Result of closing an attempt. Re-submission is reported, not rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitAttemptResponse {
    pub already_submitted: bool,
}
