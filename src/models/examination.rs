// src/models/examination.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'examinations' table in the database.
/// Read-mostly; served through the cache once loaded.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Examination {
    pub id: i64,
    pub championship_id: i64,

    /// Short public code (e.g., "MATH-L1").
    pub code: String,

    pub name: String,

    pub description: String,

    /// Candidates are refused question access before this instant.
    pub start_time: DateTime<Utc>,

    /// Informational only; in-flight attempts may still be finished after it.
    pub end_time: DateTime<Utc>,
}

impl Examination {
    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        now >= self.start_time
    }
}

/// Examination details as shown to a candidate, with their attempt status.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExaminationDetail {
    pub id: i64,
    pub championship_id: i64,
    pub code: String,
    pub name: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_submitted: bool,
}

impl ExaminationDetail {
    pub fn new(examination: Examination, is_submitted: bool) -> Self {
        Self {
            id: examination.id,
            championship_id: examination.championship_id,
            code: examination.code,
            name: examination.name,
            description: examination.description,
            start_time: examination.start_time,
            end_time: examination.end_time,
            is_submitted,
        }
    }
}
