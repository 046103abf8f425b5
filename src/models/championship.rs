// src/models/championship.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'championships' table. Prices are in minor currency units.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Championship {
    pub id: i64,
    pub name: String,
    /// Price of the first examination.
    pub primary_price: i64,
    /// Price of every additional examination.
    pub secondary_price: i64,
    /// Most examinations a single order may cover.
    pub max_exams: i32,
    pub active: bool,
}

impl Championship {
    pub fn price_for(&self, examination_count: usize) -> i64 {
        match examination_count {
            0 => 0,
            n => self.primary_price + (n as i64 - 1) * self.secondary_price,
        }
    }
}
