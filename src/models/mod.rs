// src/models/mod.rs

pub mod admit_card;
pub mod answer;
pub mod attempt;
pub mod championship;
pub mod examination;
pub mod order;
pub mod profile;
pub mod question;
