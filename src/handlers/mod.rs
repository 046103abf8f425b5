// src/handlers/mod.rs

pub mod admit_card;
pub mod examination;
pub mod order;
pub mod question;
