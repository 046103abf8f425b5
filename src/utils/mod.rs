// src/utils/mod.rs

pub mod deadline;
pub mod hash;
pub mod jwt;
