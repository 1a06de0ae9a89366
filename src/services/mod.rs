// src/services/mod.rs

pub mod ranking;
pub mod rotation;
pub mod selection;
pub mod statistics;
