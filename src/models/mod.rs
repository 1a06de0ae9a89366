// src/models/mod.rs

pub mod notification;
pub mod praise;
pub mod ranking;
pub mod statistics;
pub mod user;
