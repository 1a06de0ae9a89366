// src/handlers/mod.rs

pub mod auth;
pub mod feeds;
pub mod notifications;
pub mod praises;
pub mod ranking;
pub mod statistics;
pub mod users;
