// src/config.rs

use std::env;
use std::time::Duration;

use dotenvy::dotenv;

/// Maximum number of selected praises a student may keep.
pub const STUDENT_SELECTION_CEILING: i64 = 3;

/// Maximum number of selected praises a teacher may keep.
pub const TEACHER_SELECTION_CEILING: i64 = 1;

/// The first N live praises a recipient gets are selected automatically
/// (never more than the recipient's ceiling).
pub const AUTO_SELECT_THRESHOLD: i64 = 3;

/// Peer praises received before a student has to start selecting.
pub const SANDBAGGING_RECEIVED_MIN: i64 = 3;

/// Selected praises a student needs once the peer threshold is reached.
pub const SANDBAGGING_SELECTED_MIN: i64 = 3;

/// Praise content bounds (characters).
pub const PRAISE_CONTENT_MAX: u64 = 500;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub server_port: u16,

    /// Phone number of the account that receives rotating card feeds.
    pub demo_phone_number: Option<String>,
    /// Display name used when seeding the demo account.
    pub demo_name: String,

    pub session_cache_capacity: usize,
    pub session_cache_ttl: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let jwt_expiration = parse_or("JWT_EXPIRATION", 60 * 60 * 24 * 7);

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let server_port = parse_or("SERVER_PORT", 3000);

        let demo_phone_number = env::var("DEMO_PHONE_NUMBER")
            .ok()
            .filter(|v| !v.trim().is_empty());

        let demo_name = env::var("DEMO_NAME").unwrap_or_else(|_| "Admin".to_string());

        let session_cache_capacity = parse_or("SESSION_CACHE_CAPACITY", 1024);
        let session_cache_ttl = Duration::from_secs(parse_or("SESSION_CACHE_TTL_SECS", 3600));

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            server_port,
            demo_phone_number,
            demo_name,
            session_cache_capacity,
            session_cache_ttl,
        }
    }

    /// Whether `phone_number` belongs to the configured demo account.
    pub fn is_demo_account(&self, phone_number: &str) -> bool {
        self.demo_phone_number.as_deref() == Some(phone_number)
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid value for {}: {:?}", key, raw);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_demo(phone: Option<&str>) -> Config {
        Config {
            database_url: String::new(),
            jwt_secret: "secret".to_string(),
            jwt_expiration: 60,
            rust_log: "error".to_string(),
            server_port: 0,
            demo_phone_number: phone.map(str::to_string),
            demo_name: "Admin".to_string(),
            session_cache_capacity: 4,
            session_cache_ttl: Duration::from_secs(60),
        }
    }

    #[test]
    fn demo_account_matches_exact_phone() {
        let config = config_with_demo(Some("01012344321"));
        assert!(config.is_demo_account("01012344321"));
        assert!(!config.is_demo_account("01012344322"));
    }

    #[test]
    fn no_demo_account_matches_nothing() {
        let config = config_with_demo(None);
        assert!(!config.is_demo_account(""));
        assert!(!config.is_demo_account("01012344321"));
    }
}
