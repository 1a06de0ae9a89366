use serde::Serialize;
use sqlx::FromRow;

/// Notification type written when a praise is received.
pub const PRAISE_RECEIVED: &str = "praise_received";

/// Represents the 'notifications' table joined with the sender's name
/// and the praise text.
#[derive(Debug, Serialize, FromRow)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub from_user_id: Option<i64>,
    pub praise_id: Option<i64>,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,

    pub from_name: Option<String>,
    pub praise_content: Option<String>,
}
