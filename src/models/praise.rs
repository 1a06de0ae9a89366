use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::config::PRAISE_CONTENT_MAX;

/// Represents the 'praises' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Praise {
    pub id: i64,
    pub from_user_id: i64,
    pub to_user_id: i64,
    pub content: String,

    pub is_selected: bool,
    /// Author's role at creation time.
    pub is_teacher: bool,
    /// Author and recipient share a class/team number.
    pub is_myteam: bool,

    pub is_deleted: bool,
    pub deleted_by: Option<i64>,
    pub delete_reason: Option<String>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// A praise joined with the name of the other party.
/// `counterpart_name` is the recipient for written lists, the author for received lists.
#[derive(Debug, Serialize, FromRow)]
pub struct PraiseWithName {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub praise: Praise,
    pub counterpart_name: Option<String>,
}

/// A praise as shown on a profile card.
#[derive(Debug, Clone, Serialize)]
pub struct CardPraise {
    pub id: i64,
    pub content: String,
    pub is_selected: bool,
    pub is_teacher: bool,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for creating a new praise.
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePraiseRequest {
    pub to_user_id: i64,

    #[validate(length(
        min = 1,
        max = PRAISE_CONTENT_MAX,
        message = "Praise must be between 1 and 500 characters"
    ))]
    pub content: String,
}

/// Optional body for deleting a praise.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct DeletePraiseRequest {
    #[validate(length(max = 200, message = "Reason must be at most 200 characters"))]
    pub reason: Option<String>,
}

/// Query parameters for praise listings.
#[derive(Debug, Default, Deserialize)]
pub struct PraiseListParams {
    /// Include soft-deleted praises.
    #[serde(default)]
    pub show_deleted: bool,
}
