// src/services/selection.rs

//! Praise creation, deletion and the selection quota rules.
//!
//! Rule checks are plain functions over loaded rows; the async operations
//! wrap them in one transaction each. The recipient's `users` row is locked
//! (`FOR NO KEY UPDATE`) before counting, which serialises every write that could
//! change that recipient's quota or duplicate-praise state.

use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};

use crate::{
    config::{
        AUTO_SELECT_THRESHOLD, PRAISE_CONTENT_MAX, STUDENT_SELECTION_CEILING, TEACHER_SELECTION_CEILING,
    },
    error::AppError,
    models::{
        notification::PRAISE_RECEIVED,
        praise::Praise,
        user::{Role, User},
    },
    utils::html::sanitize_text,
};

/// Maximum number of live selected praises a recipient of `role` may hold.
pub fn selection_ceiling(role: Role) -> i64 {
    match role {
        Role::Teacher => TEACHER_SELECTION_CEILING,
        Role::Student => STUDENT_SELECTION_CEILING,
    }
}

/// A new praise is auto-selected while the recipient's live praise count
/// (including the new one) stays within this limit.
pub fn auto_select_limit(role: Role) -> i64 {
    AUTO_SELECT_THRESHOLD.min(selection_ceiling(role))
}

pub fn should_auto_select(live_count_after_insert: i64, recipient_role: Role) -> bool {
    live_count_after_insert <= auto_select_limit(recipient_role)
}

/// Teammates share a non-null class/team number.
pub fn is_same_team(author: &User, recipient: &User) -> bool {
    matches!((author.class_number, recipient.class_number), (Some(a), Some(b)) if a == b)
}

/// Validates an (author, recipient) pair for a new praise.
///
/// Students are the normal recipients. A student may also praise a teacher,
/// which feeds the teacher cards; teachers only praise students.
pub fn check_new_praise(author: &User, recipient: &User, already_praised: bool) -> Result<(), AppError> {
    if author.id == recipient.id {
        return Err(AppError::BadRequest("You cannot praise yourself".to_string()));
    }

    let allowed = match (author.role(), recipient.role()) {
        (_, Role::Student) => true,
        (Role::Student, Role::Teacher) => true,
        (Role::Teacher, Role::Teacher) => false,
    };
    if !allowed {
        return Err(AppError::BadRequest(
            "Praises can only be written to students".to_string(),
        ));
    }

    if already_praised {
        return Err(AppError::BadRequest(
            "You have already praised this user".to_string(),
        ));
    }

    Ok(())
}

/// Decides a toggle request. Returns the new `is_selected` state.
pub fn check_toggle(
    actor_id: i64,
    praise: &Praise,
    recipient_role: Role,
    selected_count: i64,
) -> Result<bool, AppError> {
    if praise.to_user_id != actor_id {
        return Err(AppError::Forbidden(
            "You can only select praises you received".to_string(),
        ));
    }

    let select = !praise.is_selected;
    if select {
        let ceiling = selection_ceiling(recipient_role);
        if selected_count >= ceiling {
            return Err(AppError::QuotaExceeded(format!(
                "You can select at most {} praise(s)",
                ceiling
            )));
        }
    }

    Ok(select)
}

/// Authors may delete their own praises; teachers may delete any praise.
pub fn check_delete(actor_id: i64, actor_role: Role, praise: &Praise) -> Result<(), AppError> {
    if actor_role != Role::Teacher && praise.from_user_id != actor_id {
        return Err(AppError::Forbidden(
            "Only the author or a teacher can delete this praise".to_string(),
        ));
    }
    Ok(())
}

/// Sanitises praise text and checks the bound on what will be stored.
pub fn praise_content(raw: &str) -> Result<String, AppError> {
    let content = sanitize_text(raw);
    if content.is_empty() {
        return Err(AppError::BadRequest("Praise must not be empty".to_string()));
    }
    if content.chars().count() as u64 > PRAISE_CONTENT_MAX {
        return Err(AppError::BadRequest(format!(
            "Praise must be at most {} characters",
            PRAISE_CONTENT_MAX
        )));
    }
    Ok(content)
}

pub fn default_delete_reason(actor_role: Role) -> &'static str {
    match actor_role {
        Role::Teacher => "Deleted by teacher",
        Role::Student => "Deleted by author",
    }
}

/// Result of a successful `create_praise`.
#[derive(Debug, Serialize)]
pub struct CreatedPraise {
    pub praise_id: i64,
    pub is_selected: bool,
}

/// `lock` takes `FOR NO KEY UPDATE`, which still admits the `FOR KEY SHARE`
/// locks of foreign-key checks on `praises` and `notifications`.
async fn fetch_user(
    tx: &mut Transaction<'_, Postgres>,
    id: i64,
    lock: bool,
) -> Result<Option<User>, AppError> {
    let sql = if lock {
        "SELECT * FROM users WHERE id = $1 FOR NO KEY UPDATE"
    } else {
        "SELECT * FROM users WHERE id = $1"
    };

    Ok(sqlx::query_as::<_, User>(sql)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?)
}

async fn count_selected(tx: &mut Transaction<'_, Postgres>, recipient_id: i64) -> Result<i64, AppError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM praises WHERE to_user_id = $1 AND is_selected AND NOT is_deleted",
    )
    .bind(recipient_id)
    .fetch_one(&mut **tx)
    .await?;

    Ok(count)
}

/// Creates a praise, applies auto-selection and notifies the recipient.
/// `content` must come from `praise_content`.
pub async fn create_praise(
    pool: &PgPool,
    author_id: i64,
    recipient_id: i64,
    content: &str,
) -> Result<CreatedPraise, AppError> {
    let mut tx = pool.begin().await?;

    let author = fetch_user(&mut tx, author_id, false)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    let recipient = fetch_user(&mut tx, recipient_id, true)
        .await?
        .ok_or(AppError::NotFound("Recipient not found".to_string()))?;

    let existing: Option<i64> = sqlx::query_scalar(
        "SELECT id FROM praises WHERE from_user_id = $1 AND to_user_id = $2 AND NOT is_deleted",
    )
    .bind(author.id)
    .bind(recipient.id)
    .fetch_optional(&mut *tx)
    .await?;

    check_new_praise(&author, &recipient, existing.is_some())?;

    let live_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM praises WHERE to_user_id = $1 AND NOT is_deleted",
    )
    .bind(recipient.id)
    .fetch_one(&mut *tx)
    .await?;

    let is_selected = should_auto_select(live_count + 1, recipient.role());

    let praise_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO praises (from_user_id, to_user_id, content, is_selected, is_teacher, is_myteam)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(author.id)
    .bind(recipient.id)
    .bind(content)
    .bind(is_selected)
    .bind(author.role() == Role::Teacher)
    .bind(is_same_team(&author, &recipient))
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO notifications (user_id, from_user_id, praise_id, type, message)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(recipient.id)
    .bind(author.id)
    .bind(praise_id)
    .bind(PRAISE_RECEIVED)
    .bind(format!("{} sent you a praise", author.name))
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        praise_id,
        author_id = author.id,
        recipient_id = recipient.id,
        is_selected,
        "Praise created"
    );

    Ok(CreatedPraise {
        praise_id,
        is_selected,
    })
}

/// Flips the selection state of a received praise. Returns the new state.
pub async fn toggle_selection(pool: &PgPool, praise_id: i64, actor_id: i64) -> Result<bool, AppError> {
    let mut tx = pool.begin().await?;

    let recipient_id: i64 =
        sqlx::query_scalar("SELECT to_user_id FROM praises WHERE id = $1 AND NOT is_deleted")
            .bind(praise_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::NotFound("Praise not found".to_string()))?;

    // Lock order matches create_praise: recipient first, then the praise.
    let recipient = fetch_user(&mut tx, recipient_id, true)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    let praise = sqlx::query_as::<_, Praise>(
        "SELECT * FROM praises WHERE id = $1 AND NOT is_deleted FOR NO KEY UPDATE",
    )
    .bind(praise_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("Praise not found".to_string()))?;

    let selected_count = count_selected(&mut tx, recipient.id).await?;
    let new_state = check_toggle(actor_id, &praise, recipient.role(), selected_count)?;

    sqlx::query("UPDATE praises SET is_selected = $1, updated_at = NOW() WHERE id = $2")
        .bind(new_state)
        .bind(praise.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::debug!(praise_id, actor_id, new_state, "Praise selection toggled");
    Ok(new_state)
}

/// Soft-deletes a praise, clearing its selection in the same statement.
pub async fn delete_praise(
    pool: &PgPool,
    praise_id: i64,
    actor_id: i64,
    actor_role: Role,
    reason: Option<String>,
) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    let praise = sqlx::query_as::<_, Praise>(
        "SELECT * FROM praises WHERE id = $1 AND NOT is_deleted FOR NO KEY UPDATE",
    )
    .bind(praise_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("Praise not found".to_string()))?;

    check_delete(actor_id, actor_role, &praise)?;

    let reason = reason
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| default_delete_reason(actor_role).to_string());

    sqlx::query(
        r#"
        UPDATE praises
        SET is_deleted = TRUE, is_selected = FALSE, deleted_by = $1, delete_reason = $2, updated_at = NOW()
        WHERE id = $3
        "#,
    )
    .bind(actor_id)
    .bind(&reason)
    .bind(praise.id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(praise_id, actor_id, reason = %reason, "Praise deleted");
    Ok(())
}
