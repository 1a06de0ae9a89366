use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::json;
use sqlx::PgPool;

use crate::{error::AppError, models::notification::Notification, utils::jwt::Claims};

/// Latest notifications of the current user.
pub async fn list_notifications(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let notifications = sqlx::query_as::<_, Notification>(
        r#"
        SELECT
            n.id, n.user_id, n.from_user_id, n.praise_id, n.type, n.message, n.is_read, n.created_at,
            u.name AS from_name,
            p.content AS praise_content
        FROM notifications n
        LEFT JOIN users u ON u.id = n.from_user_id
        LEFT JOIN praises p ON p.id = n.praise_id AND NOT p.is_deleted
        WHERE n.user_id = $1
        ORDER BY n.created_at DESC, n.id DESC
        LIMIT 100
        "#,
    )
    .bind(claims.user_id()?)
    .fetch_all(&pool)
    .await?;

    Ok(Json(json!({ "success": true, "notifications": notifications })))
}

/// Mark one of the current user's notifications as read.
pub async fn mark_read(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let updated = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(claims.user_id()?)
        .execute(&pool)
        .await?
        .rows_affected();

    if updated == 0 {
        return Err(AppError::NotFound("Notification not found".to_string()));
    }

    Ok(Json(json!({ "success": true })))
}
