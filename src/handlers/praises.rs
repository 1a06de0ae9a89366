// src/handlers/praises.rs

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        praise::{CreatePraiseRequest, DeletePraiseRequest, PraiseListParams, PraiseWithName},
        user::User,
    },
    services::selection,
    utils::{html::sanitize_text, jwt::Claims},
};

/// Create a new praise for a student (or, from a student, for a teacher).
pub async fn create_praise(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreatePraiseRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let author_id = claims.user_id()?;

    let content = selection::praise_content(&payload.content)?;

    let created = selection::create_praise(&pool, author_id, payload.to_user_id, &content).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "praise_id": created.praise_id,
            "is_selected": created.is_selected,
        })),
    ))
}

/// Toggle the selection of a received praise.
pub async fn toggle_select(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(praise_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let actor_id = claims.user_id()?;
    let is_selected = selection::toggle_selection(&pool, praise_id, actor_id).await?;

    Ok(Json(json!({
        "success": true,
        "is_selected": is_selected,
    })))
}

/// Soft-delete a praise. Body `{ "reason": ... }` is optional.
pub async fn delete_praise(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(praise_id): Path<i64>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let payload: DeletePraiseRequest = if body.iter().all(u8::is_ascii_whitespace) {
        DeletePraiseRequest::default()
    } else {
        serde_json::from_slice(&body)?
    };
    payload.validate()?;

    let actor_id = claims.user_id()?;
    let reason = payload.reason.map(|r| sanitize_text(&r));

    selection::delete_praise(&pool, praise_id, actor_id, claims.role(), reason).await?;

    Ok(Json(json!({ "success": true })))
}

/// Praises written by the current user.
pub async fn list_written(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<PraiseListParams>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let praises = sqlx::query_as::<_, PraiseWithName>(
        r#"
        SELECT p.*, COALESCE(u.name, 'Unknown') AS counterpart_name
        FROM praises p
        LEFT JOIN users u ON u.id = p.to_user_id
        WHERE p.from_user_id = $1 AND ($2 OR NOT p.is_deleted)
        ORDER BY p.created_at DESC, p.id DESC
        "#,
    )
    .bind(user_id)
    .bind(params.show_deleted)
    .fetch_all(&pool)
    .await?;

    Ok(Json(json!({ "success": true, "praises": praises })))
}

async fn received_by(pool: &PgPool, user_id: i64, show_deleted: bool) -> Result<Vec<PraiseWithName>, AppError> {
    let praises = sqlx::query_as::<_, PraiseWithName>(
        r#"
        SELECT p.*, u.name AS counterpart_name
        FROM praises p
        LEFT JOIN users u ON u.id = p.from_user_id
        WHERE p.to_user_id = $1 AND ($2 OR NOT p.is_deleted)
        ORDER BY p.created_at DESC, p.id DESC
        "#,
    )
    .bind(user_id)
    .bind(show_deleted)
    .fetch_all(pool)
    .await?;

    Ok(praises)
}

/// Live praises received by the current user.
pub async fn list_received(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let praises = received_by(&pool, claims.user_id()?, false).await?;
    Ok(Json(json!({ "success": true, "praises": praises })))
}

/// Praises received by any user.
/// Teacher only.
pub async fn list_for_user(
    State(pool): State<PgPool>,
    Path(user_id): Path<i64>,
    Query(params): Query<PraiseListParams>,
) -> Result<impl IntoResponse, AppError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    let praises = received_by(&pool, user.id, params.show_deleted).await?;

    Ok(Json(json!({
        "success": true,
        "user": user.profile(),
        "praises": praises,
    })))
}
