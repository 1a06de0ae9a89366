use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::json;
use sqlx::PgPool;

use crate::{
    error::AppError,
    models::user::{Role, StudentListEntry, User},
    services::ranking,
    utils::jwt::Claims,
};

/// Get the current user's profile.
pub async fn get_me(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(claims.user_id()?)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    Ok(Json(json!({ "success": true, "user": user.profile() })))
}

/// Score, rank and praise counts of the current user.
pub async fn get_my_stats(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let stats = ranking::compute_user_stats(&pool, claims.user_id()?).await?;
    Ok(Json(stats))
}

/// Student directory with received-praise counts.
pub async fn list_students(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let students = sqlx::query_as::<_, StudentListEntry>(
        r#"
        SELECT
            u.id, u.name, u.school, u.grade, u.class_number, u.student_number,
            COUNT(p.id) FILTER (WHERE p.is_selected) AS selected_praises_count,
            COUNT(p.id) AS total_praises_count
        FROM users u
        LEFT JOIN praises p ON p.to_user_id = u.id AND NOT p.is_deleted
        WHERE u.role = 'student'
        GROUP BY u.id
        ORDER BY u.grade, u.class_number, u.student_number, u.id
        "#,
    )
    .fetch_all(&pool)
    .await?;

    Ok(Json(json!({ "success": true, "students": students })))
}

/// How many of a student's written praises were selected.
/// Teacher only.
pub async fn get_written_stats(
    State(pool): State<PgPool>,
    Path(student_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let role: String = sqlx::query_scalar("SELECT role FROM users WHERE id = $1")
        .bind(student_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Student not found".to_string()))?;

    if Role::from_db(&role) != Role::Student {
        return Err(AppError::NotFound("Student not found".to_string()));
    }

    let stats = ranking::compute_written_stats(&pool, student_id).await?;
    Ok(Json(stats))
}
