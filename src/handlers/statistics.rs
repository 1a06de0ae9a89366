use axum::{Json, extract::State, response::IntoResponse};
use sqlx::PgPool;

use crate::{error::AppError, services::statistics};

/// Aggregate counts for the dashboard.
pub async fn get_statistics(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let stats = statistics::collect(&pool).await?;
    Ok(Json(stats))
}
