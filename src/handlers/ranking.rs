use axum::{Json, extract::State, response::IntoResponse};
use serde_json::json;
use sqlx::PgPool;

use crate::{error::AppError, services::ranking};

/// Public ranking of students by weighted score.
pub async fn get_ranking(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let ranking = ranking::compute_ranking(&pool).await?;
    Ok(Json(json!({ "success": true, "ranking": ranking })))
}
