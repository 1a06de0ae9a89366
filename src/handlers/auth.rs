// src/handlers/auth.rs

use axum::{Json, extract::State, response::IntoResponse};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::user::{LoginRequest, User},
    utils::{
        hash::{hash_password, verify_password},
        jwt::sign_jwt,
    },
};

async fn find_by_phone(pool: &PgPool, phone_number: &str) -> Result<User, AppError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE phone_number = $1")
        .bind(phone_number)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Phone number is not registered".to_string()))
}

/// Authenticates a user by phone number.
///
/// Accounts without a password yet get `is_first_login: true` and no token;
/// the client then calls `set-password`.
pub async fn login(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = find_by_phone(&pool, &payload.phone_number).await?;

    let Some(password_hash) = user.password.as_deref() else {
        return Ok(Json(json!({
            "success": true,
            "is_first_login": true,
            "user": user.profile(),
        })));
    };

    if !verify_password(&payload.password, password_hash)? {
        return Err(AppError::AuthError("Invalid password".to_string()));
    }

    let token = sign_jwt(&user, &config.jwt_secret, config.jwt_expiration)?;
    tracing::info!(user_id = user.id, "User logged in");

    Ok(Json(json!({
        "success": true,
        "is_first_login": false,
        "token": token,
        "type": "Bearer",
        "user": user.profile(),
    })))
}

/// Sets the password of an account on its first login. Fails if one is already set.
pub async fn set_password(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = find_by_phone(&pool, &payload.phone_number).await?;
    if user.password.is_some() {
        return Err(AppError::Conflict("Password is already set".to_string()));
    }

    let hashed_password = hash_password(&payload.password)?;

    // Only one concurrent request can still match `password IS NULL`.
    let updated = sqlx::query("UPDATE users SET password = $1 WHERE id = $2 AND password IS NULL")
        .bind(&hashed_password)
        .bind(user.id)
        .execute(&pool)
        .await?
        .rows_affected();

    if updated == 0 {
        return Err(AppError::Conflict("Password is already set".to_string()));
    }

    let token = sign_jwt(&user, &config.jwt_secret, config.jwt_expiration)?;
    tracing::info!(user_id = user.id, "Password set on first login");

    Ok(Json(json!({
        "success": true,
        "token": token,
        "type": "Bearer",
        "user": user.profile(),
    })))
}
