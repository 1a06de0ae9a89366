use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use sqlx::PgPool;

use crate::{
    config::Config,
    error::AppError,
    services::rotation::{DisplaySet, FeedKind, RotationSampler, get_display_set},
    utils::jwt::OptionalClaims,
};

const DEFAULT_SESSION: &str = "default";
const MAX_SESSION_KEY_LEN: usize = 64;

#[derive(Debug, Deserialize)]
pub struct FeedParams {
    pub session: Option<String>,
}

fn session_key(params: FeedParams) -> String {
    match params.session {
        Some(key) if !key.trim().is_empty() => key.trim().chars().take(MAX_SESSION_KEY_LEN).collect(),
        _ => DEFAULT_SESSION.to_string(),
    }
}

async fn feed(
    pool: PgPool,
    config: Config,
    sampler: Arc<RotationSampler>,
    kind: FeedKind,
    claims: OptionalClaims,
    params: FeedParams,
) -> Result<Json<DisplaySet>, AppError> {
    let is_demo = claims
        .0
        .as_ref()
        .is_some_and(|c| config.is_demo_account(&c.phone_number));

    let set = get_display_set(
        &pool,
        &sampler,
        kind,
        &session_key(params),
        is_demo,
        config.demo_phone_number.as_deref(),
    )
    .await?;

    Ok(Json(set))
}

/// Student cards. The demo account gets a rotating subset per `session`.
pub async fn student_cards(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    State(sampler): State<Arc<RotationSampler>>,
    claims: OptionalClaims,
    Query(params): Query<FeedParams>,
) -> Result<impl IntoResponse, AppError> {
    feed(pool, config, sampler, FeedKind::Student, claims, params).await
}

/// Teacher cards. The demo account gets a rotating subset per `session`.
pub async fn teacher_cards(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    State(sampler): State<Arc<RotationSampler>>,
    claims: OptionalClaims,
    Query(params): Query<FeedParams>,
) -> Result<impl IntoResponse, AppError> {
    feed(pool, config, sampler, FeedKind::Teacher, claims, params).await
}
