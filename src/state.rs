use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::{
    config::Config,
    services::rotation::{RotationSampler, SessionCache},
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub sampler: Arc<RotationSampler>,
}

impl AppState {
    /// Builds the state with a session cache sized from `config`.
    pub fn new(pool: PgPool, config: Config) -> Self {
        let cache = SessionCache::new(config.session_cache_capacity, config.session_cache_ttl);
        Self {
            pool,
            config,
            sampler: Arc::new(RotationSampler::new(cache)),
        }
    }
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<RotationSampler> {
    fn from_ref(state: &AppState) -> Self {
        state.sampler.clone()
    }
}
