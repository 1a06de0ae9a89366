// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{auth, feeds, notifications, praises, ranking, statistics, users},
    state::AppState,
    utils::jwt::{auth_middleware, teacher_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, users, praises, feeds, notifications).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (pool, config, rotation sampler).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let require_auth = middleware::from_fn_with_state(state.clone(), auth_middleware);

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/set-password", post(auth::set_password));

    let user_routes = Router::new()
        .route("/students", get(users::list_students))
        .merge(
            Router::new()
                .route("/me", get(users::get_me))
                .route("/me/stats", get(users::get_my_stats))
                .layer(require_auth.clone()),
        )
        .merge(
            Router::new()
                .route("/students/{id}/written-stats", get(users::get_written_stats))
                // Auth first, then teacher check
                .layer(middleware::from_fn(teacher_middleware))
                .layer(require_auth.clone()),
        );

    let praise_routes = Router::new()
        .route("/", post(praises::create_praise))
        .route("/written", get(praises::list_written))
        .route("/received", get(praises::list_received))
        .route("/{id}/select", post(praises::toggle_select))
        .route("/{id}/delete", delete(praises::delete_praise))
        .merge(
            Router::new()
                .route("/user/{user_id}", get(praises::list_for_user))
                .layer(middleware::from_fn(teacher_middleware)),
        )
        .layer(require_auth.clone());

    let notification_routes = Router::new()
        .route("/", get(notifications::list_notifications))
        .route("/{id}/read", put(notifications::mark_read))
        .layer(require_auth);

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/users", user_routes)
        .nest("/api/praises", praise_routes)
        .nest("/api/notifications", notification_routes)
        .route("/api/ranking", get(ranking::get_ranking))
        .route("/api/statistics", get(statistics::get_statistics))
        .route("/api/students/praises", get(feeds::student_cards))
        .route("/api/teachers/praises", get(feeds::teacher_cards))
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
