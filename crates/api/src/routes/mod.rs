//! HTTP surface: the post corpus, user actions, scheduled jobs and health probes.

pub mod health;
pub mod jobs;
pub mod posts;
pub mod user_actions;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

fn post_routes() -> Router<AppState> {
    Router::new()
        .route("/posts", get(posts::list_handler).post(posts::create_handler))
        .route("/posts/categories", get(posts::categories_handler))
        .route(
            "/posts/:id",
            get(posts::get_handler)
                .put(posts::update_handler)
                .delete(posts::delete_handler),
        )
}

fn action_routes() -> Router<AppState> {
    Router::new()
        .route("/user-actions", post(user_actions::create_handler))
        .route(
            "/user-actions/post/:post_id",
            get(user_actions::post_actions_handler),
        )
        .route(
            "/user-actions/user/:user_ref",
            get(user_actions::user_actions_handler),
        )
        .route(
            "/user-actions/user/:user_ref/post/:post_id/action/:action_type",
            get(user_actions::get_handler).delete(user_actions::delete_handler),
        )
}

fn job_routes() -> Router<AppState> {
    Router::new()
        .route("/jobs", get(jobs::list_handler))
        .route("/jobs/:name/run", post(jobs::trigger_handler))
}

fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/health/ready", get(health::ready_handler))
        .route("/health/live", get(health::live_handler))
}

/// Full router with compression, request tracing and permissive CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(post_routes())
        .merge(action_routes())
        .merge(job_routes())
        .merge(health_routes())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
