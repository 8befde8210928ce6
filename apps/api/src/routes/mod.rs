pub mod health;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::applications::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Snapshots handed over by the job source and profile store
        .route("/api/v1/postings", put(handlers::handle_put_posting))
        .route("/api/v1/profiles", put(handlers::handle_put_profile))
        // Application attempts
        .route(
            "/api/v1/applications",
            get(handlers::handle_list_applications).post(handlers::handle_create_application),
        )
        .route(
            "/api/v1/applications/stats",
            get(handlers::handle_application_stats),
        )
        .route(
            "/api/v1/applications/:id",
            get(handlers::handle_get_application),
        )
        .route(
            "/api/v1/applications/:id/transitions",
            get(handlers::handle_get_transitions),
        )
        .route(
            "/api/v1/applications/:id/review",
            post(handlers::handle_review),
        )
        .route(
            "/api/v1/applications/:id/cancel",
            post(handlers::handle_cancel),
        )
        .route(
            "/api/v1/applications/:id/recover",
            post(handlers::handle_recover),
        )
        .with_state(state)
}
