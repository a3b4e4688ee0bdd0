use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints open to anonymous clients: the health check, the two
/// credential-exchange endpoints and the published course catalogue.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check for load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /auth/register
        // Self-service sign-up; always yields a student account.
        .route("/auth/register", post(handlers::register))
        // POST /auth/login
        .route("/auth/login", post(handlers::login))
        // GET /courses
        // Published courses only. Drafts and upcoming courses stay private.
        .route("/courses", get(handlers::list_published_courses))
}
