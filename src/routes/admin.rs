use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get},
};

/// Admin Router Module
///
/// Account management, the full course list and the dashboard counters.
///
/// Access Control:
/// Each handler takes an `AuthUser`, so an unauthenticated request is rejected
/// with 401 before the handler runs. The admin role itself is checked by the
/// policy in the service layer, which answers 403 for everyone else.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/stats
        .route("/stats", get(handlers::get_admin_stats))
        // GET/POST /admin/{instructors,students,admins}
        // Listing and creation per role. Instructor and admin accounts can only
        // be created here.
        .route(
            "/instructors",
            get(handlers::list_instructors).post(handlers::create_instructor),
        )
        .route(
            "/students",
            get(handlers::list_students).post(handlers::create_student),
        )
        .route(
            "/admins",
            get(handlers::list_admins).post(handlers::create_admin),
        )
        // DELETE /admin/users/{id}
        // Cascades through every course the user owns.
        .route("/users/{id}", delete(handlers::delete_user))
        // GET /admin/courses
        // All courses, any status.
        .route("/courses", get(handlers::list_all_courses))
        // DELETE /admin/courses/{id}
        .route("/courses/{id}", delete(handlers::admin_delete_course))
}
