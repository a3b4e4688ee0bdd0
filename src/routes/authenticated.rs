use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, post, put},
};

/// Authenticated Router Module
///
/// Every route here sits behind the authentication layer, so handlers always
/// receive a resolved `AuthUser`. What that actor may do is decided by the
/// policy inside the services, not by the router.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /me
        .route("/me", get(handlers::get_me))
        // GET /users/check-email/{email}
        .route("/users/check-email/{email}", get(handlers::check_email))
        // POST /upload/{kind}
        // Presigned upload URL for a thumbnail or a lesson video (instructors and admins).
        .route("/upload/{kind}", post(handlers::upload_media))
        // --- Courses ---
        // POST /courses
        // Merged with the public GET on the same path.
        .route("/courses", post(handlers::create_course))
        // Static segments take precedence over `{id}`.
        .route("/courses/instructor", get(handlers::list_instructor_courses))
        .route("/courses/enrolled", get(handlers::list_enrolled_courses))
        .route(
            "/courses/{id}",
            get(handlers::get_course).delete(handlers::delete_course),
        )
        .route("/courses/{id}/enroll", post(handlers::enroll))
        .route("/courses/{id}/lessons", post(handlers::add_lesson))
        .route("/courses/{id}/assignments", post(handlers::add_assignment))
        .route("/courses/{id}/thumbnail", put(handlers::update_thumbnail))
        .route("/courses/{id}/status", put(handlers::update_status))
        // DELETE /courses/{id}/students/{student_id}
        // Owner-only roster removal.
        .route(
            "/courses/{id}/students/{student_id}",
            delete(handlers::remove_student),
        )
}
