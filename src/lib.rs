use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core services: identity, authentication, policy and the course lifecycle.
pub mod accounts;
pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod lifecycle;
pub mod models;
pub mod password;
pub mod policy;

// Persistence and blob storage.
pub mod memory;
pub mod repository;
pub mod storage;

// HTTP surface.
pub mod handlers;
pub mod routes;
use auth::AuthUser;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::AppError;
pub use memory::InMemoryRepository;
pub use repository::{PostgresRepository, RepositoryState};
pub use storage::{MockStorageService, S3StorageClient, StorageState};

/// ApiDoc
///
/// OpenAPI document for every handler and wire schema, served at
/// `/api-docs/openapi.json` and rendered by Swagger UI.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::register, handlers::login, handlers::get_me, handlers::check_email,
        handlers::upload_media, handlers::list_published_courses, handlers::create_course,
        handlers::list_instructor_courses, handlers::list_enrolled_courses, handlers::get_course,
        handlers::delete_course, handlers::enroll, handlers::add_lesson, handlers::add_assignment,
        handlers::update_thumbnail, handlers::update_status, handlers::remove_student,
        handlers::list_instructors, handlers::create_instructor, handlers::list_students,
        handlers::create_student, handlers::list_admins, handlers::create_admin,
        handlers::delete_user, handlers::list_all_courses, handlers::admin_delete_course,
        handlers::get_admin_stats
    ),
    components(
        schemas(
            models::Role, models::CourseLevel, models::CourseStatus, models::PublicUser,
            models::Lesson, models::Assignment, models::Course, models::RegisterRequest,
            models::LoginRequest, models::CreateAccountRequest, models::AuthResponse,
            models::EmailExistsResponse, models::LessonInput, models::AssignmentInput,
            models::CreateCourseRequest, models::UpdateThumbnailRequest,
            models::UpdateStatusRequest, models::PresignedUrlRequest,
            models::PresignedUrlResponse, models::MessageResponse,
            models::AdminDashboardStats, error::ErrorBody,
        )
    ),
    tags(
        (name = "lms-portal", description = "Learning management API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Shared, immutable container for the repository, the blob store and the
/// configuration. Cloned into every request.
#[derive(Clone)]
pub struct AppState {
    /// Identity and course store (Postgres or in-memory).
    pub repo: RepositoryState,
    /// Blob storage for thumbnails and videos.
    pub storage: StorageState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// Lets extractors such as `AuthUser` pull single components out of the state.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Gate for `authenticated_routes`: resolving `AuthUser` either succeeds or
/// rejects the request with 401 before any handler runs.
async fn auth_middleware(
    _auth_user: AuthUser,
    request: Request,
    next: Next,
) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the public, authenticated and admin routers with the request-id,
/// tracing and CORS layers.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Routers
    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        // Same-path method routers (GET /courses public, POST /courses
        // authenticated) merge into one route.
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        // Admin handlers extract `AuthUser` themselves; the role check is in the policy.
        .nest("/admin", admin::admin_routes())
        .with_state(state);

    // 3. Request id, tracing span and id propagation.
    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS
        .layer(cors)
}

/// trace_span_logger
///
/// Span for every request, carrying method, URI and the `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
