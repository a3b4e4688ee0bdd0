use crate::{
    AppState,
    accounts::Accounts,
    auth::AuthUser,
    error::{AppError, ErrorBody},
    extract::{Json, Path},
    lifecycle::CourseLifecycle,
    models::{
        AdminDashboardStats, AssignmentInput, AuthResponse, Course, CreateAccountRequest,
        CreateCourseRequest, EmailExistsResponse, LessonInput, LoginRequest, MessageResponse,
        PresignedUrlRequest, PresignedUrlResponse, PublicUser, RegisterRequest, Role,
        UpdateStatusRequest, UpdateThumbnailRequest,
    },
    storage::{self, UploadKind},
};
use axum::{extract::State, http::StatusCode};
use uuid::Uuid;

fn message(text: &str) -> Json<MessageResponse> {
    Json(MessageResponse {
        message: text.to_string(),
    })
}

// --- Authentication ---

/// register
///
/// [Public Route] Self-service registration. Always creates a student account
/// and returns a bearer token alongside the sanitized profile.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = AuthResponse),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 403, description = "Elevated role requested", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let response = Accounts::new(state.repo.as_ref(), &state.config)
        .register(payload)
        .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// login
///
/// [Public Route] Exchanges email and password for a fresh token. Unknown
/// emails and wrong passwords are indistinguishable.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = ErrorBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let response = Accounts::new(state.repo.as_ref(), &state.config)
        .login(payload)
        .await?;
    Ok(Json(response))
}

/// get_me
///
/// [Authenticated Route] The caller's own profile, with owned and enrolled course ids.
#[utoipa::path(
    get,
    path = "/me",
    responses((status = 200, description = "Profile", body = PublicUser))
)]
pub async fn get_me(
    actor: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<PublicUser>, AppError> {
    let profile = Accounts::new(state.repo.as_ref(), &state.config)
        .profile(&actor)
        .await?;
    Ok(Json(profile))
}

/// check_email
///
/// [Authenticated Route] Reports whether an account already uses `email`.
#[utoipa::path(
    get,
    path = "/users/check-email/{email}",
    params(("email" = String, Path, description = "Email to look up")),
    responses((status = 200, description = "Lookup result", body = EmailExistsResponse))
)]
pub async fn check_email(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<EmailExistsResponse>, AppError> {
    let exists = Accounts::new(state.repo.as_ref(), &state.config)
        .check_email_exists(&actor, &email)
        .await?;
    Ok(Json(EmailExistsResponse { exists }))
}

// --- Media ---

/// upload_media
///
/// [Authenticated Route] Issues a presigned PUT URL for a thumbnail or lesson
/// video. The file goes straight to the bucket; the returned `resource_key` is
/// what the client stores on the course.
#[utoipa::path(
    post,
    path = "/upload/{kind}",
    params(("kind" = String, Path, description = "`thumbnail` or `video`")),
    request_body = PresignedUrlRequest,
    responses(
        (status = 200, description = "URL", body = PresignedUrlResponse),
        (status = 400, description = "Unsupported file", body = ErrorBody),
        (status = 403, description = "Students cannot upload", body = ErrorBody),
        (status = 503, description = "Storage unavailable", body = ErrorBody)
    )
)]
pub async fn upload_media(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Json(payload): Json<PresignedUrlRequest>,
) -> Result<Json<PresignedUrlResponse>, AppError> {
    let kind: UploadKind = kind.parse()?;
    let response = storage::prepare_upload(state.storage.as_ref(), &actor, kind, &payload).await?;
    Ok(Json(response))
}

// --- Courses ---

/// list_published_courses
///
/// [Public Route] The catalogue: every course in `Published` status, newest first.
#[utoipa::path(
    get,
    path = "/courses",
    responses((status = 200, description = "Published courses", body = [Course]))
)]
pub async fn list_published_courses(
    State(state): State<AppState>,
) -> Result<Json<Vec<Course>>, AppError> {
    let courses = CourseLifecycle::new(state.repo.as_ref())
        .list_published_courses()
        .await?;
    Ok(Json(courses))
}

/// create_course
///
/// [Authenticated Route] Instructors create courses for themselves. Admins
/// create them on behalf of the instructor named in `instructor`.
#[utoipa::path(
    post,
    path = "/courses",
    request_body = CreateCourseRequest,
    responses(
        (status = 201, description = "Created", body = Course),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 403, description = "Not permitted", body = ErrorBody),
        (status = 404, description = "Instructor not found", body = ErrorBody)
    )
)]
pub async fn create_course(
    actor: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateCourseRequest>,
) -> Result<(StatusCode, Json<Course>), AppError> {
    let course = CourseLifecycle::new(state.repo.as_ref())
        .create_course(&actor, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(course)))
}

/// list_instructor_courses
///
/// [Authenticated Route] Courses owned by the calling instructor, in any status.
#[utoipa::path(
    get,
    path = "/courses/instructor",
    responses((status = 200, description = "Taught courses", body = [Course]))
)]
pub async fn list_instructor_courses(
    actor: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Course>>, AppError> {
    let courses = CourseLifecycle::new(state.repo.as_ref())
        .list_courses_for_instructor(&actor)
        .await?;
    Ok(Json(courses))
}

/// list_enrolled_courses
///
/// [Authenticated Route] Courses the calling student is enrolled in.
#[utoipa::path(
    get,
    path = "/courses/enrolled",
    responses((status = 200, description = "Enrolled courses", body = [Course]))
)]
pub async fn list_enrolled_courses(
    actor: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Course>>, AppError> {
    let courses = CourseLifecycle::new(state.repo.as_ref())
        .list_enrolled_courses(&actor)
        .await?;
    Ok(Json(courses))
}

/// get_course
///
/// [Authenticated Route] Course detail for admins, the owner and enrolled students.
#[utoipa::path(
    get,
    path = "/courses/{id}",
    params(("id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Found", body = Course),
        (status = 403, description = "Not permitted", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn get_course(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Course>, AppError> {
    let course = CourseLifecycle::new(state.repo.as_ref())
        .get_course(&actor, id)
        .await?;
    Ok(Json(course))
}

/// delete_course
///
/// [Authenticated Route] Owner or admin. Removes the course together with every
/// back-reference to it.
#[utoipa::path(
    delete,
    path = "/courses/{id}",
    params(("id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not permitted", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn delete_course(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    CourseLifecycle::new(state.repo.as_ref())
        .delete_course(&actor, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// enroll
///
/// [Authenticated Route] Student self-enrollment.
#[utoipa::path(
    post,
    path = "/courses/{id}/enroll",
    params(("id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Enrolled", body = MessageResponse),
        (status = 404, description = "Not Found", body = ErrorBody),
        (status = 409, description = "Already enrolled", body = ErrorBody)
    )
)]
pub async fn enroll(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    CourseLifecycle::new(state.repo.as_ref())
        .enroll(&actor, id)
        .await?;
    Ok(message("Enrolled successfully"))
}

/// add_lesson
#[utoipa::path(
    post,
    path = "/courses/{id}/lessons",
    params(("id" = Uuid, Path, description = "Course ID")),
    request_body = LessonInput,
    responses((status = 200, description = "Updated course", body = Course))
)]
pub async fn add_lesson(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<LessonInput>,
) -> Result<Json<Course>, AppError> {
    let course = CourseLifecycle::new(state.repo.as_ref())
        .add_lesson(&actor, id, payload)
        .await?;
    Ok(Json(course))
}

/// add_assignment
#[utoipa::path(
    post,
    path = "/courses/{id}/assignments",
    params(("id" = Uuid, Path, description = "Course ID")),
    request_body = AssignmentInput,
    responses((status = 200, description = "Updated course", body = Course))
)]
pub async fn add_assignment(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignmentInput>,
) -> Result<Json<Course>, AppError> {
    let course = CourseLifecycle::new(state.repo.as_ref())
        .add_assignment(&actor, id, payload)
        .await?;
    Ok(Json(course))
}

/// update_thumbnail
///
/// [Authenticated Route] Owner only. Takes an object key from `/upload/thumbnail`
/// or an external URL; `null` clears it.
#[utoipa::path(
    put,
    path = "/courses/{id}/thumbnail",
    params(("id" = Uuid, Path, description = "Course ID")),
    request_body = UpdateThumbnailRequest,
    responses((status = 200, description = "Updated course", body = Course))
)]
pub async fn update_thumbnail(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateThumbnailRequest>,
) -> Result<Json<Course>, AppError> {
    let course = CourseLifecycle::new(state.repo.as_ref())
        .update_thumbnail(&actor, id, payload.thumbnail)
        .await?;
    Ok(Json(course))
}

/// update_status
///
/// [Authenticated Route] Owner only. Draft and Published toggle; Upcoming can
/// only move to Published.
#[utoipa::path(
    put,
    path = "/courses/{id}/status",
    params(("id" = Uuid, Path, description = "Course ID")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Updated course", body = Course),
        (status = 400, description = "Transition not allowed", body = ErrorBody),
        (status = 409, description = "Changed concurrently", body = ErrorBody)
    )
)]
pub async fn update_status(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Course>, AppError> {
    let course = CourseLifecycle::new(state.repo.as_ref())
        .set_status(&actor, id, &payload.status)
        .await?;
    Ok(Json(course))
}

/// remove_student
///
/// [Authenticated Route] Owner only. Drops a student from the roster.
#[utoipa::path(
    delete,
    path = "/courses/{id}/students/{student_id}",
    params(
        ("id" = Uuid, Path, description = "Course ID"),
        ("student_id" = Uuid, Path, description = "Student ID")
    ),
    responses(
        (status = 200, description = "Removed", body = MessageResponse),
        (status = 400, description = "Not enrolled", body = ErrorBody),
        (status = 403, description = "Not permitted", body = ErrorBody)
    )
)]
pub async fn remove_student(
    actor: AuthUser,
    State(state): State<AppState>,
    Path((id, student_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<MessageResponse>, AppError> {
    CourseLifecycle::new(state.repo.as_ref())
        .remove_student(&actor, id, student_id)
        .await?;
    Ok(message("Student removed from course"))
}

// --- Administration ---

async fn list_role(state: &AppState, actor: &AuthUser, role: Role) -> Result<Json<Vec<PublicUser>>, AppError> {
    let users = Accounts::new(state.repo.as_ref(), &state.config)
        .list_accounts(actor, role)
        .await?;
    Ok(Json(users))
}

async fn create_role(
    state: &AppState,
    actor: &AuthUser,
    role: Role,
    payload: CreateAccountRequest,
) -> Result<(StatusCode, Json<PublicUser>), AppError> {
    let user = Accounts::new(state.repo.as_ref(), &state.config)
        .admin_create_account(actor, role, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// list_instructors
///
/// [Admin Route]
#[utoipa::path(
    get,
    path = "/admin/instructors",
    responses((status = 200, description = "Instructors", body = [PublicUser]))
)]
pub async fn list_instructors(
    actor: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<PublicUser>>, AppError> {
    list_role(&state, &actor, Role::Instructor).await
}

/// create_instructor
///
/// [Admin Route] The only way to obtain an instructor account.
#[utoipa::path(
    post,
    path = "/admin/instructors",
    request_body = CreateAccountRequest,
    responses(
        (status = 201, description = "Created", body = PublicUser),
        (status = 409, description = "Email already registered", body = ErrorBody)
    )
)]
pub async fn create_instructor(
    actor: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<PublicUser>), AppError> {
    create_role(&state, &actor, Role::Instructor, payload).await
}

/// list_students
///
/// [Admin Route]
#[utoipa::path(
    get,
    path = "/admin/students",
    responses((status = 200, description = "Students", body = [PublicUser]))
)]
pub async fn list_students(
    actor: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<PublicUser>>, AppError> {
    list_role(&state, &actor, Role::Student).await
}

/// create_student
#[utoipa::path(
    post,
    path = "/admin/students",
    request_body = CreateAccountRequest,
    responses((status = 201, description = "Created", body = PublicUser))
)]
pub async fn create_student(
    actor: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<PublicUser>), AppError> {
    create_role(&state, &actor, Role::Student, payload).await
}

/// list_admins
#[utoipa::path(
    get,
    path = "/admin/admins",
    responses((status = 200, description = "Admins", body = [PublicUser]))
)]
pub async fn list_admins(
    actor: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<PublicUser>>, AppError> {
    list_role(&state, &actor, Role::Admin).await
}

/// create_admin
#[utoipa::path(
    post,
    path = "/admin/admins",
    request_body = CreateAccountRequest,
    responses((status = 201, description = "Created", body = PublicUser))
)]
pub async fn create_admin(
    actor: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<PublicUser>), AppError> {
    create_role(&state, &actor, Role::Admin, payload).await
}

/// delete_user
///
/// [Admin Route] Deletes an account. For an instructor, every owned course is
/// deleted first, with its roster.
#[utoipa::path(
    delete,
    path = "/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not permitted", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn delete_user(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    CourseLifecycle::new(state.repo.as_ref())
        .delete_user(&actor, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// list_all_courses
///
/// [Admin Route] Every course regardless of status.
#[utoipa::path(
    get,
    path = "/admin/courses",
    responses((status = 200, description = "All courses", body = [Course]))
)]
pub async fn list_all_courses(
    actor: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Course>>, AppError> {
    let courses = CourseLifecycle::new(state.repo.as_ref())
        .list_all_courses(&actor)
        .await?;
    Ok(Json(courses))
}

/// admin_delete_course
///
/// [Admin Route] Same cascade as `DELETE /courses/{id}`.
#[utoipa::path(
    delete,
    path = "/admin/courses/{id}",
    params(("id" = Uuid, Path, description = "Course ID")),
    responses((status = 204, description = "Deleted"))
)]
pub async fn admin_delete_course(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    CourseLifecycle::new(state.repo.as_ref())
        .delete_course(&actor, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// get_admin_stats
///
/// [Admin Route] Dashboard counters.
#[utoipa::path(
    get,
    path = "/admin/stats",
    responses((status = 200, description = "Stats", body = AdminDashboardStats))
)]
pub async fn get_admin_stats(
    actor: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<AdminDashboardStats>, AppError> {
    let stats = CourseLifecycle::new(state.repo.as_ref())
        .stats(&actor)
        .await?;
    Ok(Json(stats))
}
