use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Enumerations ---

/// Role
///
/// The RBAC field carried by every account and by every issued token.
/// Fixed at account creation; no operation changes it afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    #[default]
    Student,
    Instructor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Instructor => "instructor",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "instructor" => Ok(Role::Instructor),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// CourseLevel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum CourseLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl CourseLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourseLevel::Beginner => "beginner",
            CourseLevel::Intermediate => "intermediate",
            CourseLevel::Advanced => "advanced",
        }
    }
}

impl FromStr for CourseLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "beginner" => Ok(CourseLevel::Beginner),
            "intermediate" => Ok(CourseLevel::Intermediate),
            "advanced" => Ok(CourseLevel::Advanced),
            other => Err(format!("unknown level '{other}'")),
        }
    }
}

/// CourseStatus
///
/// Draft and Published toggle into each other. Upcoming is only entered at
/// creation (with a future publish date) and only leaves towards Published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub enum CourseStatus {
    #[default]
    Draft,
    Published,
    Upcoming,
}

impl CourseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourseStatus::Draft => "Draft",
            CourseStatus::Published => "Published",
            CourseStatus::Upcoming => "Upcoming",
        }
    }

    /// Whether an existing course may move from `self` to `next`.
    /// Staying in the same state is accepted as a no-op.
    pub fn can_transition_to(&self, next: CourseStatus) -> bool {
        use CourseStatus::*;
        matches!(
            (self, next),
            (Draft, Draft)
                | (Draft, Published)
                | (Published, Published)
                | (Published, Draft)
                | (Upcoming, Upcoming)
                | (Upcoming, Published)
        )
    }
}

impl FromStr for CourseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Draft" => Ok(CourseStatus::Draft),
            "Published" => Ok(CourseStatus::Published),
            "Upcoming" => Ok(CourseStatus::Upcoming),
            other => Err(format!("unknown status '{other}'")),
        }
    }
}

// --- Identity Store Records ---

/// User
///
/// The canonical account record held by the identity store. It carries the
/// password credential and therefore never crosses the HTTP boundary; handlers
/// convert it into [`PublicUser`] first.
///
/// `courses` and `enrolled_courses` are back-references written only by the
/// course lifecycle layer (through the repository), never by clients.
#[derive(Debug, Clone, Default)]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    // Case-sensitive unique key.
    pub email: String,
    // Argon2id PHC string.
    pub password_hash: String,
    pub role: Role,
    pub specialization: Option<String>,
    pub qualifications: Option<String>,
    pub courses: Vec<Uuid>,
    pub enrolled_courses: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// PublicUser
///
/// Sanitized account representation returned by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct PublicUser {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qualifications: Option<String>,
    pub courses: Vec<Uuid>,
    pub enrolled_courses: Vec<Uuid>,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            role: user.role,
            specialization: user.specialization,
            qualifications: user.qualifications,
            courses: user.courses,
            enrolled_courses: user.enrolled_courses,
        }
    }
}

/// NewUser
///
/// Validated input handed to the identity store. The password has already been
/// derived into `password_hash` by the time this struct exists.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub specialization: Option<String>,
    pub qualifications: Option<String>,
}

// --- Course Store Records ---

/// Lesson
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct Lesson {
    pub title: String,
    pub description: String,
    // Blob reference (URL or object key); bytes never pass through this service.
    pub video_url: Option<String>,
    pub duration: String,
    pub order: i32,
}

/// Assignment
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct Assignment {
    pub title: String,
    pub description: String,
    #[ts(type = "string")]
    pub due_date: DateTime<Utc>,
    pub total_marks: i32,
}

/// Course
///
/// A course record with its roster. `enrolled_students` mirrors
/// `User.enrolled_courses`, and `instructor_id` mirrors `User.courses`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub instructor_id: Uuid,
    pub category: String,
    pub level: CourseLevel,
    pub price: f64,
    pub thumbnail: Option<String>,
    pub lessons: Vec<Lesson>,
    pub assignments: Vec<Assignment>,
    pub status: CourseStatus,
    pub publish_date: Option<DateTime<Utc>>,
    pub enrolled_students: Vec<Uuid>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl Course {
    pub fn is_enrolled(&self, student_id: Uuid) -> bool {
        self.enrolled_students.contains(&student_id)
    }
}

/// NewCourse
///
/// A course that passed boundary validation and has a resolved owner.
/// Always holds at least one lesson.
#[derive(Debug, Clone)]
pub struct NewCourse {
    pub title: String,
    pub description: String,
    pub instructor_id: Uuid,
    pub category: String,
    pub level: CourseLevel,
    pub price: f64,
    pub thumbnail: Option<String>,
    pub lessons: Vec<Lesson>,
    pub status: CourseStatus,
    pub publish_date: Option<DateTime<Utc>>,
}

// --- Request Payloads (Input Schemas) ---
//
// Required fields carry `#[serde(default)]` so that a missing field surfaces as
// a validation error from the service layer, not a deserialization rejection.

/// RegisterRequest
///
/// Input payload for self-service registration (POST /auth/register).
/// The password is hashed immediately and never persisted or logged in clear.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegisterRequest {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    // Only `student` is accepted here; elevated roles go through the admin routes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

/// LoginRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// CreateAccountRequest
///
/// Admin-issued account creation (POST /admin/{instructors,students,admins}).
/// The role comes from the route, not from the body.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateAccountRequest {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifications: Option<String>,
}

/// AuthResponse
///
/// Returned by register and login: the bearer token plus the sanitized account.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AuthResponse {
    pub token: String,
    pub user: PublicUser,
}

/// EmailExistsResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct EmailExistsResponse {
    pub exists: bool,
}

/// LessonInput
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LessonInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    // Defaults to "0:00".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    // Defaults to the next position in the course.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
}

/// AssignmentInput
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AssignmentInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_marks: Option<i32>,
}

/// CreateCourseRequest
///
/// Input payload for POST /courses.
///
/// * `instructor` must be set when an admin creates a course on behalf of an
///   instructor; an instructor may omit it or name themselves.
/// * `video_url` seeds the synthesized "Introduction" lesson when `lessons` is empty.
/// * `level` and `status` are parsed by the service so that bad values surface
///   as validation errors.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateCourseRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lessons: Vec<LessonInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructor: Option<Uuid>,
}

/// UpdateThumbnailRequest
///
/// `None` clears the thumbnail.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateThumbnailRequest {
    #[serde(default)]
    pub thumbnail: Option<String>,
}

/// UpdateStatusRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateStatusRequest {
    #[serde(default)]
    pub status: String,
}

/// PresignedUrlRequest
///
/// Input payload for requesting a short-lived upload URL (POST /upload/{kind}).
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlRequest {
    /// The original filename, used to derive and check the file extension.
    #[schema(example = "intro.mp4")]
    pub filename: String,
    /// The MIME type the upload will be constrained to.
    #[schema(example = "video/mp4")]
    pub file_type: String,
}

/// PresignedUrlResponse
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlResponse {
    /// The time-limited URL for the PUT request.
    pub upload_url: String,
    /// The object key to store on the course or lesson.
    pub resource_key: String,
}

/// MessageResponse
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

// --- Dashboard Schemas (Output) ---

/// AdminDashboardStats
///
/// Output schema for GET /admin/stats.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct AdminDashboardStats {
    pub total_students: i64,
    pub total_instructors: i64,
    pub total_admins: i64,
    pub total_courses: i64,
    pub published_courses: i64,
    pub total_enrollments: i64,
}
