use crate::models::{
    AdminDashboardStats, Assignment, Course, CourseStatus, Lesson, NewCourse, NewUser, Role, User,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, types::Json};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// StoreError
///
/// Uniform error type for every store backend. The service layer converts it
/// into the public `AppError` taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("record already exists")]
    AlreadyExists,
    #[error("conflicting update: {0}")]
    Conflict(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("malformed record: {0}")]
    Malformed(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::AlreadyExists,
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                StoreError::Conflict(db.message().to_string())
            }
            sqlx::Error::Database(db) if db.is_check_violation() => {
                StoreError::Malformed(db.message().to_string())
            }
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::TypeNotFound { .. } => StoreError::Malformed(err.to_string()),
            _ => StoreError::Unavailable(err.to_string()),
        }
    }
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

/// Repository Trait
///
/// The persistence contract for the identity store and the course store.
///
/// Link maintenance lives here as single calls so that each backend can make
/// them atomic: `add_student` / `remove_student` update both sides of the
/// roster link, `delete_course` pulls the course out of every back-reference,
/// and `delete_user` pulls a student out of every roster.
///
/// **Send + Sync + async_trait** make `Arc<dyn Repository>` shareable across
/// Axum's task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Identity Store ---
    /// Fails with `AlreadyExists` if the email is taken.
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError>;
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn list_users_by_role(&self, role: Role) -> Result<Vec<User>, StoreError>;
    /// Removes the account and its roster entries. Fails with `Conflict`
    /// while any course still names the user as instructor.
    async fn delete_user(&self, id: Uuid) -> Result<bool, StoreError>;

    // --- Course Store ---
    /// Fails with `Conflict` if the instructor vanished before the insert.
    async fn create_course(&self, course: NewCourse) -> Result<Course, StoreError>;
    async fn get_course(&self, id: Uuid) -> Result<Option<Course>, StoreError>;
    /// All courses, or only those in `status`.
    async fn list_courses(&self, status: Option<CourseStatus>) -> Result<Vec<Course>, StoreError>;
    async fn list_courses_by_instructor(&self, instructor_id: Uuid) -> Result<Vec<Course>, StoreError>;
    async fn list_courses_by_student(&self, student_id: Uuid) -> Result<Vec<Course>, StoreError>;

    async fn push_lesson(&self, course_id: Uuid, lesson: Lesson) -> Result<Option<Course>, StoreError>;
    async fn push_assignment(
        &self,
        course_id: Uuid,
        assignment: Assignment,
    ) -> Result<Option<Course>, StoreError>;
    async fn set_thumbnail(
        &self,
        course_id: Uuid,
        thumbnail: Option<String>,
    ) -> Result<Option<Course>, StoreError>;
    /// Compare-and-set: only applies when the stored status still equals `from`.
    /// Returns `None` when the course is missing or its status moved on.
    async fn set_status(
        &self,
        course_id: Uuid,
        from: CourseStatus,
        to: CourseStatus,
    ) -> Result<Option<Course>, StoreError>;

    // --- Roster Links ---
    /// Atomic add-to-set. `Ok(false)` if the student was already on the roster,
    /// `NotFound` if the course does not exist.
    async fn add_student(&self, course_id: Uuid, student_id: Uuid) -> Result<bool, StoreError>;
    /// `Ok(false)` if the student was not on the roster.
    async fn remove_student(&self, course_id: Uuid, student_id: Uuid) -> Result<bool, StoreError>;
    /// Removes the course and every reference to it in one step.
    async fn delete_course(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn get_stats(&self) -> Result<AdminDashboardStats, StoreError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

// --- Row Mapping ---

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    first_name: String,
    last_name: String,
    email: String,
    password_hash: String,
    role: String,
    specialization: Option<String>,
    qualifications: Option<String>,
    courses: Vec<Uuid>,
    enrolled_courses: Vec<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            password_hash: row.password_hash,
            role: row.role.parse().map_err(StoreError::Malformed)?,
            specialization: row.specialization,
            qualifications: row.qualifications,
            courses: row.courses,
            enrolled_courses: row.enrolled_courses,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CourseRow {
    id: Uuid,
    title: String,
    description: String,
    instructor_id: Uuid,
    category: String,
    level: String,
    price: f64,
    thumbnail: Option<String>,
    lessons: Json<Vec<Lesson>>,
    assignments: Json<Vec<Assignment>>,
    status: String,
    publish_date: Option<DateTime<Utc>>,
    enrolled_students: Vec<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CourseRow> for Course {
    type Error = StoreError;

    fn try_from(row: CourseRow) -> Result<Self, Self::Error> {
        Ok(Course {
            id: row.id,
            title: row.title,
            description: row.description,
            instructor_id: row.instructor_id,
            category: row.category,
            level: row.level.parse().map_err(StoreError::Malformed)?,
            price: row.price,
            thumbnail: row.thumbnail,
            lessons: row.lessons.0,
            assignments: row.assignments.0,
            status: row.status.parse().map_err(StoreError::Malformed)?,
            publish_date: row.publish_date,
            enrolled_students: row.enrolled_students,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// Back-references are derived from the owning tables, so both sides of a link
// always read from the same rows.
const USER_SELECT: &str = r#"
    SELECT
        u.id, u.first_name, u.last_name, u.email, u.password_hash, u.role,
        u.specialization, u.qualifications, u.created_at, u.updated_at,
        ARRAY(SELECT c.id FROM courses c WHERE c.instructor_id = u.id ORDER BY c.created_at, c.id) AS courses,
        ARRAY(SELECT e.course_id FROM enrollments e WHERE e.student_id = u.id ORDER BY e.enrolled_at, e.course_id) AS enrolled_courses
    FROM users u
"#;

const COURSE_SELECT: &str = r#"
    SELECT
        c.id, c.title, c.description, c.instructor_id, c.category, c.level, c.price,
        c.thumbnail, c.lessons, c.assignments, c.status, c.publish_date,
        c.created_at, c.updated_at,
        ARRAY(SELECT e.student_id FROM enrollments e WHERE e.course_id = c.id ORDER BY e.enrolled_at, e.student_id) AS enrolled_students
    FROM courses c
"#;

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the bundled schema migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    async fn fetch_courses(&self, sql: &str, bind: Option<String>) -> Result<Vec<Course>, StoreError> {
        let mut query = sqlx::query_as::<_, CourseRow>(sql);
        if let Some(value) = bind {
            query = query.bind(value);
        }
        query
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Course::try_from)
            .collect()
    }

    async fn fetch_courses_by_id(&self, sql: &str, id: Uuid) -> Result<Vec<Course>, StoreError> {
        sqlx::query_as::<_, CourseRow>(sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Course::try_from)
            .collect()
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    /// create_user
    ///
    /// The `UNIQUE(email)` constraint is the source of truth for duplicates, so
    /// two concurrent registrations cannot both succeed.
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"INSERT INTO users (id, first_name, last_name, email, password_hash, role, specialization, qualifications, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW())"#,
        )
        .bind(id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(&user.specialization)
        .bind(&user.qualifications)
        .execute(&self.pool)
        .await?;

        self.get_user(id).await?.ok_or(StoreError::NotFound)
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let sql = format!("{USER_SELECT} WHERE u.id = $1");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("{USER_SELECT} WHERE u.email = $1");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn list_users_by_role(&self, role: Role) -> Result<Vec<User>, StoreError> {
        let sql = format!("{USER_SELECT} WHERE u.role = $1 ORDER BY u.created_at DESC");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(role.as_str())
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(User::try_from)
            .collect()
    }

    /// delete_user
    ///
    /// Roster entries go first, in the same transaction as the account row.
    /// `courses.instructor_id ... ON DELETE RESTRICT` turns a course created
    /// concurrently for this instructor into a `Conflict` instead of an orphan.
    async fn delete_user(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM enrollments WHERE student_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(deleted > 0)
    }

    async fn create_course(&self, course: NewCourse) -> Result<Course, StoreError> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"INSERT INTO courses (id, title, description, instructor_id, category, level, price, thumbnail, lessons, assignments, status, publish_date, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, '[]'::jsonb, $10, $11, NOW(), NOW())"#,
        )
        .bind(id)
        .bind(&course.title)
        .bind(&course.description)
        .bind(course.instructor_id)
        .bind(&course.category)
        .bind(course.level.as_str())
        .bind(course.price)
        .bind(&course.thumbnail)
        .bind(Json(&course.lessons))
        .bind(course.status.as_str())
        .bind(course.publish_date)
        .execute(&self.pool)
        .await?;

        self.get_course(id).await?.ok_or(StoreError::NotFound)
    }

    async fn get_course(&self, id: Uuid) -> Result<Option<Course>, StoreError> {
        let sql = format!("{COURSE_SELECT} WHERE c.id = $1");
        sqlx::query_as::<_, CourseRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Course::try_from)
            .transpose()
    }

    async fn list_courses(&self, status: Option<CourseStatus>) -> Result<Vec<Course>, StoreError> {
        match status {
            Some(status) => {
                let sql = format!("{COURSE_SELECT} WHERE c.status = $1 ORDER BY c.created_at DESC");
                self.fetch_courses(&sql, Some(status.as_str().to_string())).await
            }
            None => {
                let sql = format!("{COURSE_SELECT} ORDER BY c.created_at DESC");
                self.fetch_courses(&sql, None).await
            }
        }
    }

    async fn list_courses_by_instructor(&self, instructor_id: Uuid) -> Result<Vec<Course>, StoreError> {
        let sql = format!("{COURSE_SELECT} WHERE c.instructor_id = $1 ORDER BY c.created_at DESC");
        self.fetch_courses_by_id(&sql, instructor_id).await
    }

    async fn list_courses_by_student(&self, student_id: Uuid) -> Result<Vec<Course>, StoreError> {
        let sql = format!(
            "{COURSE_SELECT} WHERE EXISTS (SELECT 1 FROM enrollments e WHERE e.course_id = c.id AND e.student_id = $1) ORDER BY c.created_at DESC"
        );
        self.fetch_courses_by_id(&sql, student_id).await
    }

    /// push_lesson
    ///
    /// Appends inside a single UPDATE so concurrent appends never overwrite each other.
    async fn push_lesson(&self, course_id: Uuid, lesson: Lesson) -> Result<Option<Course>, StoreError> {
        let updated = sqlx::query(
            "UPDATE courses SET lessons = lessons || jsonb_build_array($2::jsonb), updated_at = NOW() WHERE id = $1",
        )
        .bind(course_id)
        .bind(Json(&lesson))
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Ok(None);
        }
        self.get_course(course_id).await
    }

    async fn push_assignment(
        &self,
        course_id: Uuid,
        assignment: Assignment,
    ) -> Result<Option<Course>, StoreError> {
        let updated = sqlx::query(
            "UPDATE courses SET assignments = assignments || jsonb_build_array($2::jsonb), updated_at = NOW() WHERE id = $1",
        )
        .bind(course_id)
        .bind(Json(&assignment))
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Ok(None);
        }
        self.get_course(course_id).await
    }

    async fn set_thumbnail(
        &self,
        course_id: Uuid,
        thumbnail: Option<String>,
    ) -> Result<Option<Course>, StoreError> {
        let updated = sqlx::query("UPDATE courses SET thumbnail = $2, updated_at = NOW() WHERE id = $1")
            .bind(course_id)
            .bind(thumbnail)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if updated == 0 {
            return Ok(None);
        }
        self.get_course(course_id).await
    }

    async fn set_status(
        &self,
        course_id: Uuid,
        from: CourseStatus,
        to: CourseStatus,
    ) -> Result<Option<Course>, StoreError> {
        let updated = sqlx::query(
            "UPDATE courses SET status = $3, updated_at = NOW() WHERE id = $1 AND status = $2",
        )
        .bind(course_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Ok(None);
        }
        self.get_course(course_id).await
    }

    /// add_student
    ///
    /// Uses `ON CONFLICT DO NOTHING` on the composite key so that concurrent
    /// enrollments for the same pair insert at most one row.
    async fn add_student(&self, course_id: Uuid, student_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "INSERT INTO enrollments (course_id, student_id, enrolled_at) VALUES ($1, $2, NOW()) ON CONFLICT DO NOTHING",
        )
        .bind(course_id)
        .bind(student_id)
        .execute(&self.pool)
        .await;

        match result {
            Ok(res) => Ok(res.rows_affected() > 0),
            // The course (or student) disappeared between the caller's check and the insert.
            Err(e) if is_foreign_key_violation(&e) => Err(StoreError::NotFound),
            Err(e) => {
                tracing::error!("add_student error: {:?}", e);
                Err(e.into())
            }
        }
    }

    async fn remove_student(&self, course_id: Uuid, student_id: Uuid) -> Result<bool, StoreError> {
        let res = sqlx::query("DELETE FROM enrollments WHERE course_id = $1 AND student_id = $2")
            .bind(course_id)
            .bind(student_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    /// delete_course
    ///
    /// Locks the course row, clears its roster and removes it in one
    /// transaction. The instructor's back-reference is derived from
    /// `courses.instructor_id` and disappears with the row.
    async fn delete_course(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query_scalar::<_, Uuid>("SELECT id FROM courses WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("DELETE FROM enrollments WHERE course_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// get_stats
    ///
    /// Compiles all dashboard counters in a single round-trip.
    async fn get_stats(&self) -> Result<AdminDashboardStats, StoreError> {
        let (total_students, total_instructors, total_admins, total_courses, published_courses, total_enrollments) =
            sqlx::query_as::<_, (i64, i64, i64, i64, i64, i64)>(
                r#"
                SELECT
                    (SELECT COUNT(*) FROM users WHERE role = 'student'),
                    (SELECT COUNT(*) FROM users WHERE role = 'instructor'),
                    (SELECT COUNT(*) FROM users WHERE role = 'admin'),
                    (SELECT COUNT(*) FROM courses),
                    (SELECT COUNT(*) FROM courses WHERE status = 'Published'),
                    (SELECT COUNT(*) FROM enrollments)
                "#,
            )
            .fetch_one(&self.pool)
            .await?;

        Ok(AdminDashboardStats {
            total_students,
            total_instructors,
            total_admins,
            total_courses,
            published_courses,
            total_enrollments,
        })
    }
}
