use chrono::Utc;
use lms_portal::{
    models::{Assignment, CourseLevel, CourseStatus, Lesson, NewCourse, NewUser, Role, User},
    repository::{PostgresRepository, Repository, StoreError},
};
use sqlx::PgPool;
use uuid::Uuid;

// --- Test Context and Setup ---

/// Holds the database pool for a test. These tests talk to a real Postgres
/// and are skipped when `DATABASE_URL` is not set.
struct DbTestContext {
    pool: PgPool,
}

impl DbTestContext {
    async fn setup() -> Option<Self> {
        dotenv::dotenv().ok();

        let Ok(db_url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set, skipping Postgres integration test");
            return None;
        };

        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        PostgresRepository::new(pool.clone())
            .migrate()
            .await
            .expect("Failed to run database migrations.");

        Some(DbTestContext { pool })
    }

    fn repository(&self) -> PostgresRepository {
        PostgresRepository::new(self.pool.clone())
    }
}

// --- Test Data Helpers ---

async fn create_test_user(repo: &PostgresRepository, role: Role) -> User {
    repo.create_user(NewUser {
        first_name: "Db".to_string(),
        last_name: "Test".to_string(),
        // Tests share one database; keep every email unique.
        email: format!("{}-{}@test.com", role, Uuid::new_v4()),
        password_hash: "$argon2id$placeholder".to_string(),
        role,
        specialization: None,
        qualifications: None,
    })
    .await
    .expect("Failed to create test user")
}

fn new_course(instructor_id: Uuid, status: CourseStatus) -> NewCourse {
    NewCourse {
        title: "Databases".to_string(),
        description: "Relational modelling".to_string(),
        instructor_id,
        category: "Data".to_string(),
        level: CourseLevel::Intermediate,
        price: 25.0,
        thumbnail: None,
        lessons: vec![Lesson {
            title: "Introduction".to_string(),
            description: "Course introduction".to_string(),
            video_url: None,
            duration: "0:00".to_string(),
            order: 1,
        }],
        status,
        publish_date: None,
    }
}

// --- Tests ---

#[tokio::test]
async fn test_create_and_find_user() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();
    let user = create_test_user(&repo, Role::Instructor).await;

    let by_id = repo.get_user(user.id).await.unwrap().unwrap();
    assert_eq!(by_id.email, user.email);
    assert_eq!(by_id.role, Role::Instructor);

    let by_email = repo.find_user_by_email(&user.email).await.unwrap().unwrap();
    assert_eq!(by_email.id, user.id);

    // UNIQUE(email) is the duplicate check of record.
    let duplicate = repo
        .create_user(NewUser {
            first_name: "Copy".to_string(),
            last_name: "Cat".to_string(),
            email: user.email.clone(),
            password_hash: "x".to_string(),
            role: Role::Student,
            specialization: None,
            qualifications: None,
        })
        .await;
    assert_eq!(duplicate.unwrap_err(), StoreError::AlreadyExists);
}

#[tokio::test]
async fn test_course_round_trip_and_back_reference() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();
    let instructor = create_test_user(&repo, Role::Instructor).await;

    let course = repo
        .create_course(new_course(instructor.id, CourseStatus::Draft))
        .await
        .unwrap();
    assert_eq!(course.lessons.len(), 1);
    assert_eq!(course.level, CourseLevel::Intermediate);
    assert!(course.assignments.is_empty());

    let owner = repo.get_user(instructor.id).await.unwrap().unwrap();
    assert_eq!(owner.courses, vec![course.id]);

    let taught = repo.list_courses_by_instructor(instructor.id).await.unwrap();
    assert_eq!(taught.len(), 1);
}

#[tokio::test]
async fn test_create_course_for_missing_instructor() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();

    let result = repo
        .create_course(new_course(Uuid::new_v4(), CourseStatus::Draft))
        .await;
    assert!(matches!(result, Err(StoreError::Conflict(_))));
}

#[tokio::test]
async fn test_enrollment_links_both_sides() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();
    let instructor = create_test_user(&repo, Role::Instructor).await;
    let student = create_test_user(&repo, Role::Student).await;
    let course = repo
        .create_course(new_course(instructor.id, CourseStatus::Published))
        .await
        .unwrap();

    assert!(repo.add_student(course.id, student.id).await.unwrap());
    // Second insert for the same pair is a no-op.
    assert!(!repo.add_student(course.id, student.id).await.unwrap());

    let course_view = repo.get_course(course.id).await.unwrap().unwrap();
    let student_view = repo.get_user(student.id).await.unwrap().unwrap();
    assert_eq!(course_view.enrolled_students, vec![student.id]);
    assert_eq!(student_view.enrolled_courses, vec![course.id]);

    let enrolled = repo.list_courses_by_student(student.id).await.unwrap();
    assert_eq!(enrolled.len(), 1);

    assert!(repo.remove_student(course.id, student.id).await.unwrap());
    assert!(!repo.remove_student(course.id, student.id).await.unwrap());
    let student_view = repo.get_user(student.id).await.unwrap().unwrap();
    assert!(student_view.enrolled_courses.is_empty());

    let missing = repo.add_student(Uuid::new_v4(), student.id).await;
    assert_eq!(missing.unwrap_err(), StoreError::NotFound);
}

#[tokio::test]
async fn test_course_content_appends() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();
    let instructor = create_test_user(&repo, Role::Instructor).await;
    let course = repo
        .create_course(new_course(instructor.id, CourseStatus::Draft))
        .await
        .unwrap();

    let lesson = Lesson {
        title: "Normal forms".to_string(),
        description: String::new(),
        video_url: Some("videos/nf.mp4".to_string()),
        duration: "12:30".to_string(),
        order: 2,
    };
    let updated = repo.push_lesson(course.id, lesson.clone()).await.unwrap().unwrap();
    assert_eq!(updated.lessons.last(), Some(&lesson));

    let assignment = Assignment {
        title: "ER diagram".to_string(),
        description: "Model a library".to_string(),
        due_date: Utc::now(),
        total_marks: 20,
    };
    let updated = repo
        .push_assignment(course.id, assignment)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.assignments.len(), 1);

    let updated = repo
        .set_thumbnail(course.id, Some("thumbnails/db.png".to_string()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.thumbnail.as_deref(), Some("thumbnails/db.png"));

    assert!(repo.push_lesson(Uuid::new_v4(), lesson).await.unwrap().is_none());
}

#[tokio::test]
async fn test_status_compare_and_set() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();
    let instructor = create_test_user(&repo, Role::Instructor).await;
    let course = repo
        .create_course(new_course(instructor.id, CourseStatus::Draft))
        .await
        .unwrap();

    let published = repo
        .set_status(course.id, CourseStatus::Draft, CourseStatus::Published)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(published.status, CourseStatus::Published);

    // Stale `from` loses.
    let stale = repo
        .set_status(course.id, CourseStatus::Draft, CourseStatus::Published)
        .await
        .unwrap();
    assert!(stale.is_none());

    let published_list = repo.list_courses(Some(CourseStatus::Published)).await.unwrap();
    assert!(published_list.iter().any(|c| c.id == course.id));
    assert!(published_list.iter().all(|c| c.status == CourseStatus::Published));
}

#[tokio::test]
async fn test_delete_course_clears_rosters() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();
    let instructor = create_test_user(&repo, Role::Instructor).await;
    let student = create_test_user(&repo, Role::Student).await;
    let course = repo
        .create_course(new_course(instructor.id, CourseStatus::Published))
        .await
        .unwrap();
    repo.add_student(course.id, student.id).await.unwrap();

    assert!(repo.delete_course(course.id).await.unwrap());
    assert!(!repo.delete_course(course.id).await.unwrap());

    assert!(repo.get_course(course.id).await.unwrap().is_none());
    let student_view = repo.get_user(student.id).await.unwrap().unwrap();
    let owner_view = repo.get_user(instructor.id).await.unwrap().unwrap();
    assert!(student_view.enrolled_courses.is_empty());
    assert!(owner_view.courses.is_empty());
}

#[tokio::test]
async fn test_delete_user_rules() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();
    let instructor = create_test_user(&repo, Role::Instructor).await;
    let student = create_test_user(&repo, Role::Student).await;
    let course = repo
        .create_course(new_course(instructor.id, CourseStatus::Published))
        .await
        .unwrap();
    repo.add_student(course.id, student.id).await.unwrap();

    // An instructor who still owns courses cannot be removed directly.
    let blocked = repo.delete_user(instructor.id).await;
    assert!(matches!(blocked, Err(StoreError::Conflict(_))));

    // A student is pulled out of every roster with the account.
    assert!(repo.delete_user(student.id).await.unwrap());
    let course_view = repo.get_course(course.id).await.unwrap().unwrap();
    assert!(course_view.enrolled_students.is_empty());
    assert!(!repo.delete_user(student.id).await.unwrap());
}
