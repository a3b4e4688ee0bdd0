use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    models::{
        AdminDashboardStats, Assignment, Course, CourseStatus, Lesson, NewCourse, NewUser, Role,
        User,
    },
    repository::{Repository, StoreError},
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    // email -> user id; enforces global email uniqueness.
    emails: HashMap<String, Uuid>,
    courses: HashMap<Uuid, Course>,
}

impl Tables {
    fn sorted_courses<F>(&self, filter: F) -> Vec<Course>
    where
        F: Fn(&Course) -> bool,
    {
        let mut courses: Vec<Course> = self.courses.values().filter(|&c| filter(c)).cloned().collect();
        courses.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        courses
    }

    fn touch(&mut self, course_id: Uuid) -> Option<&mut Course> {
        let course = self.courses.get_mut(&course_id)?;
        course.updated_at = Utc::now();
        Some(course)
    }
}

/// InMemoryRepository
///
/// A `Repository` kept entirely in process memory. Used when the service runs
/// locally without `DATABASE_URL`, and as the store behind the test suite.
///
/// Both sides of every link are stored explicitly (`Course.enrolled_students`
/// and `User.enrolled_courses`, `Course.instructor_id` and `User.courses`).
/// Every operation that touches more than one record runs under the single
/// write lock, which is what makes the dual writes atomic for other callers.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: RwLock<Tables>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.emails.contains_key(&user.email) {
            return Err(StoreError::AlreadyExists);
        }

        let now = Utc::now();
        let record = User {
            id: Uuid::new_v4(),
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            specialization: user.specialization,
            qualifications: user.qualifications,
            courses: Vec::new(),
            enrolled_courses: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        tables.emails.insert(record.email.clone(), record.id);
        tables.users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .emails
            .get(email)
            .and_then(|id| tables.users.get(id))
            .cloned())
    }

    async fn list_users_by_role(&self, role: Role) -> Result<Vec<User>, StoreError> {
        let tables = self.tables.read().await;
        let mut users: Vec<User> = tables
            .users
            .values()
            .filter(|u| u.role == role)
            .cloned()
            .collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(users)
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.courses.values().any(|c| c.instructor_id == id) {
            return Err(StoreError::Conflict("user still owns courses".to_string()));
        }

        let Some(user) = tables.users.remove(&id) else {
            return Ok(false);
        };
        tables.emails.remove(&user.email);
        for course_id in &user.enrolled_courses {
            if let Some(course) = tables.courses.get_mut(course_id) {
                course.enrolled_students.retain(|s| *s != id);
            }
        }
        Ok(true)
    }

    async fn create_course(&self, course: NewCourse) -> Result<Course, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&course.instructor_id) {
            return Err(StoreError::Conflict("instructor no longer exists".to_string()));
        }

        let now = Utc::now();
        let record = Course {
            id: Uuid::new_v4(),
            title: course.title,
            description: course.description,
            instructor_id: course.instructor_id,
            category: course.category,
            level: course.level,
            price: course.price,
            thumbnail: course.thumbnail,
            lessons: course.lessons,
            assignments: Vec::new(),
            status: course.status,
            publish_date: course.publish_date,
            enrolled_students: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        if let Some(instructor) = tables.users.get_mut(&record.instructor_id) {
            instructor.courses.push(record.id);
        }
        tables.courses.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_course(&self, id: Uuid) -> Result<Option<Course>, StoreError> {
        Ok(self.tables.read().await.courses.get(&id).cloned())
    }

    async fn list_courses(&self, status: Option<CourseStatus>) -> Result<Vec<Course>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.sorted_courses(|c| status.is_none_or(|s| c.status == s)))
    }

    async fn list_courses_by_instructor(&self, instructor_id: Uuid) -> Result<Vec<Course>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.sorted_courses(|c| c.instructor_id == instructor_id))
    }

    async fn list_courses_by_student(&self, student_id: Uuid) -> Result<Vec<Course>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.sorted_courses(|c| c.is_enrolled(student_id)))
    }

    async fn push_lesson(&self, course_id: Uuid, lesson: Lesson) -> Result<Option<Course>, StoreError> {
        let mut tables = self.tables.write().await;
        Ok(tables.touch(course_id).map(|course| {
            course.lessons.push(lesson);
            course.clone()
        }))
    }

    async fn push_assignment(
        &self,
        course_id: Uuid,
        assignment: Assignment,
    ) -> Result<Option<Course>, StoreError> {
        let mut tables = self.tables.write().await;
        Ok(tables.touch(course_id).map(|course| {
            course.assignments.push(assignment);
            course.clone()
        }))
    }

    async fn set_thumbnail(
        &self,
        course_id: Uuid,
        thumbnail: Option<String>,
    ) -> Result<Option<Course>, StoreError> {
        let mut tables = self.tables.write().await;
        Ok(tables.touch(course_id).map(|course| {
            course.thumbnail = thumbnail;
            course.clone()
        }))
    }

    async fn set_status(
        &self,
        course_id: Uuid,
        from: CourseStatus,
        to: CourseStatus,
    ) -> Result<Option<Course>, StoreError> {
        let mut tables = self.tables.write().await;
        match tables.courses.get(&course_id) {
            Some(course) if course.status == from => {}
            _ => return Ok(None),
        }
        Ok(tables.touch(course_id).map(|course| {
            course.status = to;
            course.clone()
        }))
    }

    async fn add_student(&self, course_id: Uuid, student_id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&student_id) {
            return Err(StoreError::NotFound);
        }
        let Some(course) = tables.courses.get_mut(&course_id) else {
            return Err(StoreError::NotFound);
        };
        if course.is_enrolled(student_id) {
            return Ok(false);
        }
        course.enrolled_students.push(student_id);

        if let Some(student) = tables.users.get_mut(&student_id) {
            student.enrolled_courses.push(course_id);
        }
        Ok(true)
    }

    async fn remove_student(&self, course_id: Uuid, student_id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(course) = tables.courses.get_mut(&course_id) else {
            return Err(StoreError::NotFound);
        };
        let before = course.enrolled_students.len();
        course.enrolled_students.retain(|s| *s != student_id);
        if course.enrolled_students.len() == before {
            return Ok(false);
        }

        if let Some(student) = tables.users.get_mut(&student_id) {
            student.enrolled_courses.retain(|c| *c != course_id);
        }
        Ok(true)
    }

    async fn delete_course(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(course) = tables.courses.remove(&id) else {
            return Ok(false);
        };

        if let Some(instructor) = tables.users.get_mut(&course.instructor_id) {
            instructor.courses.retain(|c| *c != id);
        }
        for student_id in &course.enrolled_students {
            if let Some(student) = tables.users.get_mut(student_id) {
                student.enrolled_courses.retain(|c| *c != id);
            }
        }
        Ok(true)
    }

    async fn get_stats(&self) -> Result<AdminDashboardStats, StoreError> {
        let tables = self.tables.read().await;
        let count_role = |role: Role| tables.users.values().filter(|u| u.role == role).count() as i64;

        Ok(AdminDashboardStats {
            total_students: count_role(Role::Student),
            total_instructors: count_role(Role::Instructor),
            total_admins: count_role(Role::Admin),
            total_courses: tables.courses.len() as i64,
            published_courses: tables
                .courses
                .values()
                .filter(|c| c.status == CourseStatus::Published)
                .count() as i64,
            total_enrollments: tables
                .courses
                .values()
                .map(|c| c.enrolled_students.len() as i64)
                .sum(),
        })
    }
}
