use chrono::Utc;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::AppError,
    models::{
        AdminDashboardStats, Assignment, AssignmentInput, Course, CourseLevel, CourseStatus,
        CreateCourseRequest, Lesson, LessonInput, NewCourse, Role,
    },
    policy::{self, Action, Resource},
    repository::{Repository, StoreError},
};

/// Attempts made by `delete_user` when new courses keep appearing for the
/// instructor being removed.
const DELETE_USER_ATTEMPTS: usize = 3;

const INTRO_DURATION: &str = "0:00";

fn required(field: &str, value: &str) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::validation(format!("{field} is required")));
    }
    Ok(value.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn lesson_from_input(input: LessonInput, default_order: i32) -> Result<Lesson, AppError> {
    let order = input.order.unwrap_or(default_order);
    if order < 1 {
        return Err(AppError::validation("lesson order must be positive"));
    }
    Ok(Lesson {
        title: required("lesson title", &input.title)?,
        description: input.description.trim().to_string(),
        video_url: optional(input.video_url),
        duration: optional(input.duration).unwrap_or_else(|| INTRO_DURATION.to_string()),
        order,
    })
}

fn introduction(video_url: Option<String>) -> Lesson {
    Lesson {
        title: "Introduction".to_string(),
        description: "Course introduction".to_string(),
        video_url,
        duration: INTRO_DURATION.to_string(),
        order: 1,
    }
}

/// validate_course
///
/// Turns the raw payload into a `NewCourse` for `instructor_id`. Runs before
/// any store access, so a rejected payload never leaves a partial write.
fn validate_course(req: CreateCourseRequest, instructor_id: Uuid) -> Result<NewCourse, AppError> {
    let title = required("title", &req.title)?;
    let description = required("description", &req.description)?;
    let category = required("category", &req.category)?;
    let level: CourseLevel = required("level", &req.level)?
        .to_lowercase()
        .parse()
        .map_err(AppError::Validation)?;

    let price = req.price.unwrap_or(0.0);
    if !price.is_finite() || price < 0.0 {
        return Err(AppError::validation("price must be a non-negative number"));
    }

    let status = match optional(req.status) {
        None => CourseStatus::Draft,
        Some(raw) => raw.parse().map_err(AppError::Validation)?,
    };
    if status == CourseStatus::Upcoming {
        match req.publish_date {
            Some(date) if date > Utc::now() => {}
            _ => {
                return Err(AppError::validation(
                    "an upcoming course needs a publish_date in the future",
                ));
            }
        }
    }

    let lessons = if req.lessons.is_empty() {
        vec![introduction(optional(req.video_url))]
    } else {
        req.lessons
            .into_iter()
            .enumerate()
            .map(|(idx, input)| lesson_from_input(input, idx as i32 + 1))
            .collect::<Result<Vec<_>, _>>()?
    };

    Ok(NewCourse {
        title,
        description,
        instructor_id,
        category,
        level,
        price,
        thumbnail: optional(req.thumbnail),
        lessons,
        status,
        publish_date: req.publish_date,
    })
}

/// CourseLifecycle
///
/// Orchestrates every course mutation: it consults the policy with an explicit
/// actor, then applies the change through the repository, which keeps both sides
/// of the instructor and roster links in step.
///
/// Lookups come before policy checks, so a missing course is always reported as
/// `NotFound` whoever asks.
pub struct CourseLifecycle<'a> {
    repo: &'a dyn Repository,
}

impl<'a> CourseLifecycle<'a> {
    pub fn new(repo: &'a dyn Repository) -> Self {
        Self { repo }
    }

    async fn load(&self, course_id: Uuid) -> Result<Course, AppError> {
        self.repo
            .get_course(course_id)
            .await?
            .ok_or_else(|| AppError::not_found("course"))
    }

    /// create_course
    ///
    /// Instructors create for themselves; admins must name the owning instructor.
    /// The owner has to exist and hold the instructor role.
    pub async fn create_course(
        &self,
        actor: &AuthUser,
        req: CreateCourseRequest,
    ) -> Result<Course, AppError> {
        let instructor_id = match (actor.role, req.instructor) {
            (Role::Instructor, target) => target.unwrap_or(actor.id),
            (Role::Admin, Some(target)) => target,
            (Role::Admin, None) => {
                return Err(AppError::validation(
                    "instructor is required when an admin creates a course",
                ));
            }
            (Role::Student, _) => actor.id,
        };
        policy::require(Some(actor), Action::CreateCourse, Resource::OnBehalfOf(instructor_id))?;

        let new_course = validate_course(req, instructor_id)?;

        let owner = self
            .repo
            .get_user(instructor_id)
            .await?
            .ok_or_else(|| AppError::not_found("instructor"))?;
        if owner.role != Role::Instructor {
            return Err(AppError::validation("the course owner must be an instructor"));
        }

        let course = self.repo.create_course(new_course).await.map_err(|e| match e {
            StoreError::Conflict(_) => AppError::not_found("instructor"),
            other => other.into(),
        })?;

        tracing::info!(
            course_id = %course.id,
            instructor_id = %course.instructor_id,
            actor = %actor.id,
            "course created"
        );
        Ok(course)
    }

    pub async fn list_published_courses(&self) -> Result<Vec<Course>, AppError> {
        policy::require(None, Action::ListPublishedCourses, Resource::Nothing)?;
        Ok(self.repo.list_courses(Some(CourseStatus::Published)).await?)
    }

    /// list_all_courses
    ///
    /// Admin view: every course in every status.
    pub async fn list_all_courses(&self, actor: &AuthUser) -> Result<Vec<Course>, AppError> {
        policy::require(Some(actor), Action::ListAllCourses, Resource::Nothing)?;
        Ok(self.repo.list_courses(None).await?)
    }

    pub async fn list_courses_for_instructor(&self, actor: &AuthUser) -> Result<Vec<Course>, AppError> {
        policy::require(Some(actor), Action::ListTaughtCourses, Resource::Nothing)?;
        Ok(self.repo.list_courses_by_instructor(actor.id).await?)
    }

    pub async fn list_enrolled_courses(&self, actor: &AuthUser) -> Result<Vec<Course>, AppError> {
        policy::require(Some(actor), Action::ListEnrolledCourses, Resource::Nothing)?;
        Ok(self.repo.list_courses_by_student(actor.id).await?)
    }

    /// get_course
    ///
    /// Visible to admins, the owning instructor and enrolled students.
    pub async fn get_course(&self, actor: &AuthUser, course_id: Uuid) -> Result<Course, AppError> {
        let course = self.load(course_id).await?;
        policy::require(Some(actor), Action::ReadCourse, Resource::Course(&course))?;
        Ok(course)
    }

    /// enroll
    ///
    /// Student self-enrollment. The store performs an atomic add-to-set, so
    /// concurrent calls for one pair leave a single roster entry; a call that
    /// loses that race reports `Conflict`.
    pub async fn enroll(&self, actor: &AuthUser, course_id: Uuid) -> Result<(), AppError> {
        let course = self.load(course_id).await?;
        if actor.role == Role::Student && course.is_enrolled(actor.id) {
            return Err(AppError::AlreadyEnrolled);
        }
        policy::require(Some(actor), Action::Enroll, Resource::Course(&course))?;

        match self.repo.add_student(course_id, actor.id).await {
            Ok(true) => {
                tracing::info!(course_id = %course_id, student_id = %actor.id, "student enrolled");
                Ok(())
            }
            Ok(false) => Err(AppError::Conflict(
                "enrollment was recorded by a concurrent request".to_string(),
            )),
            Err(StoreError::NotFound) => Err(AppError::not_found("course")),
            Err(e) => Err(e.into()),
        }
    }

    /// add_lesson
    ///
    /// Without an explicit `order` the lesson goes after the current last one.
    pub async fn add_lesson(
        &self,
        actor: &AuthUser,
        course_id: Uuid,
        input: LessonInput,
    ) -> Result<Course, AppError> {
        let course = self.load(course_id).await?;
        policy::require(Some(actor), Action::AddLesson, Resource::Course(&course))?;

        let next_order = course.lessons.iter().map(|l| l.order).max().unwrap_or(0) + 1;
        let lesson = lesson_from_input(input, next_order)?;

        let updated = self
            .repo
            .push_lesson(course_id, lesson)
            .await?
            .ok_or_else(|| AppError::not_found("course"))?;
        tracing::info!(course_id = %course_id, lessons = updated.lessons.len(), "lesson added");
        Ok(updated)
    }

    pub async fn add_assignment(
        &self,
        actor: &AuthUser,
        course_id: Uuid,
        input: AssignmentInput,
    ) -> Result<Course, AppError> {
        let course = self.load(course_id).await?;
        policy::require(Some(actor), Action::AddAssignment, Resource::Course(&course))?;

        let due_date = input
            .due_date
            .ok_or_else(|| AppError::validation("due_date is required"))?;
        let total_marks = input
            .total_marks
            .ok_or_else(|| AppError::validation("total_marks is required"))?;
        if total_marks <= 0 {
            return Err(AppError::validation("total_marks must be positive"));
        }
        let assignment = Assignment {
            title: required("title", &input.title)?,
            description: required("description", &input.description)?,
            due_date,
            total_marks,
        };

        let updated = self
            .repo
            .push_assignment(course_id, assignment)
            .await?
            .ok_or_else(|| AppError::not_found("course"))?;
        tracing::info!(course_id = %course_id, "assignment added");
        Ok(updated)
    }

    /// update_thumbnail
    ///
    /// Stores a reference only. An empty value clears the thumbnail.
    pub async fn update_thumbnail(
        &self,
        actor: &AuthUser,
        course_id: Uuid,
        thumbnail: Option<String>,
    ) -> Result<Course, AppError> {
        let course = self.load(course_id).await?;
        policy::require(Some(actor), Action::UpdateThumbnail, Resource::Course(&course))?;

        self.repo
            .set_thumbnail(course_id, optional(thumbnail))
            .await?
            .ok_or_else(|| AppError::not_found("course"))
    }

    /// set_status
    ///
    /// Draft and Published toggle; Upcoming only moves on to Published. The
    /// write is conditional on the status read here, so a concurrent transition
    /// surfaces as `Conflict` instead of being overwritten.
    pub async fn set_status(
        &self,
        actor: &AuthUser,
        course_id: Uuid,
        raw_status: &str,
    ) -> Result<Course, AppError> {
        let next: CourseStatus = raw_status.trim().parse().map_err(AppError::Validation)?;
        let course = self.load(course_id).await?;
        policy::require(Some(actor), Action::UpdateStatus, Resource::Course(&course))?;

        if !course.status.can_transition_to(next) {
            return Err(AppError::validation(format!(
                "cannot move a course from {} to {}",
                course.status.as_str(),
                next.as_str()
            )));
        }
        if course.status == next {
            return Ok(course);
        }

        match self.repo.set_status(course_id, course.status, next).await? {
            Some(updated) => {
                tracing::info!(course_id = %course_id, status = next.as_str(), "course status changed");
                Ok(updated)
            }
            None => match self.repo.get_course(course_id).await? {
                Some(_) => Err(AppError::Conflict("course status changed concurrently".to_string())),
                None => Err(AppError::not_found("course")),
            },
        }
    }

    /// remove_student
    ///
    /// Drops the student from the roster and the course from the student's list.
    pub async fn remove_student(
        &self,
        actor: &AuthUser,
        course_id: Uuid,
        student_id: Uuid,
    ) -> Result<(), AppError> {
        let course = self.load(course_id).await?;
        policy::require(Some(actor), Action::RemoveStudent, Resource::Course(&course))?;

        if !course.is_enrolled(student_id) {
            return Err(AppError::NotEnrolled);
        }

        match self.repo.remove_student(course_id, student_id).await {
            Ok(true) => {
                tracing::info!(course_id = %course_id, student_id = %student_id, "student removed");
                Ok(())
            }
            // Removed by a concurrent request in the meantime.
            Ok(false) => Err(AppError::NotEnrolled),
            Err(StoreError::NotFound) => Err(AppError::not_found("course")),
            Err(e) => Err(e.into()),
        }
    }

    /// delete_course
    ///
    /// The course row, the owner's back-reference and every student's
    /// back-reference go in one repository call.
    pub async fn delete_course(&self, actor: &AuthUser, course_id: Uuid) -> Result<(), AppError> {
        let course = self.load(course_id).await?;
        policy::require(Some(actor), Action::DeleteCourse, Resource::Course(&course))?;

        if !self.repo.delete_course(course_id).await? {
            return Err(AppError::not_found("course"));
        }
        tracing::info!(
            course_id = %course_id,
            actor = %actor.id,
            students = course.enrolled_students.len(),
            "course deleted"
        );
        Ok(())
    }

    /// delete_user
    ///
    /// Admin only. An instructor's courses are deleted first through the same
    /// cascade as `delete_course`; the account goes last, so an interrupted
    /// cascade never leaves a course without its owner. The store refuses to
    /// drop an account that still owns courses, and a course created in the
    /// meantime is picked up by the next attempt.
    pub async fn delete_user(&self, actor: &AuthUser, user_id: Uuid) -> Result<(), AppError> {
        policy::require(Some(actor), Action::DeleteUser, Resource::Nothing)?;

        let user = self
            .repo
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("user"))?;

        for attempt in 1..=DELETE_USER_ATTEMPTS {
            if user.role == Role::Instructor {
                for course in self.repo.list_courses_by_instructor(user_id).await? {
                    self.repo.delete_course(course.id).await?;
                    tracing::info!(course_id = %course.id, user_id = %user_id, "owned course removed");
                }
            }

            match self.repo.delete_user(user_id).await {
                Ok(true) => {
                    tracing::info!(user_id = %user_id, role = %user.role, actor = %actor.id, "user deleted");
                    return Ok(());
                }
                Ok(false) => return Err(AppError::not_found("user")),
                Err(StoreError::Conflict(msg)) if attempt < DELETE_USER_ATTEMPTS => {
                    tracing::warn!(user_id = %user_id, attempt, "user delete raced a course insert: {}", msg);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::Conflict("user still owns courses".to_string()))
    }

    pub async fn stats(&self, actor: &AuthUser) -> Result<AdminDashboardStats, AppError> {
        policy::require(Some(actor), Action::ViewStats, Resource::Nothing)?;
        Ok(self.repo.get_stats().await?)
    }
}
