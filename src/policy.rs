use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::AppError,
    models::{Course, Role},
};

/// Action
///
/// Every operation the service gates. Anything not listed here has no way of
/// reaching a handler, which keeps the decision table below total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ListAccounts,
    CreateAccount,
    DeleteUser,
    ListAllCourses,
    ViewStats,
    DeleteCourse,
    CreateCourse,
    ReadCourse,
    ListPublishedCourses,
    ListTaughtCourses,
    ListEnrolledCourses,
    Enroll,
    AddLesson,
    AddAssignment,
    UpdateThumbnail,
    UpdateStatus,
    RemoveStudent,
    UploadMedia,
    CheckEmail,
    ViewProfile,
}

/// Resource
///
/// What an action is aimed at.
#[derive(Debug, Clone, Copy)]
pub enum Resource<'a> {
    Nothing,
    Course(&'a Course),
    /// The instructor a new course will belong to.
    OnBehalfOf(Uuid),
}

/// can_perform
///
/// Pure allow/deny decision over (actor, action, resource). `None` is the
/// anonymous caller. Every pairing not matched explicitly is denied.
///
/// Admins bypass ownership for reading and deleting courses and for creating
/// them on behalf of an instructor. Course content (lessons, assignments,
/// thumbnail, status, roster removals) stays with the owning instructor, and the
/// self-scoped listings have no admin form.
pub fn can_perform(actor: Option<&AuthUser>, action: Action, resource: Resource<'_>) -> bool {
    use Action::*;

    if action == ListPublishedCourses {
        return true;
    }

    let Some(actor) = actor else {
        return false;
    };
    let is_admin = actor.role == Role::Admin;
    let owns = |course: &Course| actor.role == Role::Instructor && course.instructor_id == actor.id;

    match (action, resource) {
        (ListAccounts | CreateAccount | DeleteUser | ListAllCourses | ViewStats, Resource::Nothing) => {
            is_admin
        }

        (DeleteCourse, Resource::Course(course)) => is_admin || owns(course),

        (CreateCourse, Resource::OnBehalfOf(instructor_id)) => match actor.role {
            Role::Admin => true,
            Role::Instructor => instructor_id == actor.id,
            Role::Student => false,
        },

        (ReadCourse, Resource::Course(course)) => {
            is_admin
                || owns(course)
                || (actor.role == Role::Student && course.is_enrolled(actor.id))
        }

        (ListTaughtCourses, Resource::Nothing) => actor.role == Role::Instructor,
        (ListEnrolledCourses, Resource::Nothing) => actor.role == Role::Student,

        (Enroll, Resource::Course(course)) => {
            actor.role == Role::Student && !course.is_enrolled(actor.id)
        }

        (
            AddLesson | AddAssignment | UpdateThumbnail | UpdateStatus | RemoveStudent,
            Resource::Course(course),
        ) => owns(course),

        (UploadMedia, Resource::Nothing) => matches!(actor.role, Role::Instructor | Role::Admin),
        (CheckEmail | ViewProfile, Resource::Nothing) => true,

        _ => false,
    }
}

/// require
///
/// `can_perform` as a guard: a denial becomes `Unauthenticated` for the
/// anonymous caller and `Forbidden` for everyone else.
pub fn require(
    actor: Option<&AuthUser>,
    action: Action,
    resource: Resource<'_>,
) -> Result<(), AppError> {
    if can_perform(actor, action, resource) {
        return Ok(());
    }

    match actor {
        None => Err(AppError::Unauthenticated),
        Some(actor) => {
            tracing::warn!(
                actor = %actor.id,
                role = %actor.role,
                action = ?action,
                "action denied by policy"
            );
            Err(AppError::Forbidden)
        }
    }
}
