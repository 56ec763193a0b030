use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, post},
};

/// Authenticated Router Module
///
/// Routes for any identity that has passed the authentication layer: the
/// student area (dashboard, enrollments) and the instructor area (course and
/// module management, rosters).
///
/// Access Control Strategy:
/// The `AuthUser` extractor middleware sits on the router layer above this
/// module, so every handler receives a validated `AuthUser` with the
/// identity's CURRENT role set. Role membership (`student` / `instructor`)
/// and ownership are then checked inside the handlers; foreign and missing
/// resources are both answered with 404 so existence never leaks.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /me
        // The caller's resolved identity and role set.
        .route("/me", get(handlers::get_me))
        // --- Student Area ---
        // GET /student/dashboard
        // Enrollment and module counters; a missing profile reads as zeros.
        .route("/student/dashboard", get(handlers::get_student_dashboard))
        // GET /student/courses
        // The caller's enrolled courses.
        .route("/student/courses", get(handlers::get_my_enrollments))
        // POST /student/courses/{id}/enroll
        // Idempotent enrollment; provisions the student profile on first use.
        .route(
            "/student/courses/{id}/enroll",
            post(handlers::enroll_course),
        )
        // --- Instructor Area ---
        // GET /instructor/dashboard
        .route(
            "/instructor/dashboard",
            get(handlers::get_instructor_dashboard),
        )
        // GET/POST /instructor/courses
        // Owned-course listing and creation. The owner is always the caller's
        // instructor profile, never a payload field.
        .route(
            "/instructor/courses",
            get(handlers::get_my_courses).post(handlers::create_course),
        )
        // GET/PUT/DELETE /instructor/courses/{id}
        // Detail, update and delete of an owned course. The ownership gate
        // runs before any mutation.
        .route(
            "/instructor/courses/{id}",
            get(handlers::get_instructor_course)
                .put(handlers::update_course)
                .delete(handlers::delete_course),
        )
        // POST /instructor/courses/{id}/modules
        // Adds a module to an owned course.
        .route(
            "/instructor/courses/{id}/modules",
            post(handlers::add_module),
        )
        // DELETE /instructor/modules/{id}
        // Removes a module; ownership is re-derived through the module's
        // stored parent course.
        .route("/instructor/modules/{id}", delete(handlers::delete_module))
        // GET /instructor/courses/{id}/students
        // Ownership-filtered roster of an owned course.
        .route(
            "/instructor/courses/{id}/students",
            get(handlers::get_course_students),
        )
}
