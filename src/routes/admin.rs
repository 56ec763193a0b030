use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, put},
};

/// Admin Router Module
///
/// Routes exclusively for identities holding the 'admin' role: system-wide
/// oversight of courses, categories, users and role assignment.
///
/// Access Control:
/// This router is nested under `/admin` behind the authentication middleware,
/// and every handler re-checks `is_admin()` before doing anything. Admins see
/// all courses unfiltered by ownership; ordinary ownership scoping does not
/// apply here.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/stats
        // Dashboard counters: course/student/instructor/enrollment totals,
        // most-enrolled courses and the per-category breakdown.
        .route("/stats", get(handlers::get_admin_stats))
        // GET/POST /admin/courses
        // Lists every course in the system; creates a course on behalf of
        // any instructor profile (the submitted owner is re-validated).
        .route(
            "/courses",
            get(handlers::get_admin_courses).post(handlers::admin_create_course),
        )
        // PUT/DELETE /admin/courses/{id}
        // Updates or deletes any course, bypassing ownership scoping.
        .route(
            "/courses/{id}",
            put(handlers::admin_update_course).delete(handlers::admin_delete_course),
        )
        // GET /admin/courses/{id}/students
        // Roster of any course.
        .route(
            "/courses/{id}/students",
            get(handlers::get_admin_course_students),
        )
        // GET/POST /admin/categories
        // Category administration; creation is idempotent by name.
        .route(
            "/categories",
            get(handlers::get_admin_categories).post(handlers::create_category),
        )
        // PUT/DELETE /admin/categories/{id}
        // Rename or delete. Deleting a category still tagging courses is
        // refused with 409 rather than cascading.
        .route(
            "/categories/{id}",
            put(handlers::update_category).delete(handlers::delete_category),
        )
        // GET /admin/users
        // Every identity with its role set.
        .route("/users", get(handlers::get_users))
        // PUT /admin/users/{id}/role
        // Atomically replaces the target's whole role set with one role and
        // provisions the matching profile.
        .route("/users/{id}/role", put(handlers::assign_role))
}
