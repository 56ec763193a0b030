use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints accessible to any client, anonymous or logged-in: the login
/// gateway and the read-only course catalog.
///
/// Security Mandate:
/// `/login` must never reveal whether an email exists or which roles an
/// identity holds; every rejection carries the same generic message. The
/// catalog endpoints expose no ownership or enrollment data.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Unauthenticated liveness probe for monitoring and load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /login
        // Role-gated login. Routes to lockout / two-factor flows when the
        // credential provider says so, otherwise issues a session token and
        // the landing destination chosen by role precedence.
        .route("/login", post(handlers::login))
        // GET /courses?search=...&category=...&instructor=...
        // The filterable public catalog.
        .route("/courses", get(handlers::get_courses))
        // GET /courses/filters
        // Dropdown data for the catalog page (categories, instructor emails).
        // Registered before the {id} route so "filters" is not parsed as one.
        .route("/courses/filters", get(handlers::get_catalog_filters))
        // GET /courses/{id}
        // A single course with its module list.
        .route("/courses/{id}", get(handlers::get_course_detail))
}
