use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod access;
pub mod auth;
pub mod config;
pub mod enrollment;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod models;
pub mod repository;

// Module for routing segregation (Public, Authenticated, Admin).
pub mod routes;
use auth::AuthUser;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

// Makes core state types easily accessible to the application entry point.
pub use config::AppConfig;
pub use identity::{IdentityState, PgIdentityGateway};
pub use repository::{PostgresRepository, RepositoryState};

/// ApiDoc
///
/// Auto-generates the OpenAPI documentation (Swagger JSON) by aggregating
/// every handler decorated with `#[utoipa::path]` and every schema deriving
/// `utoipa::ToSchema`. Served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::login, handlers::get_courses, handlers::get_catalog_filters,
        handlers::get_course_detail, handlers::get_me,
        handlers::get_student_dashboard, handlers::get_my_enrollments,
        handlers::enroll_course,
        handlers::get_instructor_dashboard, handlers::get_my_courses,
        handlers::create_course, handlers::get_instructor_course,
        handlers::update_course, handlers::delete_course, handlers::add_module,
        handlers::delete_module, handlers::get_course_students,
        handlers::get_admin_stats, handlers::get_admin_courses,
        handlers::admin_create_course, handlers::admin_update_course,
        handlers::admin_delete_course, handlers::get_admin_course_students,
        handlers::get_admin_categories, handlers::create_category,
        handlers::update_category, handlers::delete_category,
        handlers::get_users, handlers::assign_role
    ),
    components(
        schemas(
            models::LoginRequest, models::LoginResponse, models::Course,
            models::CourseDetail, models::Module, models::Category,
            models::CatalogFilters, models::Enrollment, models::EnrolledCourse,
            models::CourseStudent, models::UserProfile,
            models::CreateCourseRequest, models::AdminCreateCourseRequest,
            models::UpdateCourseRequest, models::CreateModuleRequest,
            models::CategoryRequest, models::AssignRoleRequest,
            models::IdentitySummary, models::AdminDashboardStats,
            models::CourseEnrollmentCount, models::CategoryCourseCount,
            models::InstructorDashboard, models::StudentDashboard,
        )
    ),
    tags(
        (name = "course-portal", description = "Course Portal API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, thread-safe, immutable container holding every application
/// service and the configuration, shared across all incoming requests.
#[derive(Clone)]
pub struct AppState {
    /// Repository Layer: course, profile and enrollment persistence.
    pub repo: RepositoryState,
    /// Identity Layer: identities, roles and credential verification.
    pub identity: IdentityState,
    /// Configuration: the loaded, immutable environment configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// Let handlers and the AuthUser extractor selectively pull components from
// the shared AppState.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for IdentityState {
    fn from_ref(app_state: &AppState) -> IdentityState {
        app_state.identity.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Enforces authentication for the protected route groups by attempting the
/// `AuthUser` extraction up front. A failed extraction rejects the request
/// with 401 before any handler runs; a successful one lets it proceed (the
/// handler re-extracts its own `AuthUser`).
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the routing structure, applies global and scoped middleware,
/// and registers the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for request correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        // Documentation: serve the auto-generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Public routes: no middleware applied.
        .merge(public::public_routes())
        // Student and instructor areas: protected by `auth_middleware`.
        .merge(
            authenticated::authenticated_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        // Admin routes: nested under '/admin' behind the same authentication
        // layer. The 'admin' role check runs inside each handler.
        .nest(
            "/admin",
            admin::admin_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        .with_state(state);

    // 3. Observability and Correlation Layers (applied outermost)
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. Request ID generation: a unique UUID per request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. Request tracing: wraps the request/response lifecycle
                // in a span carrying the generated request ID.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Request ID propagation back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS layer.
        .layer(cors)
}

/// trace_span_logger
///
/// Customizes `TraceLayer` span creation: extracts the `x-request-id` header
/// and includes it alongside the HTTP method and URI, so every log line of a
/// single request is correlated by one ID.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
