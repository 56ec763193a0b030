use crate::{
    AppState, access,
    access::{Destination, Routed},
    auth::{AuthUser, issue_token},
    enrollment,
    error::AppError,
    models::{
        self, AdminCreateCourseRequest, AdminDashboardStats, AssignRoleRequest, CatalogFilters,
        Category, CategoryRequest, Course, CourseDetail, CourseStudent, CreateCourseRequest,
        CreateModuleRequest, EnrolledCourse, Enrollment, IdentitySummary, InstructorDashboard,
        LoginRequest, LoginResponse, Module, ProfileKind, Role, StudentDashboard,
        UpdateCourseRequest, UserProfile,
    },
    repository::CategoryDelete,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

// --- Filter Structs ---

/// CatalogFilter
///
/// Accepted query parameters for the public catalog (GET /courses): free-text
/// search plus exact category-name and instructor-email filters.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct CatalogFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub instructor: Option<String>,
}

// --- Guard helpers ---

fn require_role(principal: &AuthUser, role: Role) -> Result<(), AppError> {
    if principal.has_role(role) {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

fn require_admin(principal: &AuthUser) -> Result<(), AppError> {
    if principal.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

fn non_empty(value: &str, field: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        Err(AppError::Validation(format!("{field} must not be empty")))
    } else {
        Ok(())
    }
}

// --- Public Handlers ---

/// login
///
/// [Public Route] Role-gated login. All rejected attempts surface one generic
/// message; lockout and two-factor route to their dedicated flows. On success
/// a session token is issued and the profiles for every provisionable role
/// held are ensured, keeping later reads side-effect-free.
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Routed", body = LoginResponse),
        (status = 401, description = "Invalid login attempt"),
        (status = 422, description = "Invalid role value")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    match access::route(state.identity.as_ref(), &payload).await? {
        Routed::LockedOut => Ok(Json(LoginResponse {
            token: None,
            destination: "/login/locked-out".to_string(),
        })),
        Routed::TwoFactor => Ok(Json(LoginResponse {
            token: None,
            destination: "/login/two-factor".to_string(),
        })),
        Routed::Dashboard {
            identity,
            roles,
            destination,
        } => {
            // Explicit post-login provisioning; dashboards never create rows.
            for role in &roles {
                if let Some(kind) = ProfileKind::for_role(*role) {
                    enrollment::ensure_profile(state.repo.as_ref(), identity.id, kind).await?;
                }
            }

            let token = issue_token(identity.id, payload.remember_me, &state.config.jwt_secret)
                .map_err(AppError::Token)?;

            let destination = match destination {
                Destination::Return => payload
                    .return_url
                    .clone()
                    .unwrap_or_else(|| Destination::Return.path().to_string()),
                chosen => chosen.path().to_string(),
            };

            Ok(Json(LoginResponse {
                token: Some(token),
                destination,
            }))
        }
    }
}

/// get_courses
///
/// [Public Route] Course catalog with search and filters.
#[utoipa::path(
    get,
    path = "/courses",
    params(CatalogFilter),
    responses((status = 200, description = "List filtered courses", body = [Course]))
)]
pub async fn get_courses(
    State(state): State<AppState>,
    Query(filter): Query<CatalogFilter>,
) -> Result<Json<Vec<models::Course>>, AppError> {
    let courses = state
        .repo
        .list_courses(filter.search, filter.category, filter.instructor)
        .await?;
    Ok(Json(courses))
}

/// get_catalog_filters
///
/// [Public Route] Dropdown data for the catalog: categories and the distinct
/// instructor emails.
#[utoipa::path(
    get,
    path = "/courses/filters",
    responses((status = 200, description = "Catalog filter data", body = CatalogFilters))
)]
pub async fn get_catalog_filters(
    State(state): State<AppState>,
) -> Result<Json<CatalogFilters>, AppError> {
    let categories = state.repo.list_categories().await?;
    let instructors = state.repo.instructor_emails().await?;
    Ok(Json(CatalogFilters {
        categories,
        instructors,
    }))
}

/// get_course_detail
///
/// [Public Route] A single course with its module list.
#[utoipa::path(
    get,
    path = "/courses/{id}",
    params(("id" = Uuid, Path, description = "Course ID")),
    responses((status = 200, description = "Found", body = CourseDetail))
)]
pub async fn get_course_detail(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CourseDetail>, AppError> {
    let course = state.repo.find_course(id).await?.ok_or(AppError::NotOwned)?;
    let modules = state.repo.modules_by_course(course.id).await?;
    Ok(Json(CourseDetail { course, modules }))
}

// --- Shared Authenticated Handlers ---

/// get_me
///
/// [Authenticated Route] The caller's resolved identity and current role set.
#[utoipa::path(
    get,
    path = "/me",
    responses((status = 200, description = "Profile", body = UserProfile))
)]
pub async fn get_me(principal: AuthUser) -> Json<UserProfile> {
    Json(UserProfile {
        id: principal.id,
        email: principal.email.clone(),
        roles: principal.roles,
    })
}

// --- Student Handlers ---

/// get_student_dashboard
///
/// [Student Route] Landing-area statistics. A missing profile reads as zero
/// enrollments, never as an error, and is NOT provisioned here — reads stay
/// side-effect-free.
#[utoipa::path(
    get,
    path = "/student/dashboard",
    responses((status = 200, description = "Student stats", body = StudentDashboard))
)]
pub async fn get_student_dashboard(
    principal: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<StudentDashboard>, AppError> {
    require_role(&principal, Role::Student)?;

    let Some(profile) = state
        .repo
        .find_profile(principal.id, ProfileKind::Student)
        .await?
    else {
        return Ok(Json(StudentDashboard::default()));
    };

    let enrolled_count = state.repo.enrollments_by_student(profile.id).await?.len() as i64;
    let total_modules = state.repo.module_count_for_student(profile.id).await?;

    // TODO: derive the completed count from real completed-module tracking
    // once that table lands; until then this mirrors the interim fixed ratio.
    let completed_modules = (total_modules as f64 * 0.12).floor();
    let progress_percent = if total_modules == 0 {
        0.0
    } else {
        (completed_modules * 100.0 / total_modules as f64).round()
    };

    Ok(Json(StudentDashboard {
        enrolled_count,
        total_modules,
        progress_percent,
    }))
}

/// get_my_enrollments
///
/// [Student Route] The caller's enrolled courses. Missing profile → empty list.
#[utoipa::path(
    get,
    path = "/student/courses",
    responses((status = 200, description = "My enrolled courses", body = [EnrolledCourse]))
)]
pub async fn get_my_enrollments(
    principal: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<EnrolledCourse>>, AppError> {
    require_role(&principal, Role::Student)?;

    let Some(profile) = state
        .repo
        .find_profile(principal.id, ProfileKind::Student)
        .await?
    else {
        return Ok(Json(Vec::new()));
    };

    Ok(Json(state.repo.enrollments_by_student(profile.id).await?))
}

/// enroll_course
///
/// [Student Route] Idempotent enrollment: repeat calls return the original
/// row unchanged. The student profile is provisioned here if this is the
/// identity's first write.
#[utoipa::path(
    post,
    path = "/student/courses/{id}/enroll",
    params(("id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Enrolled (or already enrolled)", body = Enrollment),
        (status = 404, description = "Course not found")
    )
)]
pub async fn enroll_course(
    principal: AuthUser,
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
) -> Result<Json<Enrollment>, AppError> {
    require_role(&principal, Role::Student)?;

    if state.repo.find_course(course_id).await?.is_none() {
        return Err(AppError::NotOwned);
    }

    let profile =
        enrollment::ensure_profile(state.repo.as_ref(), principal.id, ProfileKind::Student)
            .await?;
    let enrollment = enrollment::enroll(state.repo.as_ref(), &profile, course_id).await?;
    Ok(Json(enrollment))
}

// --- Instructor Handlers ---

/// get_instructor_dashboard
///
/// [Instructor Route] Landing-area statistics; no profile means no courses.
#[utoipa::path(
    get,
    path = "/instructor/dashboard",
    responses((status = 200, description = "Instructor stats", body = InstructorDashboard))
)]
pub async fn get_instructor_dashboard(
    principal: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<InstructorDashboard>, AppError> {
    require_role(&principal, Role::Instructor)?;
    let courses = access::instructor_courses(state.repo.as_ref(), &principal).await?;
    Ok(Json(InstructorDashboard {
        course_count: courses.len() as i64,
    }))
}

/// get_my_courses
///
/// [Instructor Route] Courses owned by the caller. An instructor with no
/// profile yet sees an empty collection, not an error.
#[utoipa::path(
    get,
    path = "/instructor/courses",
    responses((status = 200, description = "My courses", body = [Course]))
)]
pub async fn get_my_courses(
    principal: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Course>>, AppError> {
    require_role(&principal, Role::Instructor)?;
    let courses = access::instructor_courses(state.repo.as_ref(), &principal).await?;
    Ok(Json(courses))
}

/// create_course
///
/// [Instructor Route] Creates a course owned by the caller's instructor
/// profile. The owner is never taken from the payload.
#[utoipa::path(
    post,
    path = "/instructor/courses",
    request_body = CreateCourseRequest,
    responses((status = 201, description = "Created", body = Course))
)]
pub async fn create_course(
    principal: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateCourseRequest>,
) -> Result<(StatusCode, Json<Course>), AppError> {
    require_role(&principal, Role::Instructor)?;
    non_empty(&payload.title, "title")?;

    let profile = state
        .repo
        .find_profile(principal.id, ProfileKind::Instructor)
        .await?
        .ok_or(AppError::NotOwned)?;

    let course = state.repo.create_course(profile.id, payload).await?;
    Ok((StatusCode::CREATED, Json(course)))
}

/// get_instructor_course
///
/// [Instructor Route] Detail view of an owned course, modules included.
/// Not-owned and not-found are indistinguishable.
#[utoipa::path(
    get,
    path = "/instructor/courses/{id}",
    params(("id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Found", body = CourseDetail),
        (status = 404, description = "Not found or not owned")
    )
)]
pub async fn get_instructor_course(
    principal: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CourseDetail>, AppError> {
    require_role(&principal, Role::Instructor)?;
    let course = access::authorize_course(state.repo.as_ref(), &principal, id).await?;
    let modules = state.repo.modules_by_course(course.id).await?;
    Ok(Json(CourseDetail { course, modules }))
}

/// update_course
///
/// [Instructor Route] Partial update of an owned course.
#[utoipa::path(
    put,
    path = "/instructor/courses/{id}",
    request_body = UpdateCourseRequest,
    responses(
        (status = 200, description = "Updated", body = Course),
        (status = 404, description = "Not found or not owned")
    )
)]
pub async fn update_course(
    principal: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCourseRequest>,
) -> Result<Json<Course>, AppError> {
    require_role(&principal, Role::Instructor)?;
    let course = access::authorize_course(state.repo.as_ref(), &principal, id).await?;

    state
        .repo
        .update_course(course.id, payload)
        .await?
        .map(Json)
        .ok_or(AppError::NotOwned)
}

/// delete_course
///
/// [Instructor Route] Deletes an owned course.
#[utoipa::path(
    delete,
    path = "/instructor/courses/{id}",
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found or not owned")
    )
)]
pub async fn delete_course(
    principal: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    require_role(&principal, Role::Instructor)?;
    let course = access::authorize_course(state.repo.as_ref(), &principal, id).await?;

    if state.repo.delete_course(course.id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotOwned)
    }
}

/// add_module
///
/// [Instructor Route] Adds a module to an owned course. Ownership is derived
/// through the parent course in the path, never from payload hints.
#[utoipa::path(
    post,
    path = "/instructor/courses/{id}/modules",
    request_body = CreateModuleRequest,
    responses(
        (status = 201, description = "Created", body = Module),
        (status = 404, description = "Course not found or not owned")
    )
)]
pub async fn add_module(
    principal: AuthUser,
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
    Json(payload): Json<CreateModuleRequest>,
) -> Result<(StatusCode, Json<Module>), AppError> {
    require_role(&principal, Role::Instructor)?;
    non_empty(&payload.title, "title")?;

    let course = access::authorize_course(state.repo.as_ref(), &principal, course_id).await?;
    let module = state.repo.create_module(course.id, payload).await?;
    Ok((StatusCode::CREATED, Json(module)))
}

/// delete_module
///
/// [Instructor Route] Deletes a module; ownership is re-derived through the
/// module's stored parent course.
#[utoipa::path(
    delete,
    path = "/instructor/modules/{id}",
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found or not owned")
    )
)]
pub async fn delete_module(
    principal: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    require_role(&principal, Role::Instructor)?;
    let (module, _course) =
        access::authorize_module(state.repo.as_ref(), &principal, id, None).await?;

    if state.repo.delete_module(module.id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotOwned)
    }
}

/// get_course_students
///
/// [Instructor Route] Ownership-filtered roster: only the owner (or an admin
/// through the admin area) can list a course's enrolled students.
#[utoipa::path(
    get,
    path = "/instructor/courses/{id}/students",
    responses(
        (status = 200, description = "Roster", body = [CourseStudent]),
        (status = 404, description = "Not found or not owned")
    )
)]
pub async fn get_course_students(
    principal: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<CourseStudent>>, AppError> {
    require_role(&principal, Role::Instructor)?;
    let course = access::authorize_course(state.repo.as_ref(), &principal, id).await?;
    Ok(Json(state.repo.enrollments_by_course(course.id).await?))
}

// --- Admin Handlers ---

/// get_admin_stats
///
/// [Admin Route] Dashboard counters and rankings.
#[utoipa::path(
    get,
    path = "/admin/stats",
    responses((status = 200, description = "Stats", body = AdminDashboardStats))
)]
pub async fn get_admin_stats(
    principal: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<AdminDashboardStats>, AppError> {
    require_admin(&principal)?;
    Ok(Json(state.repo.get_stats().await?))
}

/// get_admin_courses
///
/// [Admin Route] Every course in the system, unfiltered by ownership.
#[utoipa::path(
    get,
    path = "/admin/courses",
    responses((status = 200, description = "All courses", body = [Course]))
)]
pub async fn get_admin_courses(
    principal: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Course>>, AppError> {
    require_admin(&principal)?;
    Ok(Json(state.repo.list_courses(None, None, None).await?))
}

/// admin_create_course
///
/// [Admin Route] Creates a course on behalf of any instructor profile.
#[utoipa::path(
    post,
    path = "/admin/courses",
    request_body = AdminCreateCourseRequest,
    responses(
        (status = 201, description = "Created", body = Course),
        (status = 422, description = "Unknown instructor profile")
    )
)]
pub async fn admin_create_course(
    principal: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<AdminCreateCourseRequest>,
) -> Result<(StatusCode, Json<Course>), AppError> {
    require_admin(&principal)?;
    non_empty(&payload.title, "title")?;

    // Re-validate the submitted owner: it must be a real instructor profile.
    let owner = state
        .repo
        .find_profile_by_id(payload.instructor_id)
        .await?
        .filter(|p| p.kind == ProfileKind::Instructor)
        .ok_or_else(|| AppError::Validation("instructor profile not found".to_string()))?;

    let course = state
        .repo
        .create_course(
            owner.id,
            CreateCourseRequest {
                title: payload.title,
                description: payload.description,
                category_id: payload.category_id,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(course)))
}

/// admin_update_course
///
/// [Admin Route] Updates any course; admins bypass ownership scoping.
#[utoipa::path(
    put,
    path = "/admin/courses/{id}",
    request_body = UpdateCourseRequest,
    responses(
        (status = 200, description = "Updated", body = Course),
        (status = 404, description = "Not found")
    )
)]
pub async fn admin_update_course(
    principal: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCourseRequest>,
) -> Result<Json<Course>, AppError> {
    require_admin(&principal)?;
    let course = access::authorize_course(state.repo.as_ref(), &principal, id).await?;

    state
        .repo
        .update_course(course.id, payload)
        .await?
        .map(Json)
        .ok_or(AppError::NotOwned)
}

/// admin_delete_course
///
/// [Admin Route] Deletes any course.
#[utoipa::path(
    delete,
    path = "/admin/courses/{id}",
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found")
    )
)]
pub async fn admin_delete_course(
    principal: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    require_admin(&principal)?;
    let course = access::authorize_course(state.repo.as_ref(), &principal, id).await?;

    if state.repo.delete_course(course.id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotOwned)
    }
}

/// get_admin_course_students
///
/// [Admin Route] Roster of any course, unfiltered by ownership.
#[utoipa::path(
    get,
    path = "/admin/courses/{id}/students",
    responses(
        (status = 200, description = "Roster", body = [CourseStudent]),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_admin_course_students(
    principal: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<CourseStudent>>, AppError> {
    require_admin(&principal)?;
    let course = access::authorize_course(state.repo.as_ref(), &principal, id).await?;
    Ok(Json(state.repo.enrollments_by_course(course.id).await?))
}

/// get_admin_categories
///
/// [Admin Route] Category listing for administration.
#[utoipa::path(
    get,
    path = "/admin/categories",
    responses((status = 200, description = "Categories", body = [Category]))
)]
pub async fn get_admin_categories(
    principal: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Category>>, AppError> {
    require_admin(&principal)?;
    Ok(Json(state.repo.list_categories().await?))
}

/// create_category
///
/// [Admin Route] Creates a category; duplicate names return the existing row.
#[utoipa::path(
    post,
    path = "/admin/categories",
    request_body = CategoryRequest,
    responses((status = 201, description = "Created", body = Category))
)]
pub async fn create_category(
    principal: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CategoryRequest>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    require_admin(&principal)?;
    non_empty(&payload.name, "name")?;

    let category = state.repo.create_category(payload.name).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// update_category
///
/// [Admin Route] Renames a category.
#[utoipa::path(
    put,
    path = "/admin/categories/{id}",
    request_body = CategoryRequest,
    responses(
        (status = 200, description = "Updated", body = Category),
        (status = 404, description = "Not found")
    )
)]
pub async fn update_category(
    principal: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CategoryRequest>,
) -> Result<Json<Category>, AppError> {
    require_admin(&principal)?;
    non_empty(&payload.name, "name")?;

    state
        .repo
        .update_category(id, payload.name)
        .await?
        .map(Json)
        .ok_or(AppError::NotOwned)
}

/// delete_category
///
/// [Admin Route] Deletes a category. Deletion is refused (409) while the
/// category still tags courses; it never cascades or orphans.
#[utoipa::path(
    delete,
    path = "/admin/categories/{id}",
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Category still in use")
    )
)]
pub async fn delete_category(
    principal: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    require_admin(&principal)?;

    match state.repo.delete_category(id).await? {
        CategoryDelete::Deleted => Ok(StatusCode::NO_CONTENT),
        CategoryDelete::Missing => Err(AppError::NotOwned),
        CategoryDelete::InUse => Err(AppError::CategoryInUse),
    }
}

/// get_users
///
/// [Admin Route] Every identity with its role set.
#[utoipa::path(
    get,
    path = "/admin/users",
    responses((status = 200, description = "Users", body = [IdentitySummary]))
)]
pub async fn get_users(
    principal: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<IdentitySummary>>, AppError> {
    require_admin(&principal)?;
    Ok(Json(state.identity.list_identities().await?))
}

/// assign_role
///
/// [Admin Route] Replaces the target identity's entire role set with the one
/// submitted role, then provisions the matching profile.
#[utoipa::path(
    put,
    path = "/admin/users/{id}/role",
    request_body = AssignRoleRequest,
    responses(
        (status = 204, description = "Role replaced"),
        (status = 404, description = "Identity not found"),
        (status = 422, description = "Invalid role value")
    )
)]
pub async fn assign_role(
    principal: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignRoleRequest>,
) -> Result<StatusCode, AppError> {
    require_admin(&principal)?;

    let new_role = Role::parse(&payload.role).ok_or(AppError::InvalidRole)?;
    let target = state
        .identity
        .find_by_id(id)
        .await?
        .ok_or(AppError::NotOwned)?;

    access::set_role(
        state.identity.as_ref(),
        state.repo.as_ref(),
        &target,
        new_role,
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}
