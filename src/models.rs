use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Core Application Schemas (Mapped to Database) ---

/// Role
///
/// The three role memberships an identity may hold. Stored as lowercase text
/// in `identity_roles`; an identity may hold several at once, but a login
/// attempt declares exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Student,
    Instructor,
    Admin,
}

impl Role {
    /// Parses the role string submitted on the login form. Anything outside
    /// the three allowed values is rejected before the credential store is
    /// consulted.
    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "student" => Some(Role::Student),
            "instructor" => Some(Role::Instructor),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Instructor => "instructor",
            Role::Admin => "admin",
        }
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Role::parse(&value).ok_or_else(|| format!("unknown role '{value}'"))
    }
}

/// ProfileKind
///
/// The two profile flavours that extend an identity. Admin accounts act
/// directly on the identity and carry no domain profile row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ProfileKind {
    #[default]
    Student,
    Instructor,
}

impl ProfileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileKind::Student => "student",
            ProfileKind::Instructor => "instructor",
        }
    }

    /// The profile kind a role provisions, if any.
    pub fn for_role(role: Role) -> Option<ProfileKind> {
        match role {
            Role::Student => Some(ProfileKind::Student),
            Role::Instructor => Some(ProfileKind::Instructor),
            Role::Admin => None,
        }
    }
}

impl TryFrom<String> for ProfileKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "student" => Ok(ProfileKind::Student),
            "instructor" => Ok(ProfileKind::Instructor),
            other => Err(format!("unknown profile kind '{other}'")),
        }
    }
}

/// Identity
///
/// The external account record: unique email plus role memberships. The
/// password credential never enters this crate; verification is delegated to
/// the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
}

/// IdentitySummary
///
/// Identity enriched with its full role set, for the admin user listing.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct IdentitySummary {
    pub id: Uuid,
    pub email: String,
    pub roles: Vec<Role>,
}

/// Profile
///
/// A 1:1 role-specific extension of an identity, created lazily on the write
/// path. `id` is the stable foreign key used by courses and enrollments; the
/// identity's own id is never referenced by dependent entities.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Profile {
    pub id: Uuid,
    pub identity_id: Uuid,
    #[sqlx(try_from = "String")]
    pub kind: ProfileKind,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Course
///
/// Owned by exactly one instructor profile. `category` and `instructor_email`
/// are join-enriched columns and default to None on queries that skip the join.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Course {
    pub id: Uuid,
    // FK to profiles.id (owner), never to the identity id.
    pub instructor_id: Uuid,
    pub title: String,
    pub description: String,
    // FK to categories.id, ON DELETE RESTRICT.
    pub category_id: Option<Uuid>,
    #[sqlx(default)]
    pub category: Option<String>,
    #[sqlx(default)]
    pub instructor_email: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Module
///
/// A content unit belonging to exactly one course. Created and deleted only
/// through the owning instructor's course context.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Module {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub content: Option<String>,
}

/// Enrollment
///
/// Links one student profile to one course. The pair (student_id, course_id)
/// is unique; enrolling twice is a no-op that returns the original row.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Enrollment {
    pub id: Uuid,
    pub student_id: Uuid,
    pub course_id: Uuid,
    #[ts(type = "string")]
    pub enroll_date: DateTime<Utc>,
}

/// Category
///
/// Admin-administered lookup entity used to tag courses.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
}

/// EnrolledCourse
///
/// A student's enrollment joined with the course and its instructor, for the
/// "my courses" listing.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct EnrolledCourse {
    pub course_id: Uuid,
    pub title: String,
    #[sqlx(default)]
    pub category: Option<String>,
    #[sqlx(default)]
    pub instructor_email: Option<String>,
    #[ts(type = "string")]
    pub enroll_date: DateTime<Utc>,
}

/// CourseStudent
///
/// One roster row: the enrollment joined with the student's identity email.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct CourseStudent {
    pub id: Uuid,
    pub student_id: Uuid,
    pub email: String,
    #[ts(type = "string")]
    pub enroll_date: DateTime<Utc>,
}

/// --- Request Payloads (Input Schemas) ---

/// LoginRequest
///
/// The login form: credentials plus the declared role. The declared role only
/// gates whether the attempt is allowed; the landing destination is chosen
/// from the full role set afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub role: String,
    #[serde(default)]
    pub remember_me: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_url: Option<String>,
}

/// LoginResponse
///
/// Outcome of a login attempt that was not rejected. `token` is absent when
/// the destination is a recovery flow (two-factor, lockout).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub destination: String,
}

/// CreateCourseRequest
///
/// Instructor payload for a new course; the owner is always taken from the
/// authenticated principal, never from the payload.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateCourseRequest {
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Uuid>,
}

/// AdminCreateCourseRequest
///
/// Admin variant of course creation: the owning instructor profile is chosen
/// explicitly.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AdminCreateCourseRequest {
    pub instructor_id: Uuid,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Uuid>,
}

/// UpdateCourseRequest
///
/// Partial update payload; only provided fields are written (COALESCE in the
/// repository query).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateCourseRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Uuid>,
}

/// CreateModuleRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateModuleRequest {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// CategoryRequest
///
/// Create/update payload for a category.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CategoryRequest {
    pub name: String,
}

/// AssignRoleRequest
///
/// Admin payload replacing a user's entire role set with the one given role.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AssignRoleRequest {
    pub role: String,
}

/// --- Detail & Dashboard Schemas (Output) ---

/// CourseDetail
///
/// A course together with its module list.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CourseDetail {
    pub course: Course,
    pub modules: Vec<Module>,
}

/// CatalogFilters
///
/// Dropdown data for the public catalog: the category list and the distinct
/// instructor emails.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CatalogFilters {
    pub categories: Vec<Category>,
    pub instructors: Vec<String>,
}

/// UserProfile
///
/// Output schema for the authenticated user's own profile (GET /me).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub roles: Vec<Role>,
}

/// CourseEnrollmentCount
///
/// One "top courses" row on the admin dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct CourseEnrollmentCount {
    pub title: String,
    pub student_count: i64,
}

/// CategoryCourseCount
///
/// Courses per category on the admin dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct CategoryCourseCount {
    pub category: String,
    pub course_count: i64,
}

/// AdminDashboardStats
///
/// Output schema for the administrative dashboard (GET /admin/stats).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AdminDashboardStats {
    pub course_count: i64,
    pub student_count: i64,
    pub instructor_count: i64,
    pub enrollment_count: i64,
    pub top_courses: Vec<CourseEnrollmentCount>,
    pub category_counts: Vec<CategoryCourseCount>,
}

/// InstructorDashboard
///
/// Output schema for the instructor landing area.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct InstructorDashboard {
    pub course_count: i64,
}

/// StudentDashboard
///
/// Output schema for the student landing area.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct StudentDashboard {
    pub enrolled_count: i64,
    pub total_modules: i64,
    pub progress_percent: f64,
}
