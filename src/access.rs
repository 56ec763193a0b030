use uuid::Uuid;

use crate::{
    auth::AuthUser,
    enrollment,
    error::AppError,
    identity::IdentityGateway,
    models::{Course, Identity, LoginRequest, Module, ProfileKind, Role},
    repository::Repository,
};

/// Destination
///
/// The landing area chosen after a successful login. Fixed precedence
/// Admin > Instructor > Student, falling back to the caller's return URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Admin,
    Instructor,
    Student,
    Return,
}

impl Destination {
    pub fn path(&self) -> &'static str {
        match self {
            Destination::Admin => "/admin",
            Destination::Instructor => "/instructor",
            Destination::Student => "/student",
            Destination::Return => "/",
        }
    }
}

/// Routed
///
/// Outcome of a login attempt that was not rejected outright. Lockout and
/// two-factor are dedicated flows, not failures.
#[derive(Debug)]
pub enum Routed {
    Dashboard {
        identity: Identity,
        roles: Vec<Role>,
        destination: Destination,
    },
    TwoFactor,
    LockedOut,
}

/// route
///
/// The role-gated login flow:
/// 1. Validate the submitted role before touching the credential store.
/// 2. Locate the identity by email (case-insensitive).
/// 3. Require the identity to actually hold the submitted role.
/// 4. Verify the password via the identity gateway.
/// 5. Choose the landing destination from the FULL role set by fixed
///    precedence — the submitted role only gates whether login is allowed.
///
/// Unknown email, wrong role and wrong password are logged distinctly but
/// collapse into one generic message at the boundary, so neither accounts
/// nor role memberships can be enumerated.
pub async fn route(
    gateway: &dyn IdentityGateway,
    request: &LoginRequest,
) -> Result<Routed, AppError> {
    let submitted = Role::parse(&request.role).ok_or(AppError::InvalidRole)?;

    let Some(identity) = gateway.find_by_email(&request.email).await? else {
        tracing::info!("login rejected: unknown email");
        return Err(AppError::InvalidCredentials);
    };

    if !gateway.is_in_role(&identity, submitted).await? {
        tracing::info!(
            identity = %identity.id,
            submitted = submitted.as_str(),
            "login rejected: role not held"
        );
        return Err(AppError::RoleMismatch);
    }

    let verdict = gateway
        .verify_password(&identity, &request.password, request.remember_me)
        .await?;

    if verdict.is_locked_out {
        tracing::warn!(identity = %identity.id, "login routed to lockout flow");
        return Ok(Routed::LockedOut);
    }
    if verdict.requires_two_factor {
        return Ok(Routed::TwoFactor);
    }
    if !verdict.success {
        tracing::info!(identity = %identity.id, "login rejected: bad password");
        return Err(AppError::InvalidCredentials);
    }

    let roles = gateway.get_roles(&identity).await?;
    let destination = if roles.contains(&Role::Admin) {
        Destination::Admin
    } else if roles.contains(&Role::Instructor) {
        Destination::Instructor
    } else if roles.contains(&Role::Student) {
        Destination::Student
    } else {
        Destination::Return
    };

    tracing::info!(identity = %identity.id, destination = destination.path(), "login succeeded");
    Ok(Routed::Dashboard {
        identity,
        roles,
        destination,
    })
}

/// authorize_course
///
/// Ownership gate for every instructor-scoped course action. Resolves the
/// caller's instructor profile and requires the course to be owned by it;
/// admins bypass the scoping entirely. A missing course, a missing profile
/// and a foreign course are all `NotOwned` — rendered as not-found so
/// resource existence never leaks across tenants.
pub async fn authorize_course(
    repo: &dyn Repository,
    principal: &AuthUser,
    course_id: Uuid,
) -> Result<Course, AppError> {
    let Some(course) = repo.find_course(course_id).await? else {
        return Err(AppError::NotOwned);
    };

    if principal.is_admin() {
        return Ok(course);
    }

    let profile = repo
        .find_profile(principal.id, ProfileKind::Instructor)
        .await?
        .ok_or(AppError::NotOwned)?;

    if course.instructor_id != profile.id {
        tracing::info!(
            course = %course.id,
            caller = %principal.id,
            "course access denied: not the owner"
        );
        return Err(AppError::NotOwned);
    }

    Ok(course)
}

/// authorize_module
///
/// Module mutation re-derives ownership through the module's stored parent
/// course. A client-supplied course id is cross-checked against the real
/// parent and never trusted on its own.
pub async fn authorize_module(
    repo: &dyn Repository,
    principal: &AuthUser,
    module_id: Uuid,
    claimed_course_id: Option<Uuid>,
) -> Result<(Module, Course), AppError> {
    let module = repo
        .find_module(module_id)
        .await?
        .ok_or(AppError::NotOwned)?;

    if let Some(claimed) = claimed_course_id {
        if claimed != module.course_id {
            tracing::info!(
                module = %module.id,
                claimed = %claimed,
                "module access denied: claimed parent mismatch"
            );
            return Err(AppError::NotOwned);
        }
    }

    let course = authorize_course(repo, principal, module.course_id).await?;
    Ok((module, course))
}

/// instructor_courses
///
/// Lists the caller's own courses. Absence of a profile (role granted but
/// never provisioned, or nothing created yet) is a valid zero-result state,
/// not an error.
pub async fn instructor_courses(
    repo: &dyn Repository,
    principal: &AuthUser,
) -> Result<Vec<Course>, AppError> {
    let Some(profile) = repo
        .find_profile(principal.id, ProfileKind::Instructor)
        .await?
    else {
        return Ok(Vec::new());
    };

    Ok(repo.courses_by_instructor(profile.id).await?)
}

/// set_role
///
/// Admin role replacement: the identity's whole role set becomes `{new_role}`
/// in one atomic gateway operation, then the matching profile is provisioned
/// so the grant is immediately usable.
pub async fn set_role(
    gateway: &dyn IdentityGateway,
    repo: &dyn Repository,
    identity: &Identity,
    new_role: Role,
) -> Result<(), AppError> {
    gateway.replace_roles(identity, new_role).await?;
    tracing::info!(identity = %identity.id, role = new_role.as_str(), "role set replaced");

    if let Some(kind) = ProfileKind::for_role(new_role) {
        enrollment::ensure_profile(repo, identity.id, kind).await?;
    }
    Ok(())
}
