use uuid::Uuid;

use crate::{
    error::{AppError, StoreError},
    models::{Enrollment, Profile, ProfileKind},
    repository::Repository,
};

/// ensure_profile
///
/// Idempotent profile provisioning: returns the existing profile unchanged,
/// or creates one on first access. Role assignment and profile existence are
/// deliberately decoupled — an admin can grant a role long before the first
/// visit; this closes the gap on the write path.
///
/// Race safety: the insert lands on the (identity_id, kind) uniqueness
/// constraint with conflict-as-success, so two concurrent first visits
/// converge to one row and both callers observe the same profile id.
pub async fn ensure_profile(
    repo: &dyn Repository,
    identity_id: Uuid,
    kind: ProfileKind,
) -> Result<Profile, AppError> {
    if let Some(profile) = repo.find_profile(identity_id, kind).await? {
        return Ok(profile);
    }

    if let Some(profile) = repo.create_profile(identity_id, kind).await? {
        tracing::info!(identity = %identity_id, kind = kind.as_str(), "profile provisioned");
        return Ok(profile);
    }

    // Lost the insert race; the winner's row must now be readable.
    repo.find_profile(identity_id, kind)
        .await?
        .ok_or(AppError::Dependency(StoreError::Inconsistent(
            "profile missing after insert conflict",
        )))
}

/// enroll
///
/// Idempotent student-to-course enrollment: a set-membership assertion, not a
/// strict insert. An existing (student, course) pair is returned unchanged
/// with its original enroll_date; the first call creates the row. A
/// concurrent duplicate writer's conflict is treated as success and resolved
/// by re-reading the winner's row.
pub async fn enroll(
    repo: &dyn Repository,
    student: &Profile,
    course_id: Uuid,
) -> Result<Enrollment, AppError> {
    if let Some(existing) = repo.find_enrollment(student.id, course_id).await? {
        return Ok(existing);
    }

    if let Some(created) = repo.create_enrollment(student.id, course_id).await? {
        tracing::info!(student = %student.id, course = %course_id, "student enrolled");
        return Ok(created);
    }

    repo.find_enrollment(student.id, course_id)
        .await?
        .ok_or(AppError::Dependency(StoreError::Inconsistent(
            "enrollment missing after insert conflict",
        )))
}
