use crate::error::StoreError;
use crate::models::{
    AdminDashboardStats, Category, CategoryCourseCount, Course, CourseEnrollmentCount,
    CourseStudent, CreateCourseRequest, CreateModuleRequest, EnrolledCourse, Enrollment, Module,
    Profile, ProfileKind, UpdateCourseRequest,
};
use async_trait::async_trait;
use sqlx::{PgPool, query_builder::QueryBuilder};
use std::sync::Arc;
use uuid::Uuid;

/// Base SELECT for courses, enriched with the category name and the owning
/// instructor's email.
const COURSE_SELECT: &str = r#"
    SELECT c.id, c.instructor_id, c.title, c.description, c.category_id,
           cat.name AS category, i.email AS instructor_email,
           c.created_at, c.updated_at
    FROM courses c
    LEFT JOIN categories cat ON c.category_id = cat.id
    JOIN profiles p ON c.instructor_id = p.id
    JOIN identities i ON p.identity_id = i.id
"#;

/// CategoryDelete
///
/// Outcome of a category deletion. `InUse` is the ON DELETE RESTRICT foreign
/// key firing: the category still tags at least one course.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryDelete {
    Deleted,
    Missing,
    InUse,
}

/// Repository Trait
///
/// Abstract contract for all persistence operations, so handlers and the
/// access layer never know the concrete store. `Send + Sync + async_trait`
/// make the trait object (`Arc<dyn Repository>`) shareable across Axum's
/// task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Profiles ---
    async fn find_profile(
        &self,
        identity_id: Uuid,
        kind: ProfileKind,
    ) -> Result<Option<Profile>, StoreError>;
    async fn find_profile_by_id(&self, id: Uuid) -> Result<Option<Profile>, StoreError>;
    /// Inserts a profile row; returns None when the (identity, kind) pair
    /// already exists (conflict resolved by the caller re-reading).
    async fn create_profile(
        &self,
        identity_id: Uuid,
        kind: ProfileKind,
    ) -> Result<Option<Profile>, StoreError>;

    // --- Courses ---
    async fn find_course(&self, id: Uuid) -> Result<Option<Course>, StoreError>;
    /// Public catalog listing with optional search / category / instructor filters.
    async fn list_courses(
        &self,
        search: Option<String>,
        category: Option<String>,
        instructor: Option<String>,
    ) -> Result<Vec<Course>, StoreError>;
    async fn courses_by_instructor(
        &self,
        instructor_id: Uuid,
    ) -> Result<Vec<Course>, StoreError>;
    async fn create_course(
        &self,
        instructor_id: Uuid,
        req: CreateCourseRequest,
    ) -> Result<Course, StoreError>;
    async fn update_course(
        &self,
        id: Uuid,
        req: UpdateCourseRequest,
    ) -> Result<Option<Course>, StoreError>;
    async fn delete_course(&self, id: Uuid) -> Result<bool, StoreError>;

    // --- Modules ---
    async fn find_module(&self, id: Uuid) -> Result<Option<Module>, StoreError>;
    async fn modules_by_course(&self, course_id: Uuid) -> Result<Vec<Module>, StoreError>;
    async fn create_module(
        &self,
        course_id: Uuid,
        req: CreateModuleRequest,
    ) -> Result<Module, StoreError>;
    async fn delete_module(&self, id: Uuid) -> Result<bool, StoreError>;

    // --- Enrollments ---
    async fn find_enrollment(
        &self,
        student_id: Uuid,
        course_id: Uuid,
    ) -> Result<Option<Enrollment>, StoreError>;
    /// Inserts an enrollment; returns None when the (student, course) pair
    /// already exists (idempotent outcome resolved by the caller re-reading).
    async fn create_enrollment(
        &self,
        student_id: Uuid,
        course_id: Uuid,
    ) -> Result<Option<Enrollment>, StoreError>;
    async fn enrollments_by_student(
        &self,
        student_id: Uuid,
    ) -> Result<Vec<EnrolledCourse>, StoreError>;
    async fn enrollments_by_course(
        &self,
        course_id: Uuid,
    ) -> Result<Vec<CourseStudent>, StoreError>;
    /// Total module count across a student's enrolled courses.
    async fn module_count_for_student(&self, student_id: Uuid) -> Result<i64, StoreError>;

    // --- Categories ---
    async fn list_categories(&self) -> Result<Vec<Category>, StoreError>;
    /// Idempotent by name: a duplicate create returns the existing category.
    async fn create_category(&self, name: String) -> Result<Category, StoreError>;
    async fn update_category(
        &self,
        id: Uuid,
        name: String,
    ) -> Result<Option<Category>, StoreError>;
    async fn delete_category(&self, id: Uuid) -> Result<CategoryDelete, StoreError>;

    // --- Catalog & Dashboard ---
    async fn instructor_emails(&self) -> Result<Vec<String>, StoreError>;
    async fn get_stats(&self) -> Result<AdminDashboardStats, StoreError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the
/// application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn find_profile(
        &self,
        identity_id: Uuid,
        kind: ProfileKind,
    ) -> Result<Option<Profile>, StoreError> {
        let profile = sqlx::query_as::<_, Profile>(
            "SELECT id, identity_id, kind, created_at FROM profiles \
             WHERE identity_id = $1 AND kind = $2",
        )
        .bind(identity_id)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(profile)
    }

    async fn find_profile_by_id(&self, id: Uuid) -> Result<Option<Profile>, StoreError> {
        let profile = sqlx::query_as::<_, Profile>(
            "SELECT id, identity_id, kind, created_at FROM profiles WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(profile)
    }

    /// create_profile
    ///
    /// `ON CONFLICT DO NOTHING` on the (identity_id, kind) uniqueness
    /// constraint: the losing writer of a provisioning race gets None and
    /// re-reads the winner's row.
    async fn create_profile(
        &self,
        identity_id: Uuid,
        kind: ProfileKind,
    ) -> Result<Option<Profile>, StoreError> {
        let profile = sqlx::query_as::<_, Profile>(
            "INSERT INTO profiles (id, identity_id, kind, created_at) \
             VALUES ($1, $2, $3, NOW()) \
             ON CONFLICT (identity_id, kind) DO NOTHING \
             RETURNING id, identity_id, kind, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(identity_id)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(profile)
    }

    async fn find_course(&self, id: Uuid) -> Result<Option<Course>, StoreError> {
        let course =
            sqlx::query_as::<_, Course>(&format!("{COURSE_SELECT} WHERE c.id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(course)
    }

    /// list_courses
    ///
    /// Flexible catalog filtering via QueryBuilder for safe parameterization.
    async fn list_courses(
        &self,
        search: Option<String>,
        category: Option<String>,
        instructor: Option<String>,
    ) -> Result<Vec<Course>, StoreError> {
        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new(format!("{COURSE_SELECT} WHERE TRUE"));

        if let Some(s) = search {
            // Case-insensitive search across title, description and category name.
            let pattern = format!("%{}%", s);
            builder.push(" AND (c.title ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR c.description ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR cat.name ILIKE ");
            builder.push_bind(pattern);
            builder.push(")");
        }

        if let Some(c) = category {
            builder.push(" AND cat.name = ");
            builder.push_bind(c);
        }

        if let Some(i) = instructor {
            builder.push(" AND i.email = ");
            builder.push_bind(i);
        }

        builder.push(" ORDER BY c.created_at DESC");

        let courses = builder
            .build_query_as::<Course>()
            .fetch_all(&self.pool)
            .await?;
        Ok(courses)
    }

    async fn courses_by_instructor(
        &self,
        instructor_id: Uuid,
    ) -> Result<Vec<Course>, StoreError> {
        let courses = sqlx::query_as::<_, Course>(&format!(
            "{COURSE_SELECT} WHERE c.instructor_id = $1 ORDER BY c.created_at DESC"
        ))
        .bind(instructor_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(courses)
    }

    async fn create_course(
        &self,
        instructor_id: Uuid,
        req: CreateCourseRequest,
    ) -> Result<Course, StoreError> {
        let course = sqlx::query_as::<_, Course>(
            "INSERT INTO courses (id, instructor_id, title, description, category_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, NOW(), NOW()) \
             RETURNING id, instructor_id, title, description, category_id, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(instructor_id)
        .bind(req.title)
        .bind(req.description)
        .bind(req.category_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(course)
    }

    /// update_course
    ///
    /// COALESCE handles the partial payload: only provided fields are written.
    /// Ownership is enforced by the access layer before this runs.
    async fn update_course(
        &self,
        id: Uuid,
        req: UpdateCourseRequest,
    ) -> Result<Option<Course>, StoreError> {
        let course = sqlx::query_as::<_, Course>(
            "UPDATE courses \
             SET title = COALESCE($2, title), \
                 description = COALESCE($3, description), \
                 category_id = COALESCE($4, category_id), \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING id, instructor_id, title, description, category_id, created_at, updated_at",
        )
        .bind(id)
        .bind(req.title)
        .bind(req.description)
        .bind(req.category_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(course)
    }

    async fn delete_course(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_module(&self, id: Uuid) -> Result<Option<Module>, StoreError> {
        let module = sqlx::query_as::<_, Module>(
            "SELECT id, course_id, title, content FROM modules WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(module)
    }

    async fn modules_by_course(&self, course_id: Uuid) -> Result<Vec<Module>, StoreError> {
        let modules = sqlx::query_as::<_, Module>(
            "SELECT id, course_id, title, content FROM modules \
             WHERE course_id = $1 ORDER BY title ASC",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(modules)
    }

    async fn create_module(
        &self,
        course_id: Uuid,
        req: CreateModuleRequest,
    ) -> Result<Module, StoreError> {
        let module = sqlx::query_as::<_, Module>(
            "INSERT INTO modules (id, course_id, title, content) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, course_id, title, content",
        )
        .bind(Uuid::new_v4())
        .bind(course_id)
        .bind(req.title)
        .bind(req.content)
        .fetch_one(&self.pool)
        .await?;
        Ok(module)
    }

    async fn delete_module(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM modules WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_enrollment(
        &self,
        student_id: Uuid,
        course_id: Uuid,
    ) -> Result<Option<Enrollment>, StoreError> {
        let enrollment = sqlx::query_as::<_, Enrollment>(
            "SELECT id, student_id, course_id, enroll_date FROM enrollments \
             WHERE student_id = $1 AND course_id = $2",
        )
        .bind(student_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(enrollment)
    }

    /// create_enrollment
    ///
    /// `ON CONFLICT DO NOTHING` on the (student_id, course_id) pair: a
    /// concurrent duplicate converges to the first writer's row, which the
    /// caller re-reads. The original enroll_date is preserved.
    async fn create_enrollment(
        &self,
        student_id: Uuid,
        course_id: Uuid,
    ) -> Result<Option<Enrollment>, StoreError> {
        let enrollment = sqlx::query_as::<_, Enrollment>(
            "INSERT INTO enrollments (id, student_id, course_id, enroll_date) \
             VALUES ($1, $2, $3, NOW()) \
             ON CONFLICT (student_id, course_id) DO NOTHING \
             RETURNING id, student_id, course_id, enroll_date",
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(enrollment)
    }

    async fn enrollments_by_student(
        &self,
        student_id: Uuid,
    ) -> Result<Vec<EnrolledCourse>, StoreError> {
        let courses = sqlx::query_as::<_, EnrolledCourse>(
            "SELECT e.course_id, c.title, cat.name AS category, \
                    i.email AS instructor_email, e.enroll_date \
             FROM enrollments e \
             JOIN courses c ON e.course_id = c.id \
             LEFT JOIN categories cat ON c.category_id = cat.id \
             JOIN profiles p ON c.instructor_id = p.id \
             JOIN identities i ON p.identity_id = i.id \
             WHERE e.student_id = $1 \
             ORDER BY e.enroll_date DESC",
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(courses)
    }

    async fn enrollments_by_course(
        &self,
        course_id: Uuid,
    ) -> Result<Vec<CourseStudent>, StoreError> {
        let students = sqlx::query_as::<_, CourseStudent>(
            "SELECT e.id, e.student_id, i.email, e.enroll_date \
             FROM enrollments e \
             JOIN profiles p ON e.student_id = p.id \
             JOIN identities i ON p.identity_id = i.id \
             WHERE e.course_id = $1 \
             ORDER BY e.enroll_date ASC",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(students)
    }

    async fn module_count_for_student(&self, student_id: Uuid) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(m.id) FROM enrollments e \
             JOIN modules m ON m.course_id = e.course_id \
             WHERE e.student_id = $1",
        )
        .bind(student_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        let categories =
            sqlx::query_as::<_, Category>("SELECT id, name FROM categories ORDER BY name ASC")
                .fetch_all(&self.pool)
                .await?;
        Ok(categories)
    }

    /// create_category
    ///
    /// Name collisions return the existing row: a category is the same
    /// logical entity regardless of who inserted it first.
    async fn create_category(&self, name: String) -> Result<Category, StoreError> {
        let inserted = sqlx::query_as::<_, Category>(
            "INSERT INTO categories (id, name) VALUES ($1, $2) \
             ON CONFLICT (name) DO NOTHING \
             RETURNING id, name",
        )
        .bind(Uuid::new_v4())
        .bind(&name)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(category) = inserted {
            return Ok(category);
        }

        let existing =
            sqlx::query_as::<_, Category>("SELECT id, name FROM categories WHERE name = $1")
                .bind(&name)
                .fetch_optional(&self.pool)
                .await?;
        existing.ok_or(StoreError::Inconsistent(
            "category vanished after insert conflict",
        ))
    }

    async fn update_category(
        &self,
        id: Uuid,
        name: String,
    ) -> Result<Option<Category>, StoreError> {
        let category = sqlx::query_as::<_, Category>(
            "UPDATE categories SET name = $2 WHERE id = $1 RETURNING id, name",
        )
        .bind(id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(category)
    }

    /// delete_category
    ///
    /// The courses.category_id foreign key is ON DELETE RESTRICT; the 23503
    /// violation means the category still tags courses and the delete is
    /// refused, not cascaded.
    async fn delete_category(&self, id: Uuid) -> Result<CategoryDelete, StoreError> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await;

        match result {
            Ok(res) if res.rows_affected() > 0 => Ok(CategoryDelete::Deleted),
            Ok(_) => Ok(CategoryDelete::Missing),
            Err(sqlx::Error::Database(db)) if db.code().as_deref() == Some("23503") => {
                Ok(CategoryDelete::InUse)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn instructor_emails(&self) -> Result<Vec<String>, StoreError> {
        let emails = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT i.email FROM profiles p \
             JOIN identities i ON p.identity_id = i.id \
             WHERE p.kind = 'instructor' \
             ORDER BY i.email ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(emails)
    }

    /// get_stats
    ///
    /// Compiles the counters and rankings for the administrative dashboard.
    async fn get_stats(&self) -> Result<AdminDashboardStats, StoreError> {
        let course_count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM courses")
            .fetch_one(&self.pool)
            .await?;
        let student_count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM profiles WHERE kind = 'student'",
        )
        .fetch_one(&self.pool)
        .await?;
        let instructor_count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM profiles WHERE kind = 'instructor'",
        )
        .fetch_one(&self.pool)
        .await?;
        let enrollment_count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM enrollments")
            .fetch_one(&self.pool)
            .await?;

        let top_courses = sqlx::query_as::<_, CourseEnrollmentCount>(
            "SELECT c.title, COUNT(e.id) AS student_count \
             FROM enrollments e \
             JOIN courses c ON e.course_id = c.id \
             GROUP BY c.title \
             ORDER BY student_count DESC \
             LIMIT 5",
        )
        .fetch_all(&self.pool)
        .await?;

        let category_counts = sqlx::query_as::<_, CategoryCourseCount>(
            "SELECT COALESCE(cat.name, 'uncategorised') AS category, \
                    COUNT(c.id) AS course_count \
             FROM courses c \
             LEFT JOIN categories cat ON c.category_id = cat.id \
             GROUP BY 1 \
             ORDER BY course_count DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(AdminDashboardStats {
            course_count,
            student_count,
            instructor_count,
            enrollment_count,
            top_courses,
            category_counts,
        })
    }
}
