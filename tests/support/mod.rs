//! Shared in-memory doubles for the integration tests. Both mocks honor the
//! same conflict semantics as the Postgres implementations (create returns
//! None on a duplicate key) so the provisioning and enrollment flows exercise
//! their real re-read paths.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use course_portal::{
    AppState,
    auth::AuthUser,
    config::{AppConfig, Env},
    error::StoreError,
    identity::{IdentityGateway, PasswordVerdict},
    models::{
        AdminDashboardStats, Category, CategoryCourseCount, Course, CourseEnrollmentCount,
        CourseStudent, CreateCourseRequest, CreateModuleRequest, EnrolledCourse, Enrollment,
        Identity, IdentitySummary, Module, Profile, ProfileKind, Role, UpdateCourseRequest,
    },
    repository::{CategoryDelete, Repository},
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";
pub const GOOD_PASSWORD: &str = "correct horse battery staple";

// --- Mock Identity Gateway ---

#[derive(Default)]
pub struct MockGateway {
    pub identities: Mutex<Vec<Identity>>,
    pub roles: Mutex<HashMap<Uuid, Vec<Role>>>,
    pub two_factor: Mutex<HashSet<Uuid>>,
    pub locked_out: Mutex<HashSet<Uuid>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an identity holding the given roles. The mock accepts
    /// GOOD_PASSWORD for every identity.
    pub fn add_identity(&self, email: &str, roles: &[Role]) -> Identity {
        let identity = Identity {
            id: Uuid::new_v4(),
            email: email.to_string(),
        };
        self.identities.lock().unwrap().push(identity.clone());
        self.roles
            .lock()
            .unwrap()
            .insert(identity.id, roles.to_vec());
        identity
    }

    pub fn mark_two_factor(&self, identity: &Identity) {
        self.two_factor.lock().unwrap().insert(identity.id);
    }

    pub fn mark_locked_out(&self, identity: &Identity) {
        self.locked_out.lock().unwrap().insert(identity.id);
    }

    pub fn roles_of(&self, identity_id: Uuid) -> Vec<Role> {
        self.roles
            .lock()
            .unwrap()
            .get(&identity_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl IdentityGateway for MockGateway {
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        Ok(self
            .identities
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, StoreError> {
        Ok(self
            .identities
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.id == id)
            .cloned())
    }

    async fn list_identities(&self) -> Result<Vec<IdentitySummary>, StoreError> {
        let roles = self.roles.lock().unwrap();
        Ok(self
            .identities
            .lock()
            .unwrap()
            .iter()
            .map(|i| IdentitySummary {
                id: i.id,
                email: i.email.clone(),
                roles: roles.get(&i.id).cloned().unwrap_or_default(),
            })
            .collect())
    }

    async fn is_in_role(&self, identity: &Identity, role: Role) -> Result<bool, StoreError> {
        Ok(self.roles_of(identity.id).contains(&role))
    }

    async fn get_roles(&self, identity: &Identity) -> Result<Vec<Role>, StoreError> {
        Ok(self.roles_of(identity.id))
    }

    async fn verify_password(
        &self,
        identity: &Identity,
        password: &str,
        _remember_me: bool,
    ) -> Result<PasswordVerdict, StoreError> {
        if self.locked_out.lock().unwrap().contains(&identity.id) {
            return Ok(PasswordVerdict {
                is_locked_out: true,
                ..PasswordVerdict::default()
            });
        }
        if self.two_factor.lock().unwrap().contains(&identity.id) {
            return Ok(PasswordVerdict {
                requires_two_factor: true,
                ..PasswordVerdict::default()
            });
        }
        Ok(PasswordVerdict {
            success: password == GOOD_PASSWORD,
            ..PasswordVerdict::default()
        })
    }

    async fn replace_roles(&self, identity: &Identity, role: Role) -> Result<(), StoreError> {
        self.roles.lock().unwrap().insert(identity.id, vec![role]);
        Ok(())
    }
}

// --- Mock Repository ---

#[derive(Default)]
pub struct MockRepo {
    pub profiles: Mutex<Vec<Profile>>,
    pub courses: Mutex<Vec<Course>>,
    pub modules: Mutex<Vec<Module>>,
    pub enrollments: Mutex<Vec<Enrollment>>,
    pub categories: Mutex<Vec<Category>>,
    /// identity_id -> email, so roster rows can carry real emails.
    pub emails: Mutex<HashMap<Uuid, String>>,
}

impl MockRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_profile(&self, identity_id: Uuid, kind: ProfileKind) -> Profile {
        let profile = Profile {
            id: Uuid::new_v4(),
            identity_id,
            kind,
            created_at: Utc::now(),
        };
        self.profiles.lock().unwrap().push(profile.clone());
        profile
    }

    pub fn add_course(&self, instructor_id: Uuid, title: &str) -> Course {
        let course = Course {
            id: Uuid::new_v4(),
            instructor_id,
            title: title.to_string(),
            description: format!("About {title}"),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            ..Course::default()
        };
        self.courses.lock().unwrap().push(course.clone());
        course
    }

    pub fn add_module(&self, course_id: Uuid, title: &str) -> Module {
        let module = Module {
            id: Uuid::new_v4(),
            course_id,
            title: title.to_string(),
            content: None,
        };
        self.modules.lock().unwrap().push(module.clone());
        module
    }

    pub fn add_category(&self, name: &str) -> Category {
        let category = Category {
            id: Uuid::new_v4(),
            name: name.to_string(),
        };
        self.categories.lock().unwrap().push(category.clone());
        category
    }

    pub fn set_email(&self, identity_id: Uuid, email: &str) {
        self.emails
            .lock()
            .unwrap()
            .insert(identity_id, email.to_string());
    }
}

#[async_trait]
impl Repository for MockRepo {
    async fn find_profile(
        &self,
        identity_id: Uuid,
        kind: ProfileKind,
    ) -> Result<Option<Profile>, StoreError> {
        Ok(self
            .profiles
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.identity_id == identity_id && p.kind == kind)
            .cloned())
    }

    async fn find_profile_by_id(&self, id: Uuid) -> Result<Option<Profile>, StoreError> {
        Ok(self
            .profiles
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == id)
            .cloned())
    }

    async fn create_profile(
        &self,
        identity_id: Uuid,
        kind: ProfileKind,
    ) -> Result<Option<Profile>, StoreError> {
        let mut profiles = self.profiles.lock().unwrap();
        // Duplicate key: the caller must re-read the winner's row.
        if profiles
            .iter()
            .any(|p| p.identity_id == identity_id && p.kind == kind)
        {
            return Ok(None);
        }
        let profile = Profile {
            id: Uuid::new_v4(),
            identity_id,
            kind,
            created_at: Utc::now(),
        };
        profiles.push(profile.clone());
        Ok(Some(profile))
    }

    async fn find_course(&self, id: Uuid) -> Result<Option<Course>, StoreError> {
        Ok(self
            .courses
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn list_courses(
        &self,
        search: Option<String>,
        category: Option<String>,
        instructor: Option<String>,
    ) -> Result<Vec<Course>, StoreError> {
        let needle = search.map(|s| s.to_lowercase());
        Ok(self
            .courses
            .lock()
            .unwrap()
            .iter()
            .filter(|c| {
                needle.as_ref().is_none_or(|n| {
                    c.title.to_lowercase().contains(n)
                        || c.description.to_lowercase().contains(n)
                })
            })
            .filter(|c| category.as_ref().is_none_or(|cat| c.category.as_deref() == Some(cat)))
            .filter(|c| {
                instructor
                    .as_ref()
                    .is_none_or(|i| c.instructor_email.as_deref() == Some(i))
            })
            .cloned()
            .collect())
    }

    async fn courses_by_instructor(
        &self,
        instructor_id: Uuid,
    ) -> Result<Vec<Course>, StoreError> {
        Ok(self
            .courses
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.instructor_id == instructor_id)
            .cloned()
            .collect())
    }

    async fn create_course(
        &self,
        instructor_id: Uuid,
        req: CreateCourseRequest,
    ) -> Result<Course, StoreError> {
        let course = Course {
            id: Uuid::new_v4(),
            instructor_id,
            title: req.title,
            description: req.description,
            category_id: req.category_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            ..Course::default()
        };
        self.courses.lock().unwrap().push(course.clone());
        Ok(course)
    }

    async fn update_course(
        &self,
        id: Uuid,
        req: UpdateCourseRequest,
    ) -> Result<Option<Course>, StoreError> {
        let mut courses = self.courses.lock().unwrap();
        let Some(course) = courses.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        if let Some(title) = req.title {
            course.title = title;
        }
        if let Some(description) = req.description {
            course.description = description;
        }
        if let Some(category_id) = req.category_id {
            course.category_id = Some(category_id);
        }
        course.updated_at = Utc::now();
        Ok(Some(course.clone()))
    }

    async fn delete_course(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut courses = self.courses.lock().unwrap();
        let before = courses.len();
        courses.retain(|c| c.id != id);
        Ok(courses.len() < before)
    }

    async fn find_module(&self, id: Uuid) -> Result<Option<Module>, StoreError> {
        Ok(self
            .modules
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.id == id)
            .cloned())
    }

    async fn modules_by_course(&self, course_id: Uuid) -> Result<Vec<Module>, StoreError> {
        Ok(self
            .modules
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.course_id == course_id)
            .cloned()
            .collect())
    }

    async fn create_module(
        &self,
        course_id: Uuid,
        req: CreateModuleRequest,
    ) -> Result<Module, StoreError> {
        let module = Module {
            id: Uuid::new_v4(),
            course_id,
            title: req.title,
            content: req.content,
        };
        self.modules.lock().unwrap().push(module.clone());
        Ok(module)
    }

    async fn delete_module(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut modules = self.modules.lock().unwrap();
        let before = modules.len();
        modules.retain(|m| m.id != id);
        Ok(modules.len() < before)
    }

    async fn find_enrollment(
        &self,
        student_id: Uuid,
        course_id: Uuid,
    ) -> Result<Option<Enrollment>, StoreError> {
        Ok(self
            .enrollments
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.student_id == student_id && e.course_id == course_id)
            .cloned())
    }

    async fn create_enrollment(
        &self,
        student_id: Uuid,
        course_id: Uuid,
    ) -> Result<Option<Enrollment>, StoreError> {
        let mut enrollments = self.enrollments.lock().unwrap();
        if enrollments
            .iter()
            .any(|e| e.student_id == student_id && e.course_id == course_id)
        {
            return Ok(None);
        }
        let enrollment = Enrollment {
            id: Uuid::new_v4(),
            student_id,
            course_id,
            enroll_date: Utc::now(),
        };
        enrollments.push(enrollment.clone());
        Ok(Some(enrollment))
    }

    async fn enrollments_by_student(
        &self,
        student_id: Uuid,
    ) -> Result<Vec<EnrolledCourse>, StoreError> {
        let courses = self.courses.lock().unwrap();
        Ok(self
            .enrollments
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.student_id == student_id)
            .filter_map(|e| {
                courses.iter().find(|c| c.id == e.course_id).map(|c| EnrolledCourse {
                    course_id: c.id,
                    title: c.title.clone(),
                    category: c.category.clone(),
                    instructor_email: c.instructor_email.clone(),
                    enroll_date: e.enroll_date,
                })
            })
            .collect())
    }

    async fn enrollments_by_course(
        &self,
        course_id: Uuid,
    ) -> Result<Vec<CourseStudent>, StoreError> {
        let profiles = self.profiles.lock().unwrap();
        let emails = self.emails.lock().unwrap();
        Ok(self
            .enrollments
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.course_id == course_id)
            .map(|e| {
                let email = profiles
                    .iter()
                    .find(|p| p.id == e.student_id)
                    .and_then(|p| emails.get(&p.identity_id).cloned())
                    .unwrap_or_default();
                CourseStudent {
                    id: e.id,
                    student_id: e.student_id,
                    email,
                    enroll_date: e.enroll_date,
                }
            })
            .collect())
    }

    async fn module_count_for_student(&self, student_id: Uuid) -> Result<i64, StoreError> {
        let modules = self.modules.lock().unwrap();
        Ok(self
            .enrollments
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.student_id == student_id)
            .map(|e| modules.iter().filter(|m| m.course_id == e.course_id).count() as i64)
            .sum())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        Ok(self.categories.lock().unwrap().clone())
    }

    async fn create_category(&self, name: String) -> Result<Category, StoreError> {
        let mut categories = self.categories.lock().unwrap();
        if let Some(existing) = categories.iter().find(|c| c.name == name) {
            return Ok(existing.clone());
        }
        let category = Category {
            id: Uuid::new_v4(),
            name,
        };
        categories.push(category.clone());
        Ok(category)
    }

    async fn update_category(
        &self,
        id: Uuid,
        name: String,
    ) -> Result<Option<Category>, StoreError> {
        let mut categories = self.categories.lock().unwrap();
        let Some(category) = categories.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        category.name = name;
        Ok(Some(category.clone()))
    }

    async fn delete_category(&self, id: Uuid) -> Result<CategoryDelete, StoreError> {
        if self
            .courses
            .lock()
            .unwrap()
            .iter()
            .any(|c| c.category_id == Some(id))
        {
            return Ok(CategoryDelete::InUse);
        }
        let mut categories = self.categories.lock().unwrap();
        let before = categories.len();
        categories.retain(|c| c.id != id);
        Ok(if categories.len() < before {
            CategoryDelete::Deleted
        } else {
            CategoryDelete::Missing
        })
    }

    async fn instructor_emails(&self) -> Result<Vec<String>, StoreError> {
        let mut emails: Vec<String> = self
            .courses
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| c.instructor_email.clone())
            .collect();
        emails.sort();
        emails.dedup();
        Ok(emails)
    }

    async fn get_stats(&self) -> Result<AdminDashboardStats, StoreError> {
        let profiles = self.profiles.lock().unwrap();
        let courses = self.courses.lock().unwrap();
        let enrollments = self.enrollments.lock().unwrap();

        let mut top: HashMap<String, i64> = HashMap::new();
        for e in enrollments.iter() {
            if let Some(course) = courses.iter().find(|c| c.id == e.course_id) {
                *top.entry(course.title.clone()).or_default() += 1;
            }
        }
        let mut top_courses: Vec<CourseEnrollmentCount> = top
            .into_iter()
            .map(|(title, student_count)| CourseEnrollmentCount {
                title,
                student_count,
            })
            .collect();
        top_courses.sort_by(|a, b| b.student_count.cmp(&a.student_count));
        top_courses.truncate(5);

        let mut by_category: HashMap<String, i64> = HashMap::new();
        for c in courses.iter() {
            let name = c.category.clone().unwrap_or_else(|| "uncategorised".to_string());
            *by_category.entry(name).or_default() += 1;
        }
        let category_counts = by_category
            .into_iter()
            .map(|(category, course_count)| CategoryCourseCount {
                category,
                course_count,
            })
            .collect();

        Ok(AdminDashboardStats {
            course_count: courses.len() as i64,
            student_count: profiles.iter().filter(|p| p.kind == ProfileKind::Student).count()
                as i64,
            instructor_count: profiles
                .iter()
                .filter(|p| p.kind == ProfileKind::Instructor)
                .count() as i64,
            enrollment_count: enrollments.len() as i64,
            top_courses,
            category_counts,
        })
    }
}

// --- State & Principal Helpers ---

pub fn test_state(repo: Arc<MockRepo>, gateway: Arc<MockGateway>) -> AppState {
    let mut config = AppConfig::default();
    config.env = Env::Local;
    config.jwt_secret = TEST_JWT_SECRET.to_string();
    AppState {
        repo,
        identity: gateway,
        config,
    }
}

pub fn principal(id: Uuid, email: &str, roles: &[Role]) -> AuthUser {
    AuthUser {
        id,
        email: email.to_string(),
        roles: roles.to_vec(),
    }
}
