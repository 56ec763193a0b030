use async_trait::async_trait;
use serde::Deserialize;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::StoreError,
    models::{Identity, IdentitySummary, Role},
};

/// PasswordVerdict
///
/// Outcome of a password verification call against the external identity
/// provider. Lockout and two-factor are routed states, not failures.
#[derive(Debug, Clone, Copy, Default)]
pub struct PasswordVerdict {
    pub success: bool,
    pub requires_two_factor: bool,
    pub is_locked_out: bool,
}

/// IdentityGateway
///
/// Abstract contract over the identity collaborator: account lookup, role
/// memberships and credential verification. Handlers and the access layer
/// depend on this trait only, so tests swap in an in-memory implementation.
#[async_trait]
pub trait IdentityGateway: Send + Sync {
    /// Case-insensitive account lookup by email.
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, StoreError>;

    /// All identities with their role sets, for the admin user listing.
    async fn list_identities(&self) -> Result<Vec<IdentitySummary>, StoreError>;

    async fn is_in_role(&self, identity: &Identity, role: Role) -> Result<bool, StoreError>;

    /// The FULL role set; the landing destination is derived from this, never
    /// from the role submitted at login.
    async fn get_roles(&self, identity: &Identity) -> Result<Vec<Role>, StoreError>;

    /// Delegates the password check to the external provider.
    async fn verify_password(
        &self,
        identity: &Identity,
        password: &str,
        remember_me: bool,
    ) -> Result<PasswordVerdict, StoreError>;

    /// Atomically replaces the identity's whole role set with `{role}`.
    /// Remove-all-then-add inside one transaction; concurrent replacements
    /// for the same identity serialize on the identity row.
    async fn replace_roles(&self, identity: &Identity, role: Role) -> Result<(), StoreError>;
}

/// IdentityState
///
/// The concrete type used to share the gateway across the application state.
pub type IdentityState = Arc<dyn IdentityGateway>;

/// Minimal shape of the provider's verification response.
#[derive(Deserialize)]
struct VerifyResponse {
    verified: bool,
    #[serde(default)]
    requires_two_factor: bool,
    #[serde(default)]
    locked_out: bool,
}

/// PgIdentityGateway
///
/// Role memberships live in Postgres (`identities` + `identity_roles`); the
/// password credential never does. Verification is a call to the external
/// identity provider, mirroring how registration already defers to it.
pub struct PgIdentityGateway {
    pool: PgPool,
    http: reqwest::Client,
    verify_url: String,
    api_key: String,
}

impl PgIdentityGateway {
    pub fn new(pool: PgPool, http: reqwest::Client, identity_url: &str, api_key: &str) -> Self {
        Self {
            pool,
            http,
            verify_url: format!("{}/auth/v1/verify", identity_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl IdentityGateway for PgIdentityGateway {
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        let identity = sqlx::query_as::<_, Identity>(
            "SELECT id, email FROM identities WHERE lower(email) = lower($1)",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(identity)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, StoreError> {
        let identity =
            sqlx::query_as::<_, Identity>("SELECT id, email FROM identities WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(identity)
    }

    async fn list_identities(&self) -> Result<Vec<IdentitySummary>, StoreError> {
        let identities =
            sqlx::query_as::<_, Identity>("SELECT id, email FROM identities ORDER BY email")
                .fetch_all(&self.pool)
                .await?;

        let role_rows = sqlx::query_as::<_, (Uuid, String)>(
            "SELECT identity_id, role FROM identity_roles ORDER BY role",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut roles_by_identity: HashMap<Uuid, Vec<Role>> = HashMap::new();
        for (identity_id, role) in role_rows {
            if let Some(role) = Role::parse(&role) {
                roles_by_identity.entry(identity_id).or_default().push(role);
            }
        }

        Ok(identities
            .into_iter()
            .map(|identity| IdentitySummary {
                roles: roles_by_identity.remove(&identity.id).unwrap_or_default(),
                id: identity.id,
                email: identity.email,
            })
            .collect())
    }

    async fn is_in_role(&self, identity: &Identity, role: Role) -> Result<bool, StoreError> {
        let held = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM identity_roles WHERE identity_id = $1 AND role = $2)",
        )
        .bind(identity.id)
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(held)
    }

    async fn get_roles(&self, identity: &Identity) -> Result<Vec<Role>, StoreError> {
        let names = sqlx::query_scalar::<_, String>(
            "SELECT role FROM identity_roles WHERE identity_id = $1 ORDER BY role",
        )
        .bind(identity.id)
        .fetch_all(&self.pool)
        .await?;
        Ok(names.iter().filter_map(|name| Role::parse(name)).collect())
    }

    async fn verify_password(
        &self,
        identity: &Identity,
        password: &str,
        remember_me: bool,
    ) -> Result<PasswordVerdict, StoreError> {
        let response = self
            .http
            .post(&self.verify_url)
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({
                "email": identity.email,
                "password": password,
                "remember_me": remember_me,
            }))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let body = response.json::<VerifyResponse>().await?;
            return Ok(PasswordVerdict {
                success: body.verified && !body.requires_two_factor && !body.locked_out,
                requires_two_factor: body.requires_two_factor,
                is_locked_out: body.locked_out,
            });
        }

        if status.is_client_error() {
            // The provider rejects bad credentials with a client error; that is
            // a failed attempt, not a dependency failure.
            return Ok(PasswordVerdict::default());
        }

        Err(StoreError::ProviderStatus(status))
    }

    async fn replace_roles(&self, identity: &Identity, role: Role) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        // Serialize concurrent replacements for the same identity.
        sqlx::query("SELECT id FROM identities WHERE id = $1 FOR UPDATE")
            .bind(identity.id)
            .fetch_optional(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM identity_roles WHERE identity_id = $1")
            .bind(identity.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO identity_roles (identity_id, role) VALUES ($1, $2)")
            .bind(identity.id)
            .bind(role.as_str())
            .execute(&mut *tx)
            .await?;

        // Commit makes remove+add visible as one unit; the identity is never
        // observable role-less.
        tx.commit().await?;
        Ok(())
    }
}
