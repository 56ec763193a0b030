use axum::{
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, header, request::Parts},
};
use jsonwebtoken::{
    DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    identity::IdentityState,
    models::Role,
};

// Session length in seconds: a day normally, thirty days with remember-me.
const SESSION_SECS: u64 = 60 * 60 * 24;
const REMEMBERED_SESSION_SECS: u64 = 60 * 60 * 24 * 30;

/// Claims
///
/// The payload signed into every session JWT and validated on every
/// authenticated request.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the identity's UUID (identities.id).
    pub sub: Uuid,
    /// Expiration time; expired tokens are rejected.
    pub exp: usize,
    /// Issued at.
    pub iat: usize,
}

/// issue_token
///
/// Signs a session JWT for a successfully routed login. `remember_me`
/// lengthens the expiry window; the roles are deliberately NOT embedded in
/// the token — they are re-read from the store on every request so an admin
/// role change takes effect without waiting for token expiry.
pub fn issue_token(
    identity_id: Uuid,
    remember_me: bool,
    secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let lifetime = if remember_me {
        REMEMBERED_SESSION_SECS
    } else {
        SESSION_SECS
    };

    let claims = Claims {
        sub: identity_id,
        iat: now as usize,
        exp: (now + lifetime) as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// AuthUser
///
/// The resolved principal of an authenticated request: the identity plus its
/// CURRENT role set. Every core operation receives this explicitly; there is
/// no ambient "current user" global.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub roles: Vec<Role>,
}

impl AuthUser {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }
}

/// AuthUser Extractor Implementation
///
/// Implements Axum's FromRequestParts trait, making AuthUser usable as a
/// function argument in any authenticated handler and keeping authentication
/// separated from handler business logic.
///
/// The process:
/// 1. Dependency resolution: identity gateway and AppConfig from app state.
/// 2. Local bypass: 'x-user-id' header access, guarded on `Env::Local`.
/// 3. Token validation: Bearer extraction and JWT decoding.
/// 4. Store lookup: the identity's existence and current roles.
///
/// Rejection: 401 Unauthorized on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    IdentityState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let gateway = IdentityState::from_ref(state);
        let config = AppConfig::from_ref(state);

        // Local development bypass: a known identity UUID in 'x-user-id'.
        // The identity must still exist so roles are loaded correctly.
        if config.env == Env::Local {
            if let Some(user_id_header) = parts.headers.get("x-user-id") {
                if let Ok(id_str) = user_id_header.to_str() {
                    if let Ok(identity_id) = Uuid::parse_str(id_str) {
                        if let Ok(Some(identity)) = gateway.find_by_id(identity_id).await {
                            let roles = gateway
                                .get_roles(&identity)
                                .await
                                .map_err(|_| StatusCode::UNAUTHORIZED)?;
                            return Ok(AuthUser {
                                id: identity.id,
                                email: identity.email,
                                roles,
                            });
                        }
                    }
                }
            }
        }
        // In Production, or if the bypass did not resolve, fall through to
        // standard JWT validation.

        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let token_data = match decode::<Claims>(token, &decoding_key, &validation) {
            Ok(data) => data,
            Err(e) => {
                return match e.kind() {
                    ErrorKind::ExpiredSignature => Err(StatusCode::UNAUTHORIZED),
                    _ => Err(StatusCode::UNAUTHORIZED),
                };
            }
        };

        // Final verification against the store: a deleted identity must not
        // keep access just because its token is still fresh.
        let identity = gateway
            .find_by_id(token_data.claims.sub)
            .await
            .map_err(|_| StatusCode::UNAUTHORIZED)?
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let roles = gateway
            .get_roles(&identity)
            .await
            .map_err(|_| StatusCode::UNAUTHORIZED)?;

        Ok(AuthUser {
            id: identity.id,
            email: identity.email,
            roles,
        })
    }
}
