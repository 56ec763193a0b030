use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Generic user-facing message for every rejected login attempt. Wrong email,
/// wrong role and wrong password must be indistinguishable to the caller so
/// accounts and role memberships cannot be enumerated.
pub const INVALID_LOGIN_MESSAGE: &str = "Invalid login attempt.";

/// StoreError
///
/// Failures of the collaborators the core depends on: the persistence store
/// and the external identity provider. Terminal for the current request.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("identity provider unreachable: {0}")]
    Provider(#[from] reqwest::Error),

    #[error("identity provider returned {0}")]
    ProviderStatus(reqwest::StatusCode),

    /// A row the store guarantees to exist could not be re-read, e.g. after
    /// losing an insert race to a writer whose row then vanished.
    #[error("store inconsistency: {0}")]
    Inconsistent(&'static str),
}

/// AppError
///
/// The application's error taxonomy. The `IntoResponse` mapping is the single
/// place where internal distinctions are collapsed into the generic surface
/// the boundary is allowed to show.
#[derive(Debug, Error)]
pub enum AppError {
    /// Submitted role is not one of the three allowed values. Field-level,
    /// actionable, rejected before the credential store is touched.
    #[error("invalid role selection")]
    InvalidRole,

    /// Email unknown or password wrong. Logged distinctly, surfaced generically.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The account exists but does not hold the submitted role. Surfaced with
    /// the same generic message as bad credentials.
    #[error("account does not hold the submitted role")]
    RoleMismatch,

    /// Resource missing, or existing but not owned by the caller. The two are
    /// deliberately indistinguishable and render as not-found.
    #[error("resource not found or not owned")]
    NotOwned,

    /// Authenticated caller lacks the role an area requires.
    #[error("caller lacks the required role")]
    Forbidden,

    /// Category deletion blocked by the ON DELETE RESTRICT foreign key.
    #[error("category is still referenced by courses")]
    CategoryInUse,

    /// Malformed or missing required input; the message is field-specific.
    #[error("{0}")]
    Validation(String),

    #[error("session token signing failed")]
    Token(#[source] jsonwebtoken::errors::Error),

    #[error(transparent)]
    Dependency(#[from] StoreError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::InvalidRole => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "role must be one of student, instructor, admin".to_string(),
            ),
            AppError::InvalidCredentials | AppError::RoleMismatch => {
                // Internal distinction is for the logs only.
                tracing::warn!(reason = %self, "login attempt rejected");
                (StatusCode::UNAUTHORIZED, INVALID_LOGIN_MESSAGE.to_string())
            }
            AppError::NotOwned => (StatusCode::NOT_FOUND, "Not found.".to_string()),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden.".to_string()),
            AppError::CategoryInUse => (
                StatusCode::CONFLICT,
                "category is still used by one or more courses".to_string(),
            ),
            AppError::Validation(message) => {
                (StatusCode::UNPROCESSABLE_ENTITY, message.clone())
            }
            AppError::Token(source) => {
                tracing::error!(error = %source, "failed to sign session token");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Request failed.".to_string(),
                )
            }
            AppError::Dependency(source) => {
                tracing::error!(error = %source, "dependency failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Request failed.".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
