/// Router Module Index
///
/// Organizes routing into security-segregated modules so access control is
/// applied explicitly at the module level (via Axum layers) instead of being
/// rediscovered handler by handler.
///
/// The three modules map directly to the access tiers of the portal.

/// Routes accessible to everyone: login and the read-only course catalog.
pub mod public;

/// Routes behind the `AuthUser` extractor middleware: the student and
/// instructor areas. Role membership is checked inside the handlers.
pub mod authenticated;

/// Routes nested under `/admin`, restricted to identities holding the
/// 'admin' role; every handler re-checks the role explicitly.
pub mod admin;
