//! Login error types.
//!
//! Every failure on the login path is returned as a classified [`LoginError`],
//! never a panic. The kind of an error is stable ([`LoginErrorKind`]) and is
//! what tests and metrics match on; the Display text is documented here so
//! operators can rely on it:
//!
//! | Kind                   | Message                                                           |
//! |------------------------|-------------------------------------------------------------------|
//! | `config`               | `<message>` (e.g. `role is required`)                             |
//! | `not_found`            | `role "<role>" not found`                                         |
//! | `malformed_token`      | `invalid JWT: malformed token: <reason>`                          |
//! | `invalid_token`        | `invalid JWT: <reason>`                                           |
//! | `expired_token`        | `invalid JWT: token is expired`                                   |
//! | `unauthorized`         | `service account <email> (<id>) is not authorized for role <role>` |
//! | `upstream_unavailable` | `upstream unavailable: <message>`                                 |
//!
//! Only `upstream_unavailable` is retryable.

use common::jwt::JwtValidationError;
use thiserror::Error;

/// Why a structurally valid token was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidTokenReason {
    #[error("signature verification failed")]
    BadSignature,

    #[error("unsupported signing algorithm \"{0}\" (accepted: RS256, RS384, RS512)")]
    UnsupportedAlgorithm(String),

    #[error("audience does not match expected audience \"{expected}\"")]
    AudienceMismatch { expected: String },

    #[error("subject claim is missing")]
    MissingSubject,

    #[error("subject does not match the resolved service account")]
    SubjectMismatch,

    #[error("expiration claim is missing")]
    MissingExpiration,

    /// `exp` lies beyond the role's allowed window.
    #[error("token must expire within {max_minutes} minutes")]
    ExpiresTooLate { max_minutes: u32 },

    #[error("token is not valid yet")]
    NotYetValid,

    #[error("signing key \"{kid}\" was not found")]
    UnknownSigningKey { kid: String },

    #[error("service account \"{0}\" was not found")]
    UnknownServiceAccount(String),

    #[error("header key id \"{header}\" does not match requested key id \"{requested}\"")]
    KeyIdMismatch { header: String, requested: String },

    #[error("public key is unusable: {0}")]
    UnusablePublicKey(String),
}

/// Classified login error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoginError {
    /// Missing or invalid required input.
    #[error("{0}")]
    Config(String),

    #[error("role \"{role}\" not found")]
    NotFound { role: String },

    #[error("invalid JWT: malformed token: {0}")]
    MalformedToken(String),

    #[error("invalid JWT: {0}")]
    InvalidToken(InvalidTokenReason),

    #[error("invalid JWT: token is expired")]
    ExpiredToken,

    /// Identity verified, but the role does not allow it.
    #[error("service account {email} ({id}) is not authorized for role {role}")]
    Unauthorized {
        email: String,
        id: String,
        role: String,
    },

    /// A role store or signing key lookup failed or timed out.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
}

/// Stable discriminant of a [`LoginError`].
///
/// Used as a bounded metrics label, so the set must stay small.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoginErrorKind {
    Config,
    NotFound,
    MalformedToken,
    InvalidToken,
    ExpiredToken,
    Unauthorized,
    UpstreamUnavailable,
}

impl LoginErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginErrorKind::Config => "config",
            LoginErrorKind::NotFound => "not_found",
            LoginErrorKind::MalformedToken => "malformed_token",
            LoginErrorKind::InvalidToken => "invalid_token",
            LoginErrorKind::ExpiredToken => "expired_token",
            LoginErrorKind::Unauthorized => "unauthorized",
            LoginErrorKind::UpstreamUnavailable => "upstream_unavailable",
        }
    }
}

impl LoginError {
    pub fn kind(&self) -> LoginErrorKind {
        match self {
            LoginError::Config(_) => LoginErrorKind::Config,
            LoginError::NotFound { .. } => LoginErrorKind::NotFound,
            LoginError::MalformedToken(_) => LoginErrorKind::MalformedToken,
            LoginError::InvalidToken(_) => LoginErrorKind::InvalidToken,
            LoginError::ExpiredToken => LoginErrorKind::ExpiredToken,
            LoginError::Unauthorized { .. } => LoginErrorKind::Unauthorized,
            LoginError::UpstreamUnavailable(_) => LoginErrorKind::UpstreamUnavailable,
        }
    }

    /// Whether the caller may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LoginError::UpstreamUnavailable(_))
    }
}

impl From<InvalidTokenReason> for LoginError {
    fn from(reason: InvalidTokenReason) -> Self {
        LoginError::InvalidToken(reason)
    }
}

impl From<JwtValidationError> for LoginError {
    fn from(err: JwtValidationError) -> Self {
        LoginError::MalformedToken(err.to_string())
    }
}

/// Errors found when validating a role record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoleValidationError {
    #[error("role name must not be empty")]
    EmptyName,

    #[error("max_jwt_exp_minutes must be positive, got {0}")]
    NonPositiveMaxJwtExp(u32),

    #[error("service account \"*\" cannot be combined with other service accounts")]
    WildcardMixedWithExplicit,

    #[error("service account entries must not be empty")]
    EmptyServiceAccount,

    #[error("project_id must not be empty when set")]
    EmptyProjectId,
}
