//! Observability for the login path.
//!
//! # Privacy by Default
//!
//! Async entry points use `#[instrument(skip_all)]` and add fields explicitly.
//! Fields are categorized as:
//! - **SAFE**: Can be logged in plaintext (role names, key ids, error kinds)
//! - **HASHED**: Must be SHA-256 hashed for correlation (service account emails)
//! - **NEVER**: Must never appear in logs (raw JWTs, access tokens)

pub mod metrics;

use crate::errors::{InvalidTokenReason, LoginError};
use sha2::{Digest, Sha256};

/// Hash a field value for correlation in logs (SHA-256, first 8 hex chars)
///
/// Used for service account emails, which need correlation across log
/// entries but should not be stored in plaintext.
///
/// # Privacy
///
/// This is NOT cryptographically secure for secrets - it's a one-way hash
/// for correlation purposes only.
pub fn hash_for_correlation(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    let result = hasher.finalize();
    // First 4 bytes (8 hex chars) are enough for correlation
    hex::encode(result.get(..4).unwrap_or_default())
}

/// Render a login error for logs with account identifiers hashed.
///
/// Errors that name a service account (unauthorized, unknown account) carry
/// the email or unique id in their Display text; here those become
/// correlation hashes. Every other error renders unchanged.
pub fn redacted_error(err: &LoginError) -> String {
    match err {
        LoginError::Unauthorized { email, id, role } => format!(
            "service account {} ({}) is not authorized for role {role}",
            hash_for_correlation(email),
            hash_for_correlation(id)
        ),
        LoginError::InvalidToken(InvalidTokenReason::UnknownServiceAccount(account)) => format!(
            "invalid JWT: service account {} was not found",
            hash_for_correlation(account)
        ),
        other => other.to_string(),
    }
}
