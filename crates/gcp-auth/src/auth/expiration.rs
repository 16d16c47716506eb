//! Expiration window enforcement.

use crate::errors::{InvalidTokenReason, LoginError};

/// Check that `claim_exp` lies in `(now, now + max_minutes]`.
///
/// An expiration at or before `now` is [`LoginError::ExpiredToken`]; one past
/// the upper bound is an invalid token naming the window in minutes, so
/// operators can tell clock skew from role misconfiguration.
pub fn check_expiration_window(
    claim_exp: i64,
    now: i64,
    max_minutes: u32,
) -> Result<(), LoginError> {
    if claim_exp <= now {
        return Err(LoginError::ExpiredToken);
    }

    let latest = now.saturating_add(i64::from(max_minutes) * 60);
    if claim_exp > latest {
        return Err(InvalidTokenReason::ExpiresTooLate { max_minutes }.into());
    }

    Ok(())
}
