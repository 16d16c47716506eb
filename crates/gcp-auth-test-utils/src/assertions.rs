//! Custom test assertions for expressive tests
//!
//! Provides trait-based assertions for grants and login errors.

use gcp_auth::errors::{LoginError, LoginErrorKind};
use gcp_auth::models::AuthGrant;
use std::collections::BTreeSet;
use std::time::Duration;

/// Custom assertions for successful logins
///
/// # Example
/// ```rust,ignore
/// grant
///     .assert_policies(&["default", "dev", "prod"])
///     .assert_ttl_secs(1800)
///     .assert_renewable();
/// ```
pub trait GrantAssertions {
    /// Assert the grant's policies are exactly `expected` (order-insensitive)
    fn assert_policies(&self, expected: &[&str]) -> &Self;

    /// Assert a metadata entry
    fn assert_metadata(&self, key: &str, value: &str) -> &Self;

    /// Assert the grant's identity name
    fn assert_identity(&self, name: &str) -> &Self;

    fn assert_ttl_secs(&self, seconds: u64) -> &Self;

    fn assert_max_ttl_secs(&self, seconds: u64) -> &Self;

    fn assert_renewable(&self) -> &Self;
}

impl GrantAssertions for AuthGrant {
    fn assert_policies(&self, expected: &[&str]) -> &Self {
        let expected: BTreeSet<String> = expected.iter().map(ToString::to_string).collect();
        assert_eq!(self.policies, expected, "grant policies differ");
        self
    }

    fn assert_metadata(&self, key: &str, value: &str) -> &Self {
        assert_eq!(
            self.metadata.get(key).map(String::as_str),
            Some(value),
            "metadata {key:?} differs"
        );
        self
    }

    fn assert_identity(&self, name: &str) -> &Self {
        assert_eq!(self.identity_name, name, "grant identity differs");
        self
    }

    fn assert_ttl_secs(&self, seconds: u64) -> &Self {
        assert_eq!(self.ttl, Duration::from_secs(seconds), "grant ttl differs");
        self
    }

    fn assert_max_ttl_secs(&self, seconds: u64) -> &Self {
        assert_eq!(
            self.max_ttl,
            Duration::from_secs(seconds),
            "grant max_ttl differs"
        );
        self
    }

    fn assert_renewable(&self) -> &Self {
        assert!(self.renewable, "grant must be renewable");
        self
    }
}

/// Custom assertions for login results
pub trait LoginResultAssertions {
    /// Assert the login failed with `kind`, returning the error
    fn assert_error_kind(self, kind: LoginErrorKind) -> LoginError;
}

impl LoginResultAssertions for Result<AuthGrant, LoginError> {
    fn assert_error_kind(self, kind: LoginErrorKind) -> LoginError {
        match self {
            Ok(grant) => panic!("expected {kind:?} error, login succeeded: {grant:?}"),
            Err(err) => {
                assert_eq!(err.kind(), kind, "unexpected error: {err}");
                err
            }
        }
    }
}
