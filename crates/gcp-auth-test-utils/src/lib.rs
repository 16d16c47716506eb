//! # GCP Auth Test Utilities
//!
//! Shared test utilities for the login crates.
//!
//! This crate provides:
//! - Deterministic crypto fixtures (fixed RSA keys for reproducible tests)
//! - Test data builders (TestTokenBuilder, test roles, test services)
//! - Fixed test IDs (accounts, projects, key ids, reference time)
//! - Custom assertions (GrantAssertions, LoginResultAssertions)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gcp_auth_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let (service, _clock) =
//!         test_login_service(vec![test_role()], Arc::new(test_key_resolver()));
//!
//!     let token = TestTokenBuilder::new().expires_in_minutes(20).build();
//!
//!     service
//!         .login_with(TEST_ROLE_NAME, &token)
//!         .await?
//!         .assert_policies(&["default", "dev", "prod"])
//!         .assert_renewable();
//! }
//! ```

pub mod assertions;
pub mod crypto_fixtures;
pub mod test_ids;
pub mod token_builders;

// Re-export commonly used items
pub use assertions::*;
pub use crypto_fixtures::*;
pub use test_ids::*;
pub use token_builders::*;
