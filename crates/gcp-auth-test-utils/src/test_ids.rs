//! Fixed test IDs for deterministic tests
//!
//! All identities and timestamps are fixed so tokens built in one test are
//! byte-for-byte reproducible.

// Reference time (2023-11-14T22:13:20Z); pair with `FixedClock::new(TEST_NOW)`
pub const TEST_NOW: i64 = 1_700_000_000;

// Projects
pub const TEST_PROJECT_ID: &str = "test-project";
pub const TEST_OTHER_PROJECT_ID: &str = "other-project";

// Service accounts
pub const TEST_SA_EMAIL: &str = "login-sa@test-project.iam.gserviceaccount.com";
pub const TEST_SA_UNIQUE_ID: &str = "109876543210987654321";
pub const TEST_OTHER_SA_EMAIL: &str = "other-sa@test-project.iam.gserviceaccount.com";
pub const TEST_OTHER_SA_UNIQUE_ID: &str = "100000000000000000001";
pub const TEST_FOREIGN_SA_EMAIL: &str = "foreign-sa@other-project.iam.gserviceaccount.com";
pub const TEST_FOREIGN_SA_UNIQUE_ID: &str = "100000000000000000002";

// Roles
pub const TEST_ROLE_NAME: &str = "testrole";
pub const TEST_OTHER_ROLE_NAME: &str = "otherrole";

// Signing Key IDs (strings)
pub const TEST_KEY_ID_1: &str = "0f3c9a1d5e7b2468ace013579bdf2468ace01357";
pub const TEST_KEY_ID_2: &str = "7e5d3c1b9a8f6e4d2c0b1a3f5e7d9c1b3a5f7e9d";
