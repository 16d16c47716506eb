//! Token verification and authorization.
//!
//! - `claims` - JWT claims structure
//! - `jwt` - unverified parsing, signature verification, claim validation
//! - `expiration` - the per-role expiration window
//! - `authorization` - service account to role matching

pub mod authorization;
pub mod claims;
pub mod expiration;
pub mod jwt;

pub use authorization::is_authorized;
pub use claims::{Audience, GcpJwtClaims};
pub use expiration::check_expiration_window;
