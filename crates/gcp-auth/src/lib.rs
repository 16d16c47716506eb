//! GCP Service Account Login Library
//!
//! Verifies a signed JWT asserting a service account identity, authorizes
//! that identity against an operator-defined role, and produces an
//! [`AuthGrant`](models::AuthGrant) of policies and lease parameters.
//!
//! # Architecture
//!
//! The login path follows the Service -> Repository pattern, with token
//! verification and key lookup in their own modules:
//!
//! ```text
//! services/login_service.rs -> repositories/roles.rs
//!                           -> keys/*.rs
//!                           -> auth/*.rs
//!                           -> services/grant_builder.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - JWT verification, expiration window, authorization matching
//! - `clock` - Injected time source
//! - `config` - Login configuration from environment
//! - `errors` - Classified login errors
//! - `keys` - Signing key resolution (HTTP and mock)
//! - `models` - Roles, identities, requests and grants
//! - `observability` - Metrics and log correlation hashing
//! - `repositories` - Role lookup
//! - `services` - Login orchestration and grant building

pub mod auth;
pub mod clock;
pub mod config;
pub mod errors;
pub mod keys;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod services;
