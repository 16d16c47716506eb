//! Redacting secret types for presented JWTs and outbound access tokens.

pub use secrecy::{ExposeSecret, SecretString};
