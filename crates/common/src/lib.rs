//! Common utilities shared across the GCP auth crates.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for compact JWT plumbing (size limits, unverified decoding, algorithms)
pub mod jwt;
