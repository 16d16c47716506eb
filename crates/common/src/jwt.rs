//! Compact JWT plumbing shared by the login crates.
//!
//! This module provides the structural half of JWT handling:
//! - Size limits for DoS prevention
//! - Splitting a compact token into its three segments
//! - Decoding the header and claims WITHOUT verifying the signature
//! - The RSA algorithm allow-list
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Nothing decoded here is trustworthy until the signature has been
//!   verified against a resolved public key. The unverified header and claims
//!   are only used to pick which key to fetch.
//! - Only RSA PKCS#1 v1.5 signatures with SHA-2 are accepted; `none`, HMAC and
//!   elliptic-curve algorithms are rejected by name
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{decode_header, decode_unverified_claims, is_accepted_algorithm};
//!
//! let header = decode_header(token)?;
//! if !is_accepted_algorithm(&header.alg) {
//!     return Err("unsupported algorithm");
//! }
//! let hint: Claims = decode_unverified_claims(token)?;
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// Provider-signed identity tokens are well under 2KB (RS256 signature is
/// 342 base64url characters, claims are a handful of short strings). Anything
/// larger is rejected BEFORE base64 decoding or signature verification.
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Algorithms accepted for login tokens.
///
/// RSA PKCS#1 v1.5 with SHA-2 only. The identity provider signs with RS256;
/// the longer digests are accepted because they share the same key type.
pub const ACCEPTED_ALGORITHMS: &[&str] = &["RS256", "RS384", "RS512"];

// =============================================================================
// Error Types
// =============================================================================

/// Structural errors found while decoding a compact JWT.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("token exceeds the maximum size of {} bytes", MAX_JWT_SIZE_BYTES)]
    TokenTooLarge,

    /// Token is not `header.claims.signature`.
    #[error("token must have three dot-separated segments")]
    WrongSegmentCount,

    /// A segment is not valid unpadded base64url.
    #[error("{0} segment is not valid base64url")]
    InvalidEncoding(&'static str),

    /// A segment decoded but is not the expected JSON object.
    #[error("{0} segment is not valid JSON")]
    InvalidJson(&'static str),
}

// =============================================================================
// Header
// =============================================================================

/// The fields of a JOSE header the login path looks at.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JwtHeader {
    /// Signing algorithm as written by the issuer (not yet checked).
    pub alg: String,

    /// Key ID of the signing key, if the issuer set one.
    #[serde(default)]
    pub kid: Option<String>,

    /// Token type, usually `JWT`.
    #[serde(default)]
    pub typ: Option<String>,
}

// =============================================================================
// Functions
// =============================================================================

/// Split a compact JWT into its header, claims and signature segments.
///
/// # Errors
///
/// - `TokenTooLarge` - token exceeds `MAX_JWT_SIZE_BYTES`
/// - `WrongSegmentCount` - not exactly three segments, or an empty header/claims
pub fn split_token(token: &str) -> Result<(&str, &str, &str), JwtValidationError> {
    // Check token size first (DoS prevention)
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    let mut parts = token.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(header), Some(claims), Some(signature), None)
            if !header.is_empty() && !claims.is_empty() =>
        {
            Ok((header, claims, signature))
        }
        _ => {
            tracing::debug!(
                target: "common.jwt",
                parts = token.split('.').count(),
                "Token rejected: invalid JWT format"
            );
            Err(JwtValidationError::WrongSegmentCount)
        }
    }
}

/// Decode the JOSE header without verifying the signature.
///
/// # Errors
///
/// Returns the structural error from [`split_token`], or `InvalidEncoding` /
/// `InvalidJson` for the header segment.
pub fn decode_header(token: &str) -> Result<JwtHeader, JwtValidationError> {
    let (header, _, _) = split_token(token)?;
    decode_segment(header, "header")
}

/// Decode the claims segment without verifying the signature.
///
/// The result is only a hint for key selection. Callers MUST verify the
/// signature before trusting any of it.
///
/// # Errors
///
/// Returns the structural error from [`split_token`], or `InvalidEncoding` /
/// `InvalidJson` for the claims segment.
pub fn decode_unverified_claims<T: DeserializeOwned>(token: &str) -> Result<T, JwtValidationError> {
    let (_, claims, _) = split_token(token)?;
    decode_segment(claims, "claims")
}

/// Whether `alg` is on the RSA allow-list.
///
/// Comparison is exact: `rs256` and `RS256 ` are not accepted.
#[must_use]
pub fn is_accepted_algorithm(alg: &str) -> bool {
    ACCEPTED_ALGORITHMS.contains(&alg)
}

fn decode_segment<T: DeserializeOwned>(
    segment: &str,
    name: &'static str,
) -> Result<T, JwtValidationError> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).map_err(|e| {
        tracing::debug!(target: "common.jwt", segment = name, error = %e, "Failed to decode JWT segment base64");
        JwtValidationError::InvalidEncoding(name)
    })?;

    serde_json::from_slice(&bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", segment = name, error = %e, "Failed to parse JWT segment JSON");
        JwtValidationError::InvalidJson(name)
    })
}

// =============================================================================
// Tests
// =============================================================================
