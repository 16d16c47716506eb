//! JWT parsing and verification for login tokens.
//!
//! Verification runs in three steps, each usable on its own:
//!
//! 1. [`parse_unverified`] - structure, algorithm allow-list, key id and
//!    claimed subject. Only used to pick the key to fetch.
//! 2. [`verify_signature`] - RSA signature check with `jsonwebtoken`. Its own
//!    time checks are disabled; time is always taken from the injected clock.
//! 3. [`validate_claims`] - audience, subject binding, expiration window and
//!    not-before, against the resolved service account.
//!
//! Every failure fails closed with a classified [`LoginError`].

use crate::auth::claims::GcpJwtClaims;
use crate::auth::expiration::check_expiration_window;
use crate::errors::{InvalidTokenReason, LoginError};
use crate::keys::ServiceAccount;
use common::jwt::{decode_header, decode_unverified_claims, is_accepted_algorithm};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::str::FromStr;

/// What an unverified token claims about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnverifiedToken {
    pub algorithm: Algorithm,
    /// Key id chosen from the header or the request hint.
    pub key_id: String,
    /// Claimed subject, used as the service account hint.
    pub subject: String,
}

/// Decode a token's header and claims without trusting them.
///
/// The header `kid` is preferred; `requested_key_id` is used when the header
/// has none. If both are present they must agree.
///
/// # Errors
///
/// - `MalformedToken` - not a compact JWT, bad encoding, or no key id at all
/// - `InvalidToken(UnsupportedAlgorithm)` - anything but RS256/RS384/RS512
/// - `InvalidToken(KeyIdMismatch)` - header and request name different keys
/// - `InvalidToken(MissingSubject)` - no `sub` claim
pub fn parse_unverified(
    token: &str,
    requested_key_id: Option<&str>,
) -> Result<UnverifiedToken, LoginError> {
    let header = decode_header(token)?;

    if !is_accepted_algorithm(&header.alg) {
        tracing::debug!(target: "gcp_auth.jwt", alg = %header.alg, "Token rejected: unsupported algorithm");
        return Err(InvalidTokenReason::UnsupportedAlgorithm(header.alg).into());
    }
    let algorithm = Algorithm::from_str(&header.alg)
        .map_err(|_| InvalidTokenReason::UnsupportedAlgorithm(header.alg.clone()))?;

    let header_kid = header.kid.filter(|k| !k.is_empty());
    let requested_kid = requested_key_id.filter(|k| !k.is_empty());
    let key_id = match (header_kid, requested_kid) {
        (Some(header), Some(requested)) if header != requested => {
            tracing::debug!(target: "gcp_auth.jwt", "Token rejected: header kid differs from requested kid");
            return Err(InvalidTokenReason::KeyIdMismatch {
                header,
                requested: requested.to_string(),
            }
            .into());
        }
        (Some(header), _) => header,
        (None, Some(requested)) => requested.to_string(),
        (None, None) => return Err(LoginError::MalformedToken("missing key id".to_string())),
    };

    let claims: GcpJwtClaims = decode_unverified_claims(token)?;
    let subject = claims
        .subject()
        .ok_or(InvalidTokenReason::MissingSubject)?
        .to_string();

    Ok(UnverifiedToken {
        algorithm,
        key_id,
        subject,
    })
}

/// Verify the token's signature and return its claims.
///
/// Only `algorithm` is accepted; the caller passes the one checked by
/// [`parse_unverified`].
pub fn verify_signature(
    token: &str,
    algorithm: Algorithm,
    key: &DecodingKey,
) -> Result<GcpJwtClaims, LoginError> {
    let mut validation = Validation::new(algorithm);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let token_data = decode::<GcpJwtClaims>(token, key, &validation).map_err(|e| {
        tracing::debug!(target: "gcp_auth.jwt", error = %e, "Token signature verification failed");
        match e.kind() {
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName | ErrorKind::MissingAlgorithm => {
                LoginError::from(InvalidTokenReason::UnsupportedAlgorithm(format!("{algorithm:?}")))
            }
            ErrorKind::InvalidRsaKey(reason) => {
                LoginError::from(InvalidTokenReason::UnusablePublicKey(reason.clone()))
            }
            ErrorKind::InvalidKeyFormat => LoginError::from(InvalidTokenReason::UnusablePublicKey(
                "invalid key format".to_string(),
            )),
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => LoginError::MalformedToken(e.to_string()),
            _ => LoginError::from(InvalidTokenReason::BadSignature),
        }
    })?;

    Ok(token_data.claims)
}

/// Validate verified claims against the login context.
///
/// Checked in order: audience, subject binding, expiration window, not-before.
pub fn validate_claims(
    claims: &GcpJwtClaims,
    expected_audience: &str,
    account: &ServiceAccount,
    now: i64,
    max_jwt_exp_minutes: u32,
) -> Result<(), LoginError> {
    let audience_ok = claims
        .aud
        .as_ref()
        .is_some_and(|aud| aud.contains(expected_audience));
    if !audience_ok {
        tracing::debug!(target: "gcp_auth.jwt", expected = %expected_audience, "Token rejected: audience mismatch");
        return Err(InvalidTokenReason::AudienceMismatch {
            expected: expected_audience.to_string(),
        }
        .into());
    }

    let subject = claims.subject().ok_or(InvalidTokenReason::MissingSubject)?;
    if subject != account.email && subject != account.unique_id {
        tracing::debug!(target: "gcp_auth.jwt", "Token rejected: subject is not the resolved service account");
        return Err(InvalidTokenReason::SubjectMismatch.into());
    }

    let exp = claims.exp.ok_or(InvalidTokenReason::MissingExpiration)?;
    check_expiration_window(exp, now, max_jwt_exp_minutes)?;

    if let Some(nbf) = claims.nbf {
        if nbf > now {
            tracing::debug!(target: "gcp_auth.jwt", nbf = nbf, now = now, "Token rejected: not yet valid");
            return Err(InvalidTokenReason::NotYetValid.into());
        }
    }

    Ok(())
}
