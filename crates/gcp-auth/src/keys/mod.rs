//! Signing key resolution.
//!
//! A token's signature is checked against a public key looked up by the
//! service account the token claims to be and the key id it names. The
//! lookup itself is behind [`SigningKeyResolver`]:
//!
//! - [`iam_client::IamKeyResolver`] talks to the provider's IAM and JWKS
//!   endpoints and caches key sets.
//! - [`mock::MockSigningKeyResolver`] serves fixed keys for tests.
//!
//! Anything returned by a resolver is trusted as the binding between a
//! service account and its keys; nothing from the token is trusted until the
//! signature has been verified with it.

pub mod iam_client;
pub mod mock;

use crate::errors::{InvalidTokenReason, LoginError};
use async_trait::async_trait;
use jsonwebtoken::DecodingKey;

/// Service account the resolver bound a key to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAccount {
    pub email: String,
    /// Provider unique id (numeric string).
    pub unique_id: String,
    pub project_id: String,
}

/// RSA public key material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    /// Base64url modulus and exponent, as served in a JWK.
    RsaComponents { n: String, e: String },
    /// PEM encoded public key (PKCS#1 or SubjectPublicKeyInfo).
    RsaPem(String),
}

impl PublicKey {
    /// Convert into a verification key.
    pub fn to_decoding_key(&self) -> Result<DecodingKey, InvalidTokenReason> {
        let key = match self {
            PublicKey::RsaComponents { n, e } => DecodingKey::from_rsa_components(n, e),
            PublicKey::RsaPem(pem) => DecodingKey::from_rsa_pem(pem.as_bytes()),
        };
        key.map_err(|e| InvalidTokenReason::UnusablePublicKey(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSigningKey {
    pub service_account: ServiceAccount,
    pub public_key: PublicKey,
}

/// Looks up the public key a service account signed a token with.
///
/// `service_account_hint` is the email or unique id the unverified token
/// claims. Implementations map failures as follows:
///
/// - unknown account → `InvalidToken(UnknownServiceAccount)`
/// - unknown key id → `InvalidToken(UnknownSigningKey)`
/// - transient failures → `UpstreamUnavailable`
#[async_trait]
pub trait SigningKeyResolver: Send + Sync {
    async fn resolve(
        &self,
        service_account_hint: &str,
        key_id: &str,
    ) -> Result<ResolvedSigningKey, LoginError>;
}
