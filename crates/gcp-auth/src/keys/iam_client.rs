//! Signing key resolver backed by the provider's public endpoints.
//!
//! Resolution is two lookups:
//!
//! 1. `GET {iam}/v1/projects/-/serviceAccounts/{hint}` binds the claimed
//!    email or unique id to the account's email, unique id and project.
//! 2. `GET {jwk}/service_accounts/v1/jwk/{email}` returns the account's
//!    public keys as a JWKS document; the key is selected by `kid`.
//!
//! JWKS documents are cached per account email with a TTL. A `kid` missing
//! from a cached document triggers one refetch so rotated keys are picked up
//! before the TTL runs out.
//!
//! # Security
//!
//! - The optional IAM access token is held as a `SecretString`
//! - Account emails are logged only as correlation hashes
//! - HTTPS should be used in production (enforced by deployment config)

use crate::config::LoginConfig;
use crate::errors::{InvalidTokenReason, LoginError};
use crate::keys::{PublicKey, ResolvedSigningKey, ServiceAccount, SigningKeyResolver};
use crate::observability::hash_for_correlation;
use crate::observability::metrics::{record_jwks_cache, record_key_fetch};
use async_trait::async_trait;
use common::secret::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::instrument;

/// HTTP request timeout in seconds.
const HTTP_TIMEOUT_SECONDS: u64 = 10;

/// Service account resource from the IAM API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAccountResponse {
    pub email: String,
    pub unique_id: String,
    pub project_id: String,
}

/// JSON Web Key from the per-account JWKS endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type ("RSA" for service account keys).
    pub kty: String,

    /// Key ID - matches the `kid` header of tokens signed with this key.
    pub kid: String,

    /// RSA modulus (base64url).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA exponent (base64url).
    #[serde(default)]
    pub e: Option<String>,

    #[serde(default)]
    pub alg: Option<String>,

    #[serde(default, rename = "use")]
    pub key_use: Option<String>,
}

impl Jwk {
    /// RSA components of this key.
    ///
    /// # Errors
    ///
    /// `UnusablePublicKey` if the key is not an RSA signing key.
    pub fn to_public_key(&self) -> Result<PublicKey, InvalidTokenReason> {
        if self.kty != "RSA" {
            return Err(InvalidTokenReason::UnusablePublicKey(format!(
                "key type \"{}\" is not RSA",
                self.kty
            )));
        }
        if let Some(key_use) = &self.key_use {
            if key_use != "sig" {
                return Err(InvalidTokenReason::UnusablePublicKey(format!(
                    "key use \"{key_use}\" is not sig"
                )));
            }
        }
        match (&self.n, &self.e) {
            (Some(n), Some(e)) if !n.is_empty() && !e.is_empty() => Ok(PublicKey::RsaComponents {
                n: n.clone(),
                e: e.clone(),
            }),
            _ => Err(InvalidTokenReason::UnusablePublicKey(
                "RSA key is missing its modulus or exponent".to_string(),
            )),
        }
    }
}

/// JWKS document.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksResponse {
    pub keys: Vec<Jwk>,
}

/// Cached JWKS data with expiry time.
struct CachedJwks {
    /// Map of key ID to JWK.
    keys: HashMap<String, Jwk>,

    /// When this cache entry expires.
    expires_at: Instant,
}

/// Resolver for service account signing keys over HTTP.
pub struct IamKeyResolver {
    iam_base_url: String,
    jwk_base_url: String,

    http_client: reqwest::Client,

    /// Bearer token for the IAM API, if the embedder supplies one.
    access_token: Option<SecretString>,

    /// JWKS documents keyed by service account email.
    cache: Arc<RwLock<HashMap<String, CachedJwks>>>,

    cache_ttl: Duration,
}

impl IamKeyResolver {
    /// Create a resolver against the given IAM and JWKS base URLs.
    pub fn new(iam_base_url: impl Into<String>, jwk_base_url: impl Into<String>) -> Self {
        let defaults = LoginConfig::default();
        Self::with_ttl(iam_base_url, jwk_base_url, defaults.jwks_cache_ttl)
    }

    /// Create a resolver with a custom JWKS cache TTL.
    pub fn with_ttl(
        iam_base_url: impl Into<String>,
        jwk_base_url: impl Into<String>,
        cache_ttl: Duration,
    ) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECONDS))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "gcp_auth.keys", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            iam_base_url: iam_base_url.into().trim_end_matches('/').to_string(),
            jwk_base_url: jwk_base_url.into().trim_end_matches('/').to_string(),
            http_client,
            access_token: None,
            cache: Arc::new(RwLock::new(HashMap::new())),
            cache_ttl,
        }
    }

    /// Create a resolver from login configuration.
    pub fn from_config(config: &LoginConfig) -> Self {
        Self::with_ttl(
            config.iam_base_url.clone(),
            config.jwk_base_url.clone(),
            config.jwks_cache_ttl,
        )
    }

    /// Authenticate IAM lookups with a bearer token.
    pub fn with_access_token(mut self, token: SecretString) -> Self {
        self.access_token = Some(token);
        self
    }

    /// Look up the service account behind an email or unique id.
    #[instrument(skip_all)]
    pub async fn fetch_service_account(&self, hint: &str) -> Result<ServiceAccount, LoginError> {
        if !is_account_hint(hint) {
            tracing::debug!(
                target: "gcp_auth.keys",
                account = %hash_for_correlation(hint),
                "Service account hint rejected: not an email or numeric id"
            );
            return Err(InvalidTokenReason::UnknownServiceAccount(hint.to_string()).into());
        }
        let url = endpoint_url(
            &self.iam_base_url,
            &["v1", "projects", "-", "serviceAccounts", hint],
        )?;

        let mut request = self.http_client.get(url);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(target: "gcp_auth.keys", error = %e.without_url(), "Failed to fetch service account");
            record_key_fetch("error");
            LoginError::UpstreamUnavailable("service account lookup failed".to_string())
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!(
                target: "gcp_auth.keys",
                account = %hash_for_correlation(hint),
                "Service account not found"
            );
            record_key_fetch("success");
            return Err(InvalidTokenReason::UnknownServiceAccount(hint.to_string()).into());
        }
        if !status.is_success() {
            tracing::error!(
                target: "gcp_auth.keys",
                status = %status,
                "IAM endpoint returned error"
            );
            record_key_fetch("error");
            return Err(LoginError::UpstreamUnavailable(format!(
                "service account lookup returned {status}"
            )));
        }

        let account: ServiceAccountResponse = response.json().await.map_err(|e| {
            tracing::error!(target: "gcp_auth.keys", error = %e.without_url(), "Failed to parse service account response");
            record_key_fetch("error");
            LoginError::UpstreamUnavailable("service account lookup returned an invalid body".to_string())
        })?;
        record_key_fetch("success");

        Ok(ServiceAccount {
            email: account.email,
            unique_id: account.unique_id,
            project_id: account.project_id,
        })
    }

    /// Get a JWK by account email and key ID.
    ///
    /// Serves from cache when the entry is fresh and holds `kid`; otherwise
    /// refetches the account's JWKS once.
    #[instrument(skip_all, fields(kid = %kid))]
    pub async fn get_key(&self, email: &str, kid: &str) -> Result<Jwk, LoginError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.get(email) {
                if cached.expires_at > Instant::now() {
                    if let Some(key) = cached.keys.get(kid) {
                        tracing::debug!(target: "gcp_auth.keys", kid = %kid, "JWKS cache hit");
                        record_jwks_cache("hit");
                        return Ok(key.clone());
                    }
                }
            }
        }

        record_jwks_cache("miss");
        self.refresh_cache(email).await?;

        let cache = self.cache.read().await;
        if let Some(key) = cache.get(email).and_then(|cached| cached.keys.get(kid)) {
            return Ok(key.clone());
        }

        tracing::debug!(
            target: "gcp_auth.keys",
            kid = %kid,
            account = %hash_for_correlation(email),
            "Key not found in JWKS after refresh"
        );
        Err(InvalidTokenReason::UnknownSigningKey {
            kid: kid.to_string(),
        }
        .into())
    }

    /// Fetch the account's JWKS and replace its cache entry.
    async fn refresh_cache(&self, email: &str) -> Result<(), LoginError> {
        if !is_account_hint(email) {
            return Err(InvalidTokenReason::UnknownServiceAccount(email.to_string()).into());
        }
        let url = endpoint_url(&self.jwk_base_url, &["service_accounts", "v1", "jwk", email])?;
        tracing::debug!(
            target: "gcp_auth.keys",
            account = %hash_for_correlation(email),
            "Fetching service account JWKS"
        );

        let response = self.http_client.get(url).send().await.map_err(|e| {
            tracing::error!(target: "gcp_auth.keys", error = %e.without_url(), "Failed to fetch JWKS");
            record_key_fetch("error");
            LoginError::UpstreamUnavailable("JWKS lookup failed".to_string())
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            record_key_fetch("success");
            return Err(InvalidTokenReason::UnknownServiceAccount(email.to_string()).into());
        }
        if !status.is_success() {
            tracing::error!(
                target: "gcp_auth.keys",
                status = %status,
                "JWKS endpoint returned error"
            );
            record_key_fetch("error");
            return Err(LoginError::UpstreamUnavailable(format!(
                "JWKS lookup returned {status}"
            )));
        }

        let jwks: JwksResponse = response.json().await.map_err(|e| {
            tracing::error!(target: "gcp_auth.keys", error = %e.without_url(), "Failed to parse JWKS response");
            record_key_fetch("error");
            LoginError::UpstreamUnavailable("JWKS lookup returned an invalid body".to_string())
        })?;
        record_key_fetch("success");

        let keys: HashMap<String, Jwk> = jwks
            .keys
            .into_iter()
            .map(|key| (key.kid.clone(), key))
            .collect();

        tracing::info!(
            target: "gcp_auth.keys",
            key_count = keys.len(),
            "JWKS cache refreshed"
        );

        let mut cache = self.cache.write().await;
        cache.insert(
            email.to_string(),
            CachedJwks {
                keys,
                expires_at: Instant::now() + self.cache_ttl,
            },
        );

        Ok(())
    }

    /// Drop every cached JWKS document.
    pub async fn clear_cache(&self) {
        self.cache.write().await.clear();
    }
}

/// Whether `hint` looks like a service account email or numeric unique id.
///
/// The hint comes from an unverified token, so anything that could change
/// the shape of a lookup URL is refused before a request is made.
fn is_account_hint(hint: &str) -> bool {
    if !hint.is_empty() && hint.bytes().all(|b| b.is_ascii_digit()) {
        return true;
    }
    let Some((local, domain)) = hint.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && local
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'+' | b'-'))
        && domain
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-'))
}

/// Append `segments` to `base`, each percent-encoded as a single segment.
fn endpoint_url(base: &str, segments: &[&str]) -> Result<reqwest::Url, LoginError> {
    let invalid = || LoginError::Config(format!("invalid key endpoint base URL \"{base}\""));
    let mut url = reqwest::Url::parse(base).map_err(|_| invalid())?;
    url.path_segments_mut()
        .map_err(|()| invalid())?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[async_trait]
impl SigningKeyResolver for IamKeyResolver {
    #[instrument(skip_all, fields(kid = %key_id))]
    async fn resolve(
        &self,
        service_account_hint: &str,
        key_id: &str,
    ) -> Result<ResolvedSigningKey, LoginError> {
        let service_account = self.fetch_service_account(service_account_hint).await?;
        let jwk = self.get_key(&service_account.email, key_id).await?;
        let public_key = jwk.to_public_key()?;

        Ok(ResolvedSigningKey {
            service_account,
            public_key,
        })
    }
}
