//! Login configuration.
//!
//! Loaded from environment variables with defaults for everything, so an
//! embedder that sets nothing gets the provider's public endpoints and the
//! `vault/{role}` audience binding.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Placeholder substituted with the role name in the audience template.
pub const ROLE_PLACEHOLDER: &str = "{role}";

/// Default audience binding: tokens are minted for `vault/<role>`.
pub const DEFAULT_AUDIENCE_TEMPLATE: &str = "vault/{role}";

/// Default bound on how far in the future a token may expire, in minutes.
pub const DEFAULT_MAX_JWT_EXP_MINUTES: u32 = 30;

/// Default timeout for each external lookup in milliseconds.
pub const DEFAULT_LOOKUP_TIMEOUT_MS: u64 = 5000;

/// Maximum allowed lookup timeout in milliseconds.
pub const MAX_LOOKUP_TIMEOUT_MS: u64 = 60_000;

pub const DEFAULT_IAM_BASE_URL: &str = "https://iam.googleapis.com";
pub const DEFAULT_JWK_BASE_URL: &str = "https://www.googleapis.com";

/// Default JWKS cache TTL in seconds (5 minutes).
pub const DEFAULT_JWKS_CACHE_TTL_SECONDS: u64 = 300;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid audience template: {0}")]
    InvalidAudienceTemplate(String),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}

/// Per-role audience binding.
///
/// The expected audience for role `r` is the template with `{role}` replaced
/// by `r`, so a token minted for one role cannot be replayed against another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudienceTemplate(String);

impl AudienceTemplate {
    pub fn new(template: impl Into<String>) -> Result<Self, ConfigError> {
        let template = template.into();
        match template.matches(ROLE_PLACEHOLDER).count() {
            1 => Ok(Self(template)),
            0 => Err(ConfigError::InvalidAudienceTemplate(format!(
                "must contain the {ROLE_PLACEHOLDER} placeholder"
            ))),
            _ => Err(ConfigError::InvalidAudienceTemplate(format!(
                "must contain the {ROLE_PLACEHOLDER} placeholder exactly once"
            ))),
        }
    }

    /// Expected audience for `role_name`.
    pub fn audience_for(&self, role_name: &str) -> String {
        self.0.replace(ROLE_PLACEHOLDER, role_name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for AudienceTemplate {
    fn default() -> Self {
        Self(DEFAULT_AUDIENCE_TEMPLATE.to_string())
    }
}

impl fmt::Display for AudienceTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct LoginConfig {
    pub audience_template: AudienceTemplate,

    /// Used when a role leaves `max_jwt_exp_minutes` unset.
    pub default_max_jwt_exp_minutes: u32,

    /// Bound applied to each role store and signing key lookup.
    pub lookup_timeout: Duration,

    /// Base URL of the IAM service account API.
    pub iam_base_url: String,

    /// Base URL serving per-account JWKS documents.
    pub jwk_base_url: String,

    pub jwks_cache_ttl: Duration,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            audience_template: AudienceTemplate::default(),
            default_max_jwt_exp_minutes: DEFAULT_MAX_JWT_EXP_MINUTES,
            lookup_timeout: Duration::from_millis(DEFAULT_LOOKUP_TIMEOUT_MS),
            iam_base_url: DEFAULT_IAM_BASE_URL.to_string(),
            jwk_base_url: DEFAULT_JWK_BASE_URL.to_string(),
            jwks_cache_ttl: Duration::from_secs(DEFAULT_JWKS_CACHE_TTL_SECONDS),
        }
    }
}

impl LoginConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing)
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let audience_template = match vars.get("GCP_AUTH_AUDIENCE_TEMPLATE") {
            Some(template) => AudienceTemplate::new(template.as_str())?,
            None => AudienceTemplate::default(),
        };

        let default_max_jwt_exp_minutes = parse_or_default(
            vars,
            "GCP_AUTH_DEFAULT_MAX_JWT_EXP_MINUTES",
            DEFAULT_MAX_JWT_EXP_MINUTES,
        )?;
        if default_max_jwt_exp_minutes == 0 {
            return Err(ConfigError::InvalidValue {
                name: "GCP_AUTH_DEFAULT_MAX_JWT_EXP_MINUTES".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        let lookup_timeout_ms = parse_or_default(
            vars,
            "GCP_AUTH_LOOKUP_TIMEOUT_MS",
            DEFAULT_LOOKUP_TIMEOUT_MS,
        )?;
        if !(1..=MAX_LOOKUP_TIMEOUT_MS).contains(&lookup_timeout_ms) {
            return Err(ConfigError::InvalidValue {
                name: "GCP_AUTH_LOOKUP_TIMEOUT_MS".to_string(),
                reason: format!("must be between 1 and {MAX_LOOKUP_TIMEOUT_MS}"),
            });
        }

        let iam_base_url = base_url(vars, "GCP_AUTH_IAM_BASE_URL", DEFAULT_IAM_BASE_URL)?;
        let jwk_base_url = base_url(vars, "GCP_AUTH_JWK_BASE_URL", DEFAULT_JWK_BASE_URL)?;

        let jwks_cache_ttl_seconds = parse_or_default(
            vars,
            "GCP_AUTH_JWKS_CACHE_TTL_SECONDS",
            DEFAULT_JWKS_CACHE_TTL_SECONDS,
        )?;

        Ok(LoginConfig {
            audience_template,
            default_max_jwt_exp_minutes,
            lookup_timeout: Duration::from_millis(lookup_timeout_ms),
            iam_base_url,
            jwk_base_url,
            jwks_cache_ttl: Duration::from_secs(jwks_cache_ttl_seconds),
        })
    }
}

fn parse_or_default<T>(
    vars: &HashMap<String, String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match vars.get(name) {
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            name: name.to_string(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn base_url(
    vars: &HashMap<String, String>,
    name: &str,
    default: &str,
) -> Result<String, ConfigError> {
    let value = vars.get(name).map_or(default, String::as_str);
    if !(value.starts_with("http://") || value.starts_with("https://")) {
        return Err(ConfigError::InvalidValue {
            name: name.to_string(),
            reason: "must be an http(s) URL".to_string(),
        });
    }
    Ok(value.trim_end_matches('/').to_string())
}
