//! Data models for the login path: roles, verified identities, login
//! requests and the grants a successful login produces.

use crate::errors::RoleValidationError;
use common::secret::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;

/// Service account entry that matches any account in the role's project.
pub const WILDCARD_SERVICE_ACCOUNT: &str = "*";

/// Policy attached to every grant regardless of role configuration.
pub const DEFAULT_POLICY: &str = "default";

/// Grant metadata keys.
pub const METADATA_ROLE: &str = "role";
pub const METADATA_SERVICE_ACCOUNT_ID: &str = "service_account_id";
pub const METADATA_SERVICE_ACCOUNT_EMAIL: &str = "service_account_email";

/// Kind of identity assertion a role accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleType {
    /// Service account JWT signed through the IAM credentials API.
    Iam,
}

impl RoleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleType::Iam => "iam",
        }
    }
}

/// Service accounts a role admits.
///
/// Stored as a plain list of strings; `["*"]` means [`ServiceAccounts::Wildcard`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub enum ServiceAccounts {
    /// Any service account in the role's project.
    Wildcard,
    /// Exactly these emails or unique ids (case-sensitive).
    Explicit(BTreeSet<String>),
}

impl ServiceAccounts {
    pub fn explicit<I, S>(accounts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ServiceAccounts::Explicit(accounts.into_iter().map(Into::into).collect())
    }

    /// Parse a comma separated list as operators write it (`"a@x, b@y"` or `"*"`).
    pub fn parse(list: &str) -> Result<Self, RoleValidationError> {
        let entries: Vec<String> = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect();
        Self::try_from(entries)
    }
}

impl TryFrom<Vec<String>> for ServiceAccounts {
    type Error = RoleValidationError;

    fn try_from(entries: Vec<String>) -> Result<Self, Self::Error> {
        if entries.iter().any(|e| e.trim().is_empty()) {
            return Err(RoleValidationError::EmptyServiceAccount);
        }

        let has_wildcard = entries.iter().any(|e| e == WILDCARD_SERVICE_ACCOUNT);
        if has_wildcard {
            if entries.iter().any(|e| e != WILDCARD_SERVICE_ACCOUNT) {
                return Err(RoleValidationError::WildcardMixedWithExplicit);
            }
            return Ok(ServiceAccounts::Wildcard);
        }

        Ok(ServiceAccounts::Explicit(entries.into_iter().collect()))
    }
}

impl From<ServiceAccounts> for Vec<String> {
    fn from(accounts: ServiceAccounts) -> Self {
        match accounts {
            ServiceAccounts::Wildcard => vec![WILDCARD_SERVICE_ACCOUNT.to_string()],
            ServiceAccounts::Explicit(set) => set.into_iter().collect(),
        }
    }
}

/// Authorization policy for a class of callers.
///
/// Read-only to the login path; created and updated by role management.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,

    #[serde(rename = "type")]
    pub role_type: RoleType,

    /// Project the caller's service account must belong to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    pub service_accounts: ServiceAccounts,

    /// Policies granted on success. `default` is added at grant time.
    #[serde(default)]
    pub policies: BTreeSet<String>,

    #[serde(default, with = "duration_secs")]
    pub ttl: Duration,

    #[serde(default, with = "duration_secs")]
    pub max_ttl: Duration,

    #[serde(default, with = "duration_secs")]
    pub period: Duration,

    /// Upper bound on how far in the future a presented token may expire.
    /// `None` falls back to the configured default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_jwt_exp_minutes: Option<u32>,
}

impl Role {
    /// New `iam` role with no policies and zero lease durations.
    pub fn iam(name: impl Into<String>, service_accounts: ServiceAccounts) -> Self {
        Self {
            name: name.into(),
            role_type: RoleType::Iam,
            project_id: None,
            service_accounts,
            policies: BTreeSet::new(),
            ttl: Duration::ZERO,
            max_ttl: Duration::ZERO,
            period: Duration::ZERO,
            max_jwt_exp_minutes: None,
        }
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_policies<I, S>(mut self, policies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.policies = policies.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_max_ttl(mut self, max_ttl: Duration) -> Self {
        self.max_ttl = max_ttl;
        self
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn with_max_jwt_exp_minutes(mut self, minutes: u32) -> Self {
        self.max_jwt_exp_minutes = Some(minutes);
        self
    }

    /// The expiration window for this role in minutes.
    pub fn effective_max_jwt_exp_minutes(&self, default_minutes: u32) -> u32 {
        self.max_jwt_exp_minutes.unwrap_or(default_minutes)
    }

    /// Check the invariants role management must uphold.
    pub fn validate(&self) -> Result<(), RoleValidationError> {
        if self.name.trim().is_empty() {
            return Err(RoleValidationError::EmptyName);
        }
        if let Some(minutes) = self.max_jwt_exp_minutes {
            if minutes == 0 {
                return Err(RoleValidationError::NonPositiveMaxJwtExp(minutes));
            }
        }
        if let Some(project_id) = &self.project_id {
            if project_id.trim().is_empty() {
                return Err(RoleValidationError::EmptyProjectId);
            }
        }
        if let ServiceAccounts::Explicit(accounts) = &self.service_accounts {
            if accounts.iter().any(|a| a.trim().is_empty()) {
                return Err(RoleValidationError::EmptyServiceAccount);
            }
            if accounts.contains(WILDCARD_SERVICE_ACCOUNT) {
                return Err(RoleValidationError::WildcardMixedWithExplicit);
            }
        }
        Ok(())
    }
}

/// Caller identity, built only from a verified token and the resolved
/// service account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Provider unique id of the service account.
    pub service_account_id: String,
    pub service_account_email: String,
    pub project_id: String,
}

/// A login attempt.
///
/// The raw JWT is held as a [`SecretString`] so `Debug` never reveals it.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub role: String,

    pub jwt: SecretString,

    /// Signing key id to use when the token header carries none.
    #[serde(default, rename = "kid")]
    pub key_id: Option<String>,
}

impl LoginRequest {
    pub fn new(role: impl Into<String>, jwt: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            jwt: SecretString::from(jwt.into()),
            key_id: None,
        }
    }

    pub fn with_key_id(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = Some(key_id.into());
        self
    }
}

/// Output of a successful login.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct AuthGrant {
    pub policies: BTreeSet<String>,
    pub metadata: BTreeMap<String, String>,
    #[serde(with = "duration_secs")]
    pub ttl: Duration,
    #[serde(with = "duration_secs")]
    pub max_ttl: Duration,
    #[serde(with = "duration_secs")]
    pub period: Duration,
    pub renewable: bool,
    /// Canonical caller identity (service account unique id), used as the
    /// grant's alias.
    pub identity_name: String,
}

/// Custom Debug implementation that omits the service account email.
///
/// The email is correlatable personal data; the unique id is enough for
/// debugging.
impl fmt::Debug for AuthGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthGrant")
            .field("policies", &self.policies)
            .field("metadata_keys", &self.metadata.keys().collect::<Vec<_>>())
            .field("ttl", &self.ttl)
            .field("max_ttl", &self.max_ttl)
            .field("period", &self.period)
            .field("renewable", &self.renewable)
            .field("identity_name", &self.identity_name)
            .finish()
    }
}

/// Serde helpers for durations stored as whole seconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
