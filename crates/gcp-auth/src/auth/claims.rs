//! JWT claims structure.
//!
//! Every claim is optional at the parsing layer so that a missing claim is
//! reported as a specific validation failure instead of a JSON error. The
//! `sub` field is redacted in Debug output.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The `aud` claim, which issuers may write as a string or an array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Multiple(Vec<String>),
}

impl Audience {
    /// Exact, case-sensitive membership.
    pub fn contains(&self, expected: &str) -> bool {
        match self {
            Audience::Single(aud) => aud == expected,
            Audience::Multiple(auds) => auds.iter().any(|aud| aud == expected),
        }
    }
}

/// Claims of a service account identity token.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct GcpJwtClaims {
    /// Subject: the service account email or unique id. Redacted in Debug.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,

    /// Expiration timestamp (Unix epoch seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// Not-before timestamp (Unix epoch seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,

    /// Issued-at timestamp (Unix epoch seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

impl GcpJwtClaims {
    /// The subject, if present and non-empty.
    pub fn subject(&self) -> Option<&str> {
        self.sub.as_deref().filter(|s| !s.is_empty())
    }
}

/// Custom Debug implementation that redacts the `sub` field.
impl fmt::Debug for GcpJwtClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GcpJwtClaims")
            .field("sub", &self.sub.as_ref().map(|_| "[REDACTED]"))
            .field("aud", &self.aud)
            .field("exp", &self.exp)
            .field("nbf", &self.nbf)
            .field("iat", &self.iat)
            .field("iss", &self.iss)
            .finish()
    }
}
