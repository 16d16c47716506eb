//! Builder patterns for test data construction
//!
//! Provides fluent APIs for signed login tokens, roles and services.

use crate::crypto_fixtures::TestSigningKey;
use crate::test_ids::*;
use gcp_auth::clock::FixedClock;
use gcp_auth::config::LoginConfig;
use gcp_auth::keys::mock::MockSigningKeyResolver;
use gcp_auth::keys::{ServiceAccount, SigningKeyResolver};
use gcp_auth::models::{Role, ServiceAccounts};
use gcp_auth::repositories::InMemoryRoleStore;
use gcp_auth::services::LoginService;
use jsonwebtoken::Algorithm;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;

/// Builder for signed service account tokens
///
/// Defaults: signed with the primary fixture key as RS256 under
/// `TEST_KEY_ID_1`, subject `TEST_SA_EMAIL`, audience `vault/testrole`,
/// issued at `TEST_NOW` and expiring 25 minutes later.
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new()
///     .for_role("dev")
///     .expires_in_minutes(20)
///     .build();
/// ```
pub struct TestTokenBuilder {
    key: TestSigningKey,
    algorithm: Algorithm,
    kid: Option<String>,
    sub: Option<String>,
    aud: Option<Value>,
    exp: Option<i64>,
    nbf: Option<i64>,
    iat: i64,
    now: i64,
}

impl TestTokenBuilder {
    /// Create a new token builder with defaults
    pub fn new() -> Self {
        Self {
            key: TestSigningKey::primary(),
            algorithm: Algorithm::RS256,
            kid: Some(TEST_KEY_ID_1.to_string()),
            sub: Some(TEST_SA_EMAIL.to_string()),
            aud: Some(json!(format!("vault/{TEST_ROLE_NAME}"))),
            exp: Some(TEST_NOW + 25 * 60),
            nbf: None,
            iat: TEST_NOW,
            now: TEST_NOW,
        }
    }

    /// Set the reference time used by `expires_in_minutes` and `iat`
    pub fn at(mut self, now: i64) -> Self {
        self.now = now;
        self.iat = now;
        self
    }

    /// Set the subject (service account email or unique id)
    pub fn for_subject(mut self, subject: &str) -> Self {
        self.sub = Some(subject.to_string());
        self
    }

    /// Set the audience to the default binding for `role`
    pub fn for_role(mut self, role: &str) -> Self {
        self.aud = Some(json!(format!("vault/{role}")));
        self
    }

    pub fn with_audience(mut self, audience: &str) -> Self {
        self.aud = Some(json!(audience));
        self
    }

    /// Set the audience as an array
    pub fn with_audiences(mut self, audiences: &[&str]) -> Self {
        self.aud = Some(json!(audiences));
        self
    }

    /// Set expiration in minutes from the reference time
    pub fn expires_in_minutes(mut self, minutes: i64) -> Self {
        self.exp = Some(self.now + minutes * 60);
        self
    }

    /// Set an absolute expiration timestamp
    pub fn expires_at(mut self, timestamp: i64) -> Self {
        self.exp = Some(timestamp);
        self
    }

    pub fn not_before(mut self, timestamp: i64) -> Self {
        self.nbf = Some(timestamp);
        self
    }

    pub fn without_subject(mut self) -> Self {
        self.sub = None;
        self
    }

    pub fn without_audience(mut self) -> Self {
        self.aud = None;
        self
    }

    pub fn without_expiration(mut self) -> Self {
        self.exp = None;
        self
    }

    /// Set the `kid` header
    pub fn with_kid(mut self, kid: &str) -> Self {
        self.kid = Some(kid.to_string());
        self
    }

    /// Omit the `kid` header (the request must then carry a key id)
    pub fn without_kid(mut self) -> Self {
        self.kid = None;
        self
    }

    /// Sign with a different fixture key
    pub fn signed_with(mut self, key: TestSigningKey) -> Self {
        self.key = key;
        self
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Build the claims as a JSON value
    pub fn claims(&self) -> Value {
        let mut claims = Map::new();
        if let Some(sub) = &self.sub {
            claims.insert("sub".to_string(), json!(sub));
        }
        if let Some(aud) = &self.aud {
            claims.insert("aud".to_string(), aud.clone());
        }
        if let Some(exp) = self.exp {
            claims.insert("exp".to_string(), json!(exp));
        }
        if let Some(nbf) = self.nbf {
            claims.insert("nbf".to_string(), json!(nbf));
        }
        claims.insert("iat".to_string(), json!(self.iat));
        Value::Object(claims)
    }

    /// Build the signed compact token
    pub fn build(self) -> String {
        let claims = self.claims();
        self.key.sign(self.algorithm, self.kid.as_deref(), &claims)
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The service account all default tokens are issued for.
pub fn test_service_account() -> ServiceAccount {
    ServiceAccount {
        email: TEST_SA_EMAIL.to_string(),
        unique_id: TEST_SA_UNIQUE_ID.to_string(),
        project_id: TEST_PROJECT_ID.to_string(),
    }
}

/// A second account in the same project.
pub fn other_service_account() -> ServiceAccount {
    ServiceAccount {
        email: TEST_OTHER_SA_EMAIL.to_string(),
        unique_id: TEST_OTHER_SA_UNIQUE_ID.to_string(),
        project_id: TEST_PROJECT_ID.to_string(),
    }
}

/// An account in a different project.
pub fn foreign_service_account() -> ServiceAccount {
    ServiceAccount {
        email: TEST_FOREIGN_SA_EMAIL.to_string(),
        unique_id: TEST_FOREIGN_SA_UNIQUE_ID.to_string(),
        project_id: TEST_OTHER_PROJECT_ID.to_string(),
    }
}

/// Mock resolver knowing the three test accounts, each with the primary key
/// under `TEST_KEY_ID_1`.
pub fn test_key_resolver() -> MockSigningKeyResolver {
    let key = TestSigningKey::primary().public_key();
    MockSigningKeyResolver::new()
        .with_key(test_service_account(), TEST_KEY_ID_1, key.clone())
        .with_key(other_service_account(), TEST_KEY_ID_1, key.clone())
        .with_key(foreign_service_account(), TEST_KEY_ID_1, key)
}

/// `testrole` as most scenarios configure it: the test account listed
/// explicitly, `dev` and `prod` policies and a 30 minute lease.
pub fn test_role() -> Role {
    Role::iam(TEST_ROLE_NAME, ServiceAccounts::explicit([TEST_SA_EMAIL]))
        .with_policies(["dev", "prod"])
        .with_ttl(Duration::from_secs(1800))
        .with_max_ttl(Duration::from_secs(1800))
}

/// Login service over in-memory roles, a fixed clock at `TEST_NOW` and the
/// given resolver.
pub fn test_login_service(
    roles: Vec<Role>,
    keys: Arc<dyn SigningKeyResolver>,
) -> (LoginService, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::new(TEST_NOW));
    let store = InMemoryRoleStore::with_roles(roles).expect("test roles must be valid");
    let service = LoginService::new(
        Arc::new(store),
        keys,
        clock.clone(),
        LoginConfig::default(),
    );
    (service, clock)
}
