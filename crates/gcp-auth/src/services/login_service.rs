//! Login orchestration.
//!
//! [`LoginService`] sequences role lookup, signing key resolution, token
//! verification, authorization and grant building. It holds no mutable state;
//! concurrent logins share only the injected collaborators.

use crate::auth::authorization::is_authorized;
use crate::auth::jwt::{parse_unverified, validate_claims, verify_signature};
use crate::clock::Clock;
use crate::config::LoginConfig;
use crate::errors::LoginError;
use crate::keys::SigningKeyResolver;
use crate::models::{AuthGrant, Identity, LoginRequest};
use crate::observability::{hash_for_correlation, redacted_error};
use crate::observability::metrics::record_login;
use crate::repositories::RoleStore;
use crate::services::grant_builder::build_grant;
use common::secret::ExposeSecret;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

pub struct LoginService {
    roles: Arc<dyn RoleStore>,
    keys: Arc<dyn SigningKeyResolver>,
    clock: Arc<dyn Clock>,
    config: LoginConfig,
}

impl LoginService {
    pub fn new(
        roles: Arc<dyn RoleStore>,
        keys: Arc<dyn SigningKeyResolver>,
        clock: Arc<dyn Clock>,
        config: LoginConfig,
    ) -> Self {
        Self {
            roles,
            keys,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &LoginConfig {
        &self.config
    }

    /// Verify a login request and issue a grant.
    ///
    /// # Errors
    ///
    /// Every failure is a classified [`LoginError`]; only
    /// `UpstreamUnavailable` is worth retrying.
    #[instrument(skip_all, fields(role = %request.role))]
    pub async fn login(&self, request: &LoginRequest) -> Result<AuthGrant, LoginError> {
        let start = Instant::now();
        let result = self.authenticate(request).await;
        record_login(result.as_ref().err().map(LoginError::kind), start.elapsed());

        match &result {
            Ok(grant) => {
                tracing::info!(
                    target: "gcp_auth.login",
                    role = %request.role,
                    service_account_id = %grant.identity_name,
                    "Login succeeded"
                );
            }
            Err(e) if e.is_retryable() => {
                tracing::warn!(
                    target: "gcp_auth.login",
                    role = %request.role,
                    error_kind = e.kind().as_str(),
                    error = %redacted_error(e),
                    "Login failed on upstream lookup"
                );
            }
            Err(e) => {
                tracing::debug!(
                    target: "gcp_auth.login",
                    role = %request.role,
                    error_kind = e.kind().as_str(),
                    error = %redacted_error(e),
                    "Login rejected"
                );
            }
        }

        result
    }

    /// Convenience wrapper for callers holding the raw role name and token.
    pub async fn login_with(&self, role: &str, raw_jwt: &str) -> Result<AuthGrant, LoginError> {
        self.login(&LoginRequest::new(role, raw_jwt)).await
    }

    async fn authenticate(&self, request: &LoginRequest) -> Result<AuthGrant, LoginError> {
        if request.role.trim().is_empty() {
            return Err(LoginError::Config("role is required".to_string()));
        }

        let role = self
            .bounded("role store lookup", self.roles.get(&request.role))
            .await?
            .ok_or_else(|| LoginError::NotFound {
                role: request.role.clone(),
            })?;

        let token = request.jwt.expose_secret();
        let unverified = parse_unverified(token, request.key_id.as_deref())?;
        let expected_audience = self.config.audience_template.audience_for(&role.name);

        let resolved = self
            .bounded(
                "signing key lookup",
                self.keys.resolve(&unverified.subject, &unverified.key_id),
            )
            .await?;
        let decoding_key = resolved.public_key.to_decoding_key()?;
        let claims = verify_signature(token, unverified.algorithm, &decoding_key)?;

        let now = self.clock.now_timestamp();
        let max_minutes =
            role.effective_max_jwt_exp_minutes(self.config.default_max_jwt_exp_minutes);
        validate_claims(
            &claims,
            &expected_audience,
            &resolved.service_account,
            now,
            max_minutes,
        )?;

        let identity = Identity {
            service_account_id: resolved.service_account.unique_id,
            service_account_email: resolved.service_account.email,
            project_id: resolved.service_account.project_id,
        };

        if !is_authorized(&role, &identity) {
            tracing::debug!(
                target: "gcp_auth.login",
                role = %role.name,
                account = %hash_for_correlation(&identity.service_account_email),
                "Service account not allowed by role"
            );
            return Err(LoginError::Unauthorized {
                email: identity.service_account_email,
                id: identity.service_account_id,
                role: role.name,
            });
        }

        Ok(build_grant(&role, &identity))
    }

    /// Run an external lookup under the configured timeout.
    async fn bounded<T>(
        &self,
        what: &'static str,
        lookup: impl Future<Output = Result<T, LoginError>>,
    ) -> Result<T, LoginError> {
        match tokio::time::timeout(self.config.lookup_timeout, lookup).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    target: "gcp_auth.login",
                    lookup = what,
                    timeout_ms = self.config.lookup_timeout.as_millis() as u64,
                    "External lookup timed out"
                );
                Err(LoginError::UpstreamUnavailable(format!("{what} timed out")))
            }
        }
    }
}
