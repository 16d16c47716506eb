//! End-to-end login tests against the mock signing key resolver
//!
//! Tokens are really signed with the fixture RSA keys and verified by the
//! login service; only key lookup is mocked.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use gcp_auth::clock::FixedClock;
use gcp_auth::config::{AudienceTemplate, LoginConfig};
use gcp_auth::errors::{InvalidTokenReason, LoginError, LoginErrorKind};
use gcp_auth::models::{LoginRequest, Role, ServiceAccounts};
use gcp_auth::repositories::InMemoryRoleStore;
use gcp_auth::services::LoginService;
use gcp_auth_test_utils::*;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use std::sync::Arc;

// ============================================================================
// Helper Functions
// ============================================================================

fn default_service() -> (LoginService, Arc<FixedClock>) {
    test_login_service(vec![test_role()], Arc::new(test_key_resolver()))
}

fn wildcard_role(name: &str) -> Role {
    Role::iam(name, ServiceAccounts::Wildcard).with_project_id(TEST_PROJECT_ID)
}

// ============================================================================
// Successful Logins
// ============================================================================

/// Role with an explicit account, token expiring 5 minutes inside the
/// default window.
#[tokio::test]
async fn test_login_success_explicit_service_account() -> Result<(), anyhow::Error> {
    let (service, _clock) = default_service();
    let token = TestTokenBuilder::new().expires_in_minutes(30 - 5).build();

    let grant = service.login_with(TEST_ROLE_NAME, &token).await?;

    grant
        .assert_policies(&["default", "dev", "prod"])
        .assert_ttl_secs(1800)
        .assert_max_ttl_secs(1800)
        .assert_renewable()
        .assert_identity(TEST_SA_UNIQUE_ID)
        .assert_metadata("role", TEST_ROLE_NAME)
        .assert_metadata("service_account_id", TEST_SA_UNIQUE_ID)
        .assert_metadata("service_account_email", TEST_SA_EMAIL);

    Ok(())
}

#[tokio::test]
async fn test_login_success_subject_is_unique_id() -> Result<(), anyhow::Error> {
    let (service, _clock) = default_service();
    let token = TestTokenBuilder::new()
        .for_subject(TEST_SA_UNIQUE_ID)
        .build();

    let grant = service.login_with(TEST_ROLE_NAME, &token).await?;

    grant
        .assert_identity(TEST_SA_UNIQUE_ID)
        .assert_metadata("service_account_email", TEST_SA_EMAIL);
    Ok(())
}

#[tokio::test]
async fn test_login_success_role_lists_unique_id() -> Result<(), anyhow::Error> {
    let role = Role::iam(TEST_ROLE_NAME, ServiceAccounts::explicit([TEST_SA_UNIQUE_ID]));
    let (service, _clock) = test_login_service(vec![role], Arc::new(test_key_resolver()));

    let grant = service
        .login_with(TEST_ROLE_NAME, &TestTokenBuilder::new().build())
        .await?;

    grant.assert_policies(&["default"]);
    Ok(())
}

#[tokio::test]
async fn test_wildcard_role_admits_any_account_in_project() -> Result<(), anyhow::Error> {
    let role = wildcard_role("wildrole").with_policies(["reader"]);
    let (service, _clock) = test_login_service(vec![role], Arc::new(test_key_resolver()));

    for subject in [TEST_SA_EMAIL, TEST_OTHER_SA_EMAIL] {
        let token = TestTokenBuilder::new()
            .for_subject(subject)
            .for_role("wildrole")
            .build();

        let grant = service.login_with("wildrole", &token).await?;
        grant
            .assert_policies(&["default", "reader"])
            .assert_metadata("service_account_email", subject);
    }
    Ok(())
}

#[tokio::test]
async fn test_wildcard_role_without_policies_grants_default_only() -> Result<(), anyhow::Error> {
    let (service, _clock) =
        test_login_service(vec![wildcard_role("wildrole")], Arc::new(test_key_resolver()));
    let token = TestTokenBuilder::new().for_role("wildrole").build();

    let grant = service.login_with("wildrole", &token).await?;

    grant.assert_policies(&["default"]);
    Ok(())
}

#[tokio::test]
async fn test_login_with_audience_array() -> Result<(), anyhow::Error> {
    let (service, _clock) = default_service();
    let token = TestTokenBuilder::new()
        .with_audiences(&["https://example.com", "vault/testrole"])
        .build();

    service.login_with(TEST_ROLE_NAME, &token).await?;
    Ok(())
}

#[tokio::test]
async fn test_login_with_requested_key_id() -> Result<(), anyhow::Error> {
    let (service, _clock) = default_service();
    let token = TestTokenBuilder::new().without_kid().build();
    let request = LoginRequest::new(TEST_ROLE_NAME, token).with_key_id(TEST_KEY_ID_1);

    service.login(&request).await?;
    Ok(())
}

#[tokio::test]
async fn test_login_without_any_key_id_is_malformed() {
    let (service, _clock) = default_service();
    let token = TestTokenBuilder::new().without_kid().build();

    let err = service
        .login_with(TEST_ROLE_NAME, &token)
        .await
        .assert_error_kind(LoginErrorKind::MalformedToken);

    assert_eq!(err, LoginError::MalformedToken("missing key id".to_string()));
}

#[tokio::test]
async fn test_login_accepts_rs384_and_rs512() -> Result<(), anyhow::Error> {
    let (service, _clock) = default_service();

    for algorithm in [Algorithm::RS384, Algorithm::RS512] {
        let token = TestTokenBuilder::new().with_algorithm(algorithm).build();
        service.login_with(TEST_ROLE_NAME, &token).await?;
    }
    Ok(())
}

#[tokio::test]
async fn test_login_with_pem_public_key() -> Result<(), anyhow::Error> {
    let resolver = gcp_auth::keys::mock::MockSigningKeyResolver::new().with_key(
        test_service_account(),
        TEST_KEY_ID_1,
        TestSigningKey::primary().public_key_pem(),
    );
    let (service, _clock) = test_login_service(vec![test_role()], Arc::new(resolver));

    service
        .login_with(TEST_ROLE_NAME, &TestTokenBuilder::new().build())
        .await?;
    Ok(())
}

#[tokio::test]
async fn test_login_with_rotated_key() -> Result<(), anyhow::Error> {
    let resolver = test_key_resolver().with_key(
        test_service_account(),
        TEST_KEY_ID_2,
        TestSigningKey::secondary().public_key(),
    );
    let (service, _clock) = test_login_service(vec![test_role()], Arc::new(resolver));

    let old = TestTokenBuilder::new().build();
    let new = TestTokenBuilder::new()
        .signed_with(TestSigningKey::secondary())
        .with_kid(TEST_KEY_ID_2)
        .build();

    service.login_with(TEST_ROLE_NAME, &old).await?;
    service.login_with(TEST_ROLE_NAME, &new).await?;
    Ok(())
}

#[tokio::test]
async fn test_custom_audience_template() -> Result<(), anyhow::Error> {
    let config = LoginConfig {
        audience_template: AudienceTemplate::new("https://vault.example.com/roles/{role}")?,
        ..LoginConfig::default()
    };
    let service = LoginService::new(
        Arc::new(InMemoryRoleStore::with_roles([test_role()])?),
        Arc::new(test_key_resolver()),
        Arc::new(FixedClock::new(TEST_NOW)),
        config,
    );

    let token = TestTokenBuilder::new()
        .with_audience("https://vault.example.com/roles/testrole")
        .build();
    service.login_with(TEST_ROLE_NAME, &token).await?;

    let default_binding = TestTokenBuilder::new().build();
    service
        .login_with(TEST_ROLE_NAME, &default_binding)
        .await
        .assert_error_kind(LoginErrorKind::InvalidToken);
    Ok(())
}

/// Same token and role twice yields the same grant.
#[tokio::test]
async fn test_login_is_idempotent() -> Result<(), anyhow::Error> {
    let (service, _clock) = default_service();
    let token = TestTokenBuilder::new().build();

    let first = service.login_with(TEST_ROLE_NAME, &token).await?;
    let second = service.login_with(TEST_ROLE_NAME, &token).await?;

    assert_eq!(first, second);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_logins() -> Result<(), anyhow::Error> {
    let (service, _clock) = default_service();
    let service = Arc::new(service);
    let token = TestTokenBuilder::new().build();

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let service = Arc::clone(&service);
            let token = token.clone();
            tokio::spawn(async move { service.login_with(TEST_ROLE_NAME, &token).await })
        })
        .collect();

    let mut grants = Vec::new();
    for handle in handles {
        grants.push(handle.await??);
    }

    assert!(grants.windows(2).all(|pair| pair[0] == pair[1]));
    Ok(())
}

// ============================================================================
// Request and Role Errors
// ============================================================================

#[tokio::test]
async fn test_role_is_required() {
    let (service, _clock) = default_service();

    let err = service
        .login_with("", &TestTokenBuilder::new().build())
        .await
        .assert_error_kind(LoginErrorKind::Config);

    assert_eq!(err.to_string(), "role is required");
}

#[tokio::test]
async fn test_unknown_role() {
    let (service, _clock) = default_service();

    let err = service
        .login_with("doesnotexist", &TestTokenBuilder::new().build())
        .await
        .assert_error_kind(LoginErrorKind::NotFound);

    assert!(err.to_string().contains("doesnotexist"));
    assert!(err.to_string().contains("not found"));
}

// ============================================================================
// Token Errors
// ============================================================================

/// Token minted for a different role cannot be replayed.
#[tokio::test]
async fn test_audience_for_other_role_rejected() {
    let (service, _clock) = default_service();
    let token = TestTokenBuilder::new().for_role(TEST_OTHER_ROLE_NAME).build();

    let err = service
        .login_with(TEST_ROLE_NAME, &token)
        .await
        .assert_error_kind(LoginErrorKind::InvalidToken);

    assert_eq!(
        err,
        LoginError::InvalidToken(InvalidTokenReason::AudienceMismatch {
            expected: "vault/testrole".to_string()
        })
    );
    assert!(err.to_string().starts_with("invalid JWT:"));
}

#[tokio::test]
async fn test_missing_audience_rejected() {
    let (service, _clock) = default_service();
    let token = TestTokenBuilder::new().without_audience().build();

    service
        .login_with(TEST_ROLE_NAME, &token)
        .await
        .assert_error_kind(LoginErrorKind::InvalidToken);
}

#[tokio::test]
async fn test_expired_token_rejected() {
    let (service, _clock) = default_service();
    let token = TestTokenBuilder::new().expires_at(TEST_NOW - 60).build();

    let err = service
        .login_with(TEST_ROLE_NAME, &token)
        .await
        .assert_error_kind(LoginErrorKind::ExpiredToken);

    assert!(err.to_string().contains("invalid JWT"));
    assert!(err.to_string().contains("token is expired"));
}

#[tokio::test]
async fn test_token_expires_as_clock_advances() -> Result<(), anyhow::Error> {
    let (service, clock) = default_service();
    let token = TestTokenBuilder::new().expires_in_minutes(10).build();

    service.login_with(TEST_ROLE_NAME, &token).await?;

    clock.advance(10 * 60);
    service
        .login_with(TEST_ROLE_NAME, &token)
        .await
        .assert_error_kind(LoginErrorKind::ExpiredToken);
    Ok(())
}

#[tokio::test]
async fn test_expired_regardless_of_role_window() {
    let role = test_role().with_max_jwt_exp_minutes(24 * 60);
    let (service, _clock) = test_login_service(vec![role], Arc::new(test_key_resolver()));
    let token = TestTokenBuilder::new().expires_at(TEST_NOW - 1).build();

    service
        .login_with(TEST_ROLE_NAME, &token)
        .await
        .assert_error_kind(LoginErrorKind::ExpiredToken);
}

#[tokio::test]
async fn test_token_beyond_default_window_rejected() {
    let (service, _clock) = default_service();
    let token = TestTokenBuilder::new().expires_in_minutes(31).build();

    let err = service
        .login_with(TEST_ROLE_NAME, &token)
        .await
        .assert_error_kind(LoginErrorKind::InvalidToken);

    assert_eq!(
        err,
        LoginError::InvalidToken(InvalidTokenReason::ExpiresTooLate { max_minutes: 30 })
    );
}

/// Role window of 40 minutes: 60 is rejected naming the window, 20 passes.
#[tokio::test]
async fn test_role_max_jwt_exp_window() -> Result<(), anyhow::Error> {
    let role = test_role().with_max_jwt_exp_minutes(40);
    let (service, _clock) = test_login_service(vec![role], Arc::new(test_key_resolver()));

    let too_late = TestTokenBuilder::new().expires_in_minutes(60).build();
    let err = service
        .login_with(TEST_ROLE_NAME, &too_late)
        .await
        .assert_error_kind(LoginErrorKind::InvalidToken);
    assert!(err.to_string().contains("expire within"));
    assert!(err.to_string().contains("40"));

    let within = TestTokenBuilder::new().expires_in_minutes(20).build();
    service.login_with(TEST_ROLE_NAME, &within).await?;
    Ok(())
}

#[tokio::test]
async fn test_missing_expiration_rejected() {
    let (service, _clock) = default_service();
    let token = TestTokenBuilder::new().without_expiration().build();

    let err = service
        .login_with(TEST_ROLE_NAME, &token)
        .await
        .assert_error_kind(LoginErrorKind::InvalidToken);

    assert_eq!(
        err,
        LoginError::InvalidToken(InvalidTokenReason::MissingExpiration)
    );
}

#[tokio::test]
async fn test_missing_subject_rejected() {
    let (service, _clock) = default_service();
    let token = TestTokenBuilder::new().without_subject().build();

    let err = service
        .login_with(TEST_ROLE_NAME, &token)
        .await
        .assert_error_kind(LoginErrorKind::InvalidToken);

    assert_eq!(err, LoginError::InvalidToken(InvalidTokenReason::MissingSubject));
}

#[tokio::test]
async fn test_not_yet_valid_rejected() {
    let (service, _clock) = default_service();
    let token = TestTokenBuilder::new().not_before(TEST_NOW + 120).build();

    let err = service
        .login_with(TEST_ROLE_NAME, &token)
        .await
        .assert_error_kind(LoginErrorKind::InvalidToken);

    assert_eq!(err, LoginError::InvalidToken(InvalidTokenReason::NotYetValid));
}

#[tokio::test]
async fn test_wrong_signing_key_rejected() {
    let (service, _clock) = default_service();
    let token = TestTokenBuilder::new()
        .signed_with(TestSigningKey::secondary())
        .build();

    let err = service
        .login_with(TEST_ROLE_NAME, &token)
        .await
        .assert_error_kind(LoginErrorKind::InvalidToken);

    assert_eq!(err, LoginError::InvalidToken(InvalidTokenReason::BadSignature));
}

#[tokio::test]
async fn test_tampered_claims_rejected() {
    let (service, _clock) = default_service();
    let token = TestTokenBuilder::new().build();
    let forged_claims = URL_SAFE_NO_PAD.encode(
        TestTokenBuilder::new()
            .expires_in_minutes(29)
            .claims()
            .to_string(),
    );
    let mut parts = token.split('.');
    let tampered = format!(
        "{}.{}.{}",
        parts.next().unwrap_or_default(),
        forged_claims,
        parts.nth(1).unwrap_or_default()
    );

    let err = service
        .login_with(TEST_ROLE_NAME, &tampered)
        .await
        .assert_error_kind(LoginErrorKind::InvalidToken);

    assert_eq!(err, LoginError::InvalidToken(InvalidTokenReason::BadSignature));
}

#[tokio::test]
async fn test_unsigned_token_rejected() {
    let (service, _clock) = default_service();
    let header = URL_SAFE_NO_PAD.encode(format!(r#"{{"alg":"none","kid":"{TEST_KEY_ID_1}"}}"#));
    let claims = URL_SAFE_NO_PAD.encode(TestTokenBuilder::new().claims().to_string());
    let token = format!("{header}.{claims}.");

    let err = service
        .login_with(TEST_ROLE_NAME, &token)
        .await
        .assert_error_kind(LoginErrorKind::InvalidToken);

    assert_eq!(
        err,
        LoginError::InvalidToken(InvalidTokenReason::UnsupportedAlgorithm(
            "none".to_string()
        ))
    );
}

#[tokio::test]
async fn test_hmac_token_rejected() -> Result<(), anyhow::Error> {
    let (service, _clock) = default_service();
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(TEST_KEY_ID_1.to_string());
    let token = jsonwebtoken::encode(
        &header,
        &TestTokenBuilder::new().claims(),
        &EncodingKey::from_secret(b"shared-secret"),
    )?;

    service
        .login_with(TEST_ROLE_NAME, &token)
        .await
        .assert_error_kind(LoginErrorKind::InvalidToken);
    Ok(())
}

#[tokio::test]
async fn test_garbage_token_is_malformed() {
    let (service, _clock) = default_service();

    for token in ["", "garbage", "a.b.c", "a.b.c.d"] {
        service
            .login_with(TEST_ROLE_NAME, token)
            .await
            .assert_error_kind(LoginErrorKind::MalformedToken);
    }
}

#[tokio::test]
async fn test_unknown_service_account_rejected() {
    let (service, _clock) = default_service();
    let token = TestTokenBuilder::new()
        .for_subject("stranger@test-project.iam.gserviceaccount.com")
        .build();

    let err = service
        .login_with(TEST_ROLE_NAME, &token)
        .await
        .assert_error_kind(LoginErrorKind::InvalidToken);

    assert!(matches!(
        err,
        LoginError::InvalidToken(InvalidTokenReason::UnknownServiceAccount(_))
    ));
}

// ============================================================================
// Authorization Errors
// ============================================================================

#[tokio::test]
async fn test_account_not_in_role_is_unauthorized() {
    let (service, _clock) = default_service();
    let token = TestTokenBuilder::new()
        .for_subject(TEST_OTHER_SA_EMAIL)
        .build();

    let err = service
        .login_with(TEST_ROLE_NAME, &token)
        .await
        .assert_error_kind(LoginErrorKind::Unauthorized);

    assert_eq!(
        err,
        LoginError::Unauthorized {
            email: TEST_OTHER_SA_EMAIL.to_string(),
            id: TEST_OTHER_SA_UNIQUE_ID.to_string(),
            role: TEST_ROLE_NAME.to_string(),
        }
    );
    let message = err.to_string();
    assert!(message.contains(TEST_OTHER_SA_EMAIL));
    assert!(message.contains(TEST_OTHER_SA_UNIQUE_ID));
    assert!(message.contains("is not authorized for role"));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_wildcard_role_rejects_other_project() {
    let (service, _clock) =
        test_login_service(vec![wildcard_role("wildrole")], Arc::new(test_key_resolver()));
    let token = TestTokenBuilder::new()
        .for_subject(TEST_FOREIGN_SA_EMAIL)
        .for_role("wildrole")
        .build();

    let err = service
        .login_with("wildrole", &token)
        .await
        .assert_error_kind(LoginErrorKind::Unauthorized);

    assert!(err.to_string().contains(TEST_FOREIGN_SA_EMAIL));
}

#[tokio::test]
async fn test_empty_service_accounts_admit_no_one() {
    let role = Role::iam(TEST_ROLE_NAME, ServiceAccounts::explicit(Vec::<String>::new()));
    let (service, _clock) = test_login_service(vec![role], Arc::new(test_key_resolver()));

    service
        .login_with(TEST_ROLE_NAME, &TestTokenBuilder::new().build())
        .await
        .assert_error_kind(LoginErrorKind::Unauthorized);
}
