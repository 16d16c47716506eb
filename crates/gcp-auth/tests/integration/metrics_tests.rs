//! Login metrics tests
//!
//! Each test installs a thread-local `DebuggingRecorder` and drives the login
//! service on a current-thread runtime so every metric lands in it.

use gcp_auth_test_utils::*;
use metrics::{SharedString, Unit};
use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use metrics_util::CompositeKey;
use std::future::Future;
use std::sync::Arc;

type Snapshot = Vec<(CompositeKey, Option<Unit>, Option<SharedString>, DebugValue)>;

// ============================================================================
// Helper Functions
// ============================================================================

/// Run `fut` with a local recorder and return everything it recorded.
///
/// Taking a snapshot drains histograms, so it is taken exactly once.
fn with_recorder<F: Future>(fut: F) -> Result<(F::Output, Snapshot), anyhow::Error> {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let output = metrics::with_local_recorder(&recorder, || runtime.block_on(fut));
    Ok((output, snapshotter.snapshot().into_vec()))
}

/// Value of the counter `name` carrying every label in `labels`.
fn counter_value(snapshot: &Snapshot, name: &str, labels: &[(&str, &str)]) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| {
            let key = key.key();
            key.name() == name
                && labels.iter().all(|(k, v)| {
                    key.labels()
                        .any(|label| label.key() == *k && label.value() == *v)
                })
        })
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(count) => *count,
            _ => 0,
        })
        .sum()
}

fn histogram_samples(snapshot: &Snapshot, name: &str) -> usize {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| key.key().name() == name)
        .map(|(_, _, _, value)| match value {
            DebugValue::Histogram(samples) => samples.len(),
            _ => 0,
        })
        .sum()
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_successful_login_recorded() -> Result<(), anyhow::Error> {
    let (result, snapshot) = with_recorder(async {
        let (service, _clock) =
            test_login_service(vec![test_role()], Arc::new(test_key_resolver()));
        service
            .login_with(TEST_ROLE_NAME, &TestTokenBuilder::new().build())
            .await
    })?;
    result?;

    assert_eq!(
        counter_value(
            &snapshot,
            "gcp_auth_login_total",
            &[("status", "success"), ("error_kind", "none")]
        ),
        1
    );
    assert_eq!(
        histogram_samples(&snapshot, "gcp_auth_login_duration_seconds"),
        1
    );
    Ok(())
}

#[test]
fn test_failed_logins_recorded_by_kind() -> Result<(), anyhow::Error> {
    let ((), snapshot) = with_recorder(async {
        let (service, _clock) =
            test_login_service(vec![test_role()], Arc::new(test_key_resolver()));

        let expired = TestTokenBuilder::new().expires_at(TEST_NOW - 1).build();
        let _ = service.login_with(TEST_ROLE_NAME, &expired).await;
        let _ = service.login_with(TEST_ROLE_NAME, &expired).await;
        let _ = service.login_with("doesnotexist", &expired).await;
    })?;

    assert_eq!(
        counter_value(
            &snapshot,
            "gcp_auth_login_total",
            &[("status", "error"), ("error_kind", "expired_token")]
        ),
        2
    );
    assert_eq!(
        counter_value(
            &snapshot,
            "gcp_auth_login_total",
            &[("status", "error"), ("error_kind", "not_found")]
        ),
        1
    );
    assert_eq!(
        counter_value(
            &snapshot,
            "gcp_auth_login_total",
            &[("status", "success")]
        ),
        0
    );
    Ok(())
}

#[test]
fn test_role_and_account_never_used_as_labels() -> Result<(), anyhow::Error> {
    let (result, snapshot) = with_recorder(async {
        let (service, _clock) =
            test_login_service(vec![test_role()], Arc::new(test_key_resolver()));
        service
            .login_with(TEST_ROLE_NAME, &TestTokenBuilder::new().build())
            .await
    })?;
    result?;

    for (key, _, _, _) in &snapshot {
        for label in key.key().labels() {
            assert_ne!(label.value(), TEST_ROLE_NAME);
            assert_ne!(label.value(), TEST_SA_EMAIL);
            assert_ne!(label.value(), TEST_SA_UNIQUE_ID);
        }
    }
    Ok(())
}
