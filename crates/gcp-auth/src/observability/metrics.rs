//! Metrics definitions for the login path
//!
//! All metrics follow Prometheus naming conventions:
//! - `gcp_auth_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `status`: 2 values (success, error)
//! - `error_kind`: 8 values (the `LoginErrorKind` labels plus `none`)
//! - `result`: 2 values (hit, miss)
//!
//! Role names and service accounts are never used as labels.

use crate::errors::LoginErrorKind;
use metrics::{counter, histogram};
use std::time::Duration;

/// Record a login attempt and its duration
///
/// Metric: `gcp_auth_login_total`, `gcp_auth_login_duration_seconds`
/// Labels: `status`, `error_kind`
pub fn record_login(error_kind: Option<LoginErrorKind>, duration: Duration) {
    let status = if error_kind.is_some() { "error" } else { "success" };
    let kind = error_kind.map_or("none", |k| k.as_str());

    histogram!("gcp_auth_login_duration_seconds", "status" => status)
        .record(duration.as_secs_f64());

    counter!("gcp_auth_login_total", "status" => status, "error_kind" => kind).increment(1);
}

/// Record a signing key lookup over HTTP
///
/// Metric: `gcp_auth_key_fetch_total`
/// Labels: `status` (success, error)
pub fn record_key_fetch(status: &'static str) {
    counter!("gcp_auth_key_fetch_total", "status" => status).increment(1);
}

/// Record a JWKS cache lookup
///
/// Metric: `gcp_auth_jwks_cache_total`
/// Labels: `result` (hit, miss)
pub fn record_jwks_cache(result: &'static str) {
    counter!("gcp_auth_jwks_cache_total", "result" => result).increment(1);
}
