//! Time source for token expiration checks.
//!
//! The login path never reads ambient time. A [`Clock`] is passed to
//! [`LoginService`](crate::services::login_service::LoginService) at
//! construction so tests can pin "now" to build expired and boundary tokens.

use std::sync::atomic::{AtomicI64, Ordering};

/// Source of the current Unix time in seconds.
pub trait Clock: Send + Sync {
    fn now_timestamp(&self) -> i64;
}

/// Wall clock backed by `chrono::Utc::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_timestamp(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Clock pinned to a settable instant.
#[derive(Debug, Default)]
pub struct FixedClock {
    now: AtomicI64,
}

impl FixedClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: i64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now_timestamp(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}
