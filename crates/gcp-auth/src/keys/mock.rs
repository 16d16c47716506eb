//! Mock signing key resolver for testing.

use crate::errors::{InvalidTokenReason, LoginError};
use crate::keys::{PublicKey, ResolvedSigningKey, ServiceAccount, SigningKeyResolver};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

struct MockAccount {
    account: ServiceAccount,
    keys: HashMap<String, PublicKey>,
}

/// Resolver serving fixed keys.
///
/// Accounts are matched by email or unique id, keys by `kid`, with the same
/// error mapping as the HTTP resolver.
#[derive(Default)]
pub struct MockSigningKeyResolver {
    accounts: Vec<MockAccount>,
    delay: Option<Duration>,
    return_error: bool,
    call_count: AtomicUsize,
}

impl MockSigningKeyResolver {
    /// Resolver that knows no accounts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key for `account`, creating the account on first use.
    pub fn with_key(
        mut self,
        account: ServiceAccount,
        kid: impl Into<String>,
        public_key: PublicKey,
    ) -> Self {
        let kid = kid.into();
        match self
            .accounts
            .iter_mut()
            .find(|a| a.account.email == account.email)
        {
            Some(existing) => {
                existing.keys.insert(kid, public_key);
            }
            None => self.accounts.push(MockAccount {
                account,
                keys: HashMap::from([(kid, public_key)]),
            }),
        }
        self
    }

    /// Resolver that always fails with `UpstreamUnavailable`.
    pub fn failing() -> Self {
        Self {
            return_error: true,
            ..Self::default()
        }
    }

    /// Sleep for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Get the number of calls made.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SigningKeyResolver for MockSigningKeyResolver {
    async fn resolve(
        &self,
        service_account_hint: &str,
        key_id: &str,
    ) -> Result<ResolvedSigningKey, LoginError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.return_error {
            return Err(LoginError::UpstreamUnavailable(
                "mock signing key resolver error".to_string(),
            ));
        }

        let entry = self
            .accounts
            .iter()
            .find(|a| {
                a.account.email == service_account_hint
                    || a.account.unique_id == service_account_hint
            })
            .ok_or_else(|| {
                InvalidTokenReason::UnknownServiceAccount(service_account_hint.to_string())
            })?;

        let public_key = entry
            .keys
            .get(key_id)
            .ok_or_else(|| InvalidTokenReason::UnknownSigningKey {
                kid: key_id.to_string(),
            })?;

        Ok(ResolvedSigningKey {
            service_account: entry.account.clone(),
            public_key: public_key.clone(),
        })
    }
}
