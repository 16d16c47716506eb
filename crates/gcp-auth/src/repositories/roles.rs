//! Role lookup.
//!
//! The login path only reads roles. Storage and role CRUD belong to the
//! embedder; [`InMemoryRoleStore`] covers tests and embedders that load
//! roles from static configuration.

use crate::errors::{LoginError, RoleValidationError};
use crate::models::Role;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Read access to role records.
///
/// Implementations report an unknown role as `Ok(None)`. Any storage failure
/// must be returned as [`LoginError::UpstreamUnavailable`] so callers can
/// retry.
#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn get(&self, name: &str) -> Result<Option<Role>, LoginError>;
}

/// Role store backed by a map, validating roles on insert.
#[derive(Debug, Default)]
pub struct InMemoryRoleStore {
    roles: RwLock<HashMap<String, Role>>,
}

impl InMemoryRoleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a fixed set of roles.
    ///
    /// # Errors
    ///
    /// Returns the first role that fails validation.
    pub fn with_roles(roles: impl IntoIterator<Item = Role>) -> Result<Self, RoleValidationError> {
        let mut map = HashMap::new();
        for role in roles {
            role.validate()?;
            map.insert(role.name.clone(), role);
        }
        Ok(Self {
            roles: RwLock::new(map),
        })
    }

    /// Insert or replace a role.
    pub async fn insert(&self, role: Role) -> Result<(), RoleValidationError> {
        role.validate()?;
        self.roles.write().await.insert(role.name.clone(), role);
        Ok(())
    }

    pub async fn remove(&self, name: &str) -> Option<Role> {
        self.roles.write().await.remove(name)
    }

    pub async fn len(&self) -> usize {
        self.roles.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.roles.read().await.is_empty()
    }
}

#[async_trait]
impl RoleStore for InMemoryRoleStore {
    async fn get(&self, name: &str) -> Result<Option<Role>, LoginError> {
        Ok(self.roles.read().await.get(name).cloned())
    }
}

/// Mock role stores for exercising upstream failure paths.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Role store that fails or stalls instead of answering.
    pub struct MockRoleStore {
        role: Option<Role>,
        delay: Option<Duration>,
        return_error: bool,
        call_count: AtomicUsize,
    }

    impl MockRoleStore {
        /// Always returns `role`, whatever name is asked for.
        pub fn returning(role: Role) -> Self {
            Self {
                role: Some(role),
                delay: None,
                return_error: false,
                call_count: AtomicUsize::new(0),
            }
        }

        /// Always fails with `UpstreamUnavailable`.
        pub fn failing() -> Self {
            Self {
                role: None,
                delay: None,
                return_error: true,
                call_count: AtomicUsize::new(0),
            }
        }

        /// Sleeps for `delay` before answering.
        pub fn slow(role: Role, delay: Duration) -> Self {
            Self {
                role: Some(role),
                delay: Some(delay),
                return_error: false,
                call_count: AtomicUsize::new(0),
            }
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RoleStore for MockRoleStore {
        async fn get(&self, _name: &str) -> Result<Option<Role>, LoginError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            if self.return_error {
                return Err(LoginError::UpstreamUnavailable(
                    "mock role store error".to_string(),
                ));
            }

            Ok(self.role.clone())
        }
    }
}
