//! Grant construction for an authorized identity.

use crate::models::{
    AuthGrant, Identity, Role, DEFAULT_POLICY, METADATA_ROLE, METADATA_SERVICE_ACCOUNT_EMAIL,
    METADATA_SERVICE_ACCOUNT_ID,
};
use std::collections::{BTreeMap, BTreeSet};

/// Build the grant for an authorized identity
///
/// Pure function of its inputs: role policies plus `default`, identity
/// metadata, and lease durations copied from the role.
pub fn build_grant(role: &Role, identity: &Identity) -> AuthGrant {
    let mut policies: BTreeSet<String> = role.policies.clone();
    policies.insert(DEFAULT_POLICY.to_string());

    let metadata = BTreeMap::from([
        (METADATA_ROLE.to_string(), role.name.clone()),
        (
            METADATA_SERVICE_ACCOUNT_ID.to_string(),
            identity.service_account_id.clone(),
        ),
        (
            METADATA_SERVICE_ACCOUNT_EMAIL.to_string(),
            identity.service_account_email.clone(),
        ),
    ]);

    AuthGrant {
        policies,
        metadata,
        ttl: role.ttl,
        max_ttl: role.max_ttl,
        period: role.period,
        renewable: true,
        identity_name: identity.service_account_id.clone(),
    }
}
