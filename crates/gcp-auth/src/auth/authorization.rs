//! Service account to role matching.

use crate::models::{Identity, Role, ServiceAccounts};

/// Whether `identity` may log in with `role`.
///
/// - Wildcard roles admit any identity, but a configured `project_id` must
///   still equal the identity's project.
/// - Explicit roles admit an identity whose email or unique id exactly
///   equals a listed entry. An empty list admits no one.
pub fn is_authorized(role: &Role, identity: &Identity) -> bool {
    if let Some(project_id) = &role.project_id {
        if *project_id != identity.project_id {
            return false;
        }
    }

    match &role.service_accounts {
        ServiceAccounts::Wildcard => true,
        ServiceAccounts::Explicit(accounts) => {
            accounts.contains(&identity.service_account_email)
                || accounts.contains(&identity.service_account_id)
        }
    }
}
