//! Authorization checks run before a handler is entered.

use crate::identity::Identity;

use super::binding::AccessPolicy;
use super::errors::Denial;

/// Decides whether `identity` may invoke a binding guarded by `policy`.
///
/// Unrestricted bindings admit everyone, privileged identities bypass every
/// clause, and otherwise all clauses must hold.
///
/// # Errors
///
/// Returns the first [`Denial`] encountered.
pub fn authorize(policy: &AccessPolicy, identity: Option<&Identity>) -> Result<(), Denial> {
    if !policy.is_restricted() {
        return Ok(());
    }
    let Some(identity) = identity else {
        return Err(Denial::Anonymous);
    };
    if identity.is_privileged() {
        return Ok(());
    }

    let missing: Vec<String> = policy
        .permissions()
        .iter()
        .filter(|permission| !identity.has_permission(permission))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(Denial::MissingPermissions { missing });
    }

    if !policy.allow_groups().is_empty()
        && !policy
            .allow_groups()
            .iter()
            .any(|group| identity.in_group(group))
    {
        return Err(Denial::NotInAllowedGroup);
    }

    if let Some(group) = policy
        .deny_groups()
        .iter()
        .find(|group| identity.in_group(group))
    {
        return Err(Denial::InDeniedGroup {
            group: group.clone(),
        });
    }

    Ok(())
}
